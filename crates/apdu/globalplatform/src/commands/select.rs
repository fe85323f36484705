//! SELECT command for GlobalPlatform
//!
//! This command is used to select an application or security domain by its AID.

use bytes::Bytes;
use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{Command, FromApduResponse, Response, StatusWord};

use super::apdu_command;
use crate::constants::{cla, ins, select_p1};

apdu_command! {
    /// SELECT command for GlobalPlatform
    SelectCommand => SelectResponse
}

impl SelectCommand {
    /// Create a new SELECT command with AID
    pub fn with_aid(aid: impl AsRef<[u8]>) -> Self {
        Self(
            Command::new_with_data(
                cla::ISO7816,
                ins::SELECT,
                select_p1::BY_NAME,
                0x00,
                Bytes::copy_from_slice(aid.as_ref()),
            )
            .with_le(0x00),
        )
    }
}

/// SELECT response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectResponse {
    /// Success response (9000) with the File Control Information
    Success {
        /// FCI template returned by the application, may be empty
        fci: Bytes,
    },
    /// File or application not found (6A82)
    NotFound,
    /// Other error
    Other(StatusWord),
}

impl SelectResponse {
    /// Returns true if the selection was successful
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Status word the card returned
    pub const fn status(&self) -> StatusWord {
        match self {
            Self::Success { .. } => StatusWord::SUCCESS,
            Self::NotFound => StatusWord::FILE_NOT_FOUND,
            Self::Other(status) => *status,
        }
    }

    /// The FCI on success, a card rejection otherwise
    pub fn into_result(self) -> crate::Result<Bytes> {
        match self {
            Self::Success { fci } => Ok(fci),
            other => Err(crate::Error::CardRejected(other.status())),
        }
    }
}

impl FromApduResponse for SelectResponse {
    fn from_response(response: Response) -> Result<Self, ResponseError> {
        Ok(match response.status() {
            StatusWord::SUCCESS => Self::Success {
                fci: response.into_payload(),
            },
            StatusWord::FILE_NOT_FOUND => Self::NotFound,
            other => Self::Other(other),
        })
    }
}
