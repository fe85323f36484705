//! GET DATA command for GlobalPlatform
//!
//! Reads card-level data objects such as Card Data (tag `66`).

use bytes::Bytes;
use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{Command, FromApduResponse, Response, StatusWord};

use super::apdu_command;
use crate::constants::{cla, ins, tags};

apdu_command! {
    /// GET DATA command for GlobalPlatform
    GetDataCommand => GetDataResponse
}

impl GetDataCommand {
    /// Read the data object with the given two-byte tag
    pub const fn with_tag(tag: u16) -> Self {
        Self(Command::new(cla::GP, ins::GET_DATA, (tag >> 8) as u8, tag as u8).with_le(0x00))
    }

    /// Read Card Data (`66`)
    pub const fn card_data() -> Self {
        Self::with_tag(tags::CARD_DATA as u16)
    }
}

/// GET DATA response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetDataResponse {
    /// Success response (9000) with the data object
    Success {
        /// Data object value as returned by the card
        data: Bytes,
    },
    /// Data object not available (6A88)
    ReferencedDataNotFound,
    /// Other error
    Other(StatusWord),
}

impl GetDataResponse {
    /// Status word the card returned
    pub const fn status(&self) -> StatusWord {
        match self {
            Self::Success { .. } => StatusWord::SUCCESS,
            Self::ReferencedDataNotFound => StatusWord::REFERENCED_DATA_NOT_FOUND,
            Self::Other(status) => *status,
        }
    }

    /// The data on success, a card rejection otherwise
    pub fn into_result(self) -> crate::Result<Bytes> {
        match self {
            Self::Success { data } => Ok(data),
            other => Err(crate::Error::CardRejected(other.status())),
        }
    }
}

impl FromApduResponse for GetDataResponse {
    fn from_response(response: Response) -> Result<Self, ResponseError> {
        Ok(match response.status() {
            StatusWord::SUCCESS => Self::Success {
                data: response.into_payload(),
            },
            StatusWord::REFERENCED_DATA_NOT_FOUND => Self::ReferencedDataNotFound,
            other => Self::Other(other),
        })
    }
}
