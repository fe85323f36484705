//! GET STATUS command for GlobalPlatform
//!
//! This command is used to retrieve information about applications,
//! security domains, and load files on the card. Parsing of the returned
//! entries lives in [`crate::registry`].

use bytes::Bytes;
use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{Command, FromApduResponse, Response, StatusWord};

use super::apdu_command;
use crate::constants::{cla, get_status_p1, get_status_p2, ins, tags};

apdu_command! {
    /// GET STATUS command for GlobalPlatform
    GetStatusCommand => GetStatusResponse
}

impl GetStatusCommand {
    /// Create a GET STATUS command with explicit P1/P2 and an empty AID filter
    pub fn with_params(p1: u8, p2: u8) -> Self {
        Self(
            Command::new_with_data(cla::GP, ins::GET_STATUS, p1, p2, vec![tags::AID, 0x00])
                .with_le(0x00),
        )
    }

    /// Get status with empty AID (wildcard), tagged response format
    pub fn all_with_type(p1: u8) -> Self {
        Self::with_params(p1, get_status_p2::TLV_DATA)
    }

    /// Get status with empty AID (wildcard), legacy response format
    pub fn all_with_type_legacy(p1: u8) -> Self {
        Self::with_params(p1, get_status_p2::LEGACY_DATA)
    }

    /// Get status of issuer security domain
    pub fn issuer_security_domain() -> Self {
        Self::all_with_type(get_status_p1::ISSUER_SECURITY_DOMAIN)
    }

    /// Get status of applications
    pub fn applications() -> Self {
        Self::all_with_type(get_status_p1::APPLICATIONS)
    }

    /// The same query asking for the next occurrences after a `6310`
    pub fn next_occurrence(&self) -> Self {
        let command = &self.0;
        let mut next = Command::new(
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2() | get_status_p2::NEXT_OCCURRENCE,
        );
        if let Some(data) = command.data() {
            next = next.with_data(Bytes::copy_from_slice(data));
        }
        if let Some(le) = command.expected_length() {
            next = next.with_le(le);
        }
        Self(next)
    }
}

/// GET STATUS response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetStatusResponse {
    /// Complete data (9000)
    Success {
        /// Entry data in the requested format
        data: Bytes,
    },
    /// More entries available (6310); reissue with the next-occurrence flag
    MoreData {
        /// Entry data received so far
        data: Bytes,
    },
    /// No entry matches the query (6A88)
    ReferencedDataNotFound,
    /// Response format not supported (6A86)
    IncorrectP1P2,
    /// Instruction or variant not supported (6D00)
    InstructionNotSupported,
    /// Other error
    Other(StatusWord),
}

impl GetStatusResponse {
    /// Status word the card returned
    pub const fn status(&self) -> StatusWord {
        match self {
            Self::Success { .. } => StatusWord::SUCCESS,
            Self::MoreData { .. } => StatusWord::MORE_STATUS_DATA,
            Self::ReferencedDataNotFound => StatusWord::REFERENCED_DATA_NOT_FOUND,
            Self::IncorrectP1P2 => StatusWord::INCORRECT_P1P2,
            Self::InstructionNotSupported => StatusWord::INVALID_INSTRUCTION,
            Self::Other(status) => *status,
        }
    }

    /// Whether the card does not understand the requested response format
    pub const fn is_format_unsupported(&self) -> bool {
        matches!(self, Self::IncorrectP1P2 | Self::InstructionNotSupported)
    }
}

impl FromApduResponse for GetStatusResponse {
    fn from_response(response: Response) -> Result<Self, ResponseError> {
        Ok(match response.status() {
            StatusWord::SUCCESS => Self::Success {
                data: response.into_payload(),
            },
            StatusWord::MORE_STATUS_DATA => Self::MoreData {
                data: response.into_payload(),
            },
            StatusWord::REFERENCED_DATA_NOT_FOUND => Self::ReferencedDataNotFound,
            StatusWord::INCORRECT_P1P2 => Self::IncorrectP1P2,
            StatusWord::INVALID_INSTRUCTION => Self::InstructionNotSupported,
            other => Self::Other(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_get_status_command() {
        let cmd = GetStatusCommand::issuer_security_domain();
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F28002024F0000"));

        let cmd = GetStatusCommand::all_with_type_legacy(get_status_p1::EXEC_LOAD_FILES_AND_MODULES);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F21000024F0000"));
        assert_eq!(cmd.next_occurrence().to_bytes().as_ref(), hex!("80F21001024F0000"));
    }

    #[test]
    fn test_get_status_response() {
        let response =
            GetStatusResponse::from_response(Response::from_bytes(&hex!("E3024F006310")).unwrap())
                .unwrap();
        assert_eq!(
            response,
            GetStatusResponse::MoreData {
                data: Bytes::from_static(&hex!("E3024F00"))
            }
        );

        let response = GetStatusResponse::from_response(Response::error((0x6A, 0x86))).unwrap();
        assert!(response.is_format_unsupported());
    }
}
