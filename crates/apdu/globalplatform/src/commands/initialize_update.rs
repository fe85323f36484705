//! INITIALIZE UPDATE command for GlobalPlatform
//!
//! This command starts the SCP02 handshake: the host sends its challenge and
//! the card answers with its key diversification data, key information,
//! sequence counter, challenge and cryptogram.

use bytes::Bytes;
use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{Command, FromApduResponse, Response, StatusWord};

use super::apdu_command;
use crate::constants::{INIT_UPDATE_RESPONSE_LENGTH, cla, ins};
use crate::crypto::{CardChallenge, Cryptogram, HostChallenge, SequenceCounter};
use crate::diversify::DiversificationData;

apdu_command! {
    /// INITIALIZE UPDATE command for GlobalPlatform
    InitializeUpdateCommand => InitializeUpdateResponse
}

impl InitializeUpdateCommand {
    /// Create an INITIALIZE UPDATE command for a key set version and host challenge
    pub fn with_challenge(key_version: u8, host_challenge: &HostChallenge) -> Self {
        Self(
            Command::new_with_data(
                cla::GP,
                ins::INITIALIZE_UPDATE,
                key_version,
                0x00,
                Bytes::copy_from_slice(host_challenge),
            )
            .with_le(0x00),
        )
    }
}

/// Parsed SCP02 INITIALIZE UPDATE response data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitUpdateData {
    /// Key diversification data
    pub diversification_data: DiversificationData,
    /// Key version number and secure channel protocol identifier
    pub key_info: [u8; 2],
    /// Sequence counter
    pub sequence_counter: SequenceCounter,
    /// Card challenge
    pub card_challenge: CardChallenge,
    /// Card cryptogram
    pub card_cryptogram: Cryptogram,
}

impl InitUpdateData {
    /// Parse the 28-byte response payload
    pub fn parse(data: &[u8]) -> Result<Self, ResponseError> {
        if data.len() != INIT_UPDATE_RESPONSE_LENGTH {
            return Err(ResponseError::Parse(
                "INITIALIZE UPDATE response must be 28 bytes",
            ));
        }

        let mut parsed = Self {
            diversification_data: [0; 10],
            key_info: [0; 2],
            sequence_counter: [0; 2],
            card_challenge: [0; 6],
            card_cryptogram: [0; 8],
        };
        parsed.diversification_data.copy_from_slice(&data[0..10]);
        parsed.key_info.copy_from_slice(&data[10..12]);
        parsed.sequence_counter.copy_from_slice(&data[12..14]);
        parsed.card_challenge.copy_from_slice(&data[14..20]);
        parsed.card_cryptogram.copy_from_slice(&data[20..28]);
        Ok(parsed)
    }

    /// Key set version the card used
    pub const fn key_version(&self) -> u8 {
        self.key_info[0]
    }

    /// Secure channel protocol identifier
    pub const fn scp_version(&self) -> u8 {
        self.key_info[1]
    }
}

/// INITIALIZE UPDATE response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeUpdateResponse {
    /// Success response (9000)
    Success(InitUpdateData),
    /// Key set not found (6A88)
    ReferencedDataNotFound,
    /// Authentication blocked or card locked (6983 and others)
    Other(StatusWord),
}

impl InitializeUpdateResponse {
    /// Status word the card returned
    pub const fn status(&self) -> StatusWord {
        match self {
            Self::Success(_) => StatusWord::SUCCESS,
            Self::ReferencedDataNotFound => StatusWord::REFERENCED_DATA_NOT_FOUND,
            Self::Other(status) => *status,
        }
    }

    /// The handshake data on success, a card rejection otherwise
    pub fn into_result(self) -> crate::Result<InitUpdateData> {
        match self {
            Self::Success(data) => Ok(data),
            other => Err(crate::Error::CardRejected(other.status())),
        }
    }
}

impl FromApduResponse for InitializeUpdateResponse {
    fn from_response(response: Response) -> Result<Self, ResponseError> {
        Ok(match response.status() {
            StatusWord::SUCCESS => Self::Success(InitUpdateData::parse(response.payload())?),
            StatusWord::REFERENCED_DATA_NOT_FOUND => Self::ReferencedDataNotFound,
            other => Self::Other(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_initialize_update_command() {
        let cmd = InitializeUpdateCommand::with_challenge(0x00, &hex!("f0467f908e5ca23f"));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("8050000008f0467f908e5ca23f00"));
    }

    #[test]
    fn test_initialize_update_response() {
        let response = Response::from_bytes(&hex!(
            "000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce49000"
        ))
        .unwrap();
        let data = InitializeUpdateResponse::from_response(response)
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(data.diversification_data, hex!("00000265018303953662"));
        assert_eq!(data.key_version(), 0x20);
        assert_eq!(data.scp_version(), 0x02);
        assert_eq!(data.sequence_counter, hex!("000d"));
        assert_eq!(data.card_challenge, hex!("e9c62ba1c4c8"));
        assert_eq!(data.card_cryptogram, hex!("e55fcb91b6654ce4"));
    }

    #[test]
    fn test_truncated_response() {
        let response = Response::from_bytes(&hex!("0000026501830395369000")).unwrap();
        assert!(matches!(
            InitializeUpdateResponse::from_response(response),
            Err(ResponseError::Parse(_))
        ));

        let response = Response::from_bytes(&hex!("6A88")).unwrap();
        assert_eq!(
            InitializeUpdateResponse::from_response(response).unwrap(),
            InitializeUpdateResponse::ReferencedDataNotFound
        );
    }
}
