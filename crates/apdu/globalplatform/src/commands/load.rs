//! LOAD command for GlobalPlatform
//!
//! This command is used to load executable code (CAP files) to the card.

use bytes::Bytes;
use gpman_apdu_core::{Command, StatusWord};

use super::{apdu_command, status_response};
use crate::constants::{cla, ins, load_p1};

apdu_command! {
    /// LOAD command for GlobalPlatform
    LoadCommand => LoadResponse
}

impl LoadCommand {
    /// Create a LOAD command with block data
    pub fn with_block_data(p1: u8, block_number: u8, data: impl Into<Bytes>) -> Self {
        Self(Command::new_with_data(cla::GP, ins::LOAD, p1, block_number, data).with_le(0x00))
    }

    /// Create a LOAD command for more blocks
    pub fn more_blocks(block_number: u8, data: impl Into<Bytes>) -> Self {
        Self::with_block_data(load_p1::MORE_BLOCKS, block_number, data)
    }

    /// Create a LOAD command for the last block
    pub fn last_block(block_number: u8, data: impl Into<Bytes>) -> Self {
        Self::with_block_data(load_p1::LAST_BLOCK, block_number, data)
    }

    /// Whether this command carries the final block
    pub const fn is_last_block(&self) -> bool {
        self.0.p1() & load_p1::LAST_BLOCK != 0
    }
}

status_response! {
    /// LOAD response
    LoadResponse {
        /// Security status not satisfied (6982)
        SecurityStatusNotSatisfied = StatusWord::SECURITY_CONDITION_NOT_SATISFIED,
        /// Wrong length (6700)
        WrongLength = StatusWord::WRONG_LENGTH,
        /// Not enough memory (6A84)
        NotEnoughMemory = StatusWord::NOT_ENOUGH_MEMORY,
        /// Load file rejected, e.g. failed hash or linking (6985)
        ConditionsNotSatisfied = StatusWord::CONDITIONS_NOT_SATISFIED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpman_apdu_core::{FromApduResponse, Response};
    use hex_literal::hex;

    #[test]
    fn test_load_command() {
        let cmd = LoadCommand::more_blocks(0x01, hex!("C48201").to_vec());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E8000103C4820100"));
        assert!(!cmd.is_last_block());

        let cmd = LoadCommand::last_block(0x02, hex!("0102").to_vec());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E88002020102 00"));
        assert!(cmd.is_last_block());
    }

    #[test]
    fn test_load_response() {
        let response = LoadResponse::from_response(Response::error((0x67, 0x00))).unwrap();
        assert_eq!(response, LoadResponse::WrongLength);
        assert_eq!(response.status(), StatusWord::WRONG_LENGTH);
    }
}
