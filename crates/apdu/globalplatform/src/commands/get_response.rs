//! GET RESPONSE command
//!
//! Retrieves the remainder of a response announced with `61xx`. The executor
//! issues it automatically; the builder is exposed for simulators and tests.

use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{Command, FromApduResponse, Response};

use super::apdu_command;
use crate::constants::{cla, ins};

apdu_command! {
    /// GET RESPONSE command
    GetResponseCommand => GetResponseResponse
}

impl GetResponseCommand {
    /// Request `length` bytes (0 means 256)
    pub const fn with_length(length: u8) -> Self {
        Self(Command::new(cla::ISO7816, ins::GET_RESPONSE, 0x00, 0x00).with_le(length))
    }
}

/// GET RESPONSE response: a chunk of data and the next status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponseResponse(pub Response);

impl FromApduResponse for GetResponseResponse {
    fn from_response(response: Response) -> Result<Self, ResponseError> {
        Ok(Self(response))
    }
}
