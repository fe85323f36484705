//! Core error type for APDU operations
//!
//! Transport, command and response errors are kept as separate types so that
//! callers can tell a dead reader from a malformed byte string, and are
//! aggregated here for the executor.

use crate::command::CommandError;
use crate::response::error::ResponseError;
use crate::transport::TransportError;

/// Result type for core APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to exchange bytes with the card
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The command could not be encoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The response could not be decoded
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The card kept answering `61xx` past the configured chain limit
    #[error("GET RESPONSE chain limit of {0} exceeded")]
    ChainLimitExceeded(usize),
}
