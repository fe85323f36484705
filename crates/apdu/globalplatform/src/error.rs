use gpman_apdu_core::command::CommandError;
use gpman_apdu_core::response::error::ResponseError;
use gpman_apdu_core::{StatusWord, TransportError};
use thiserror::Error;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// Static key material is malformed; never reaches the card
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(&'static str),

    /// The load file could not be parsed
    #[error("Malformed CAP file: {0}")]
    MalformedCapFile(String),

    /// A card response is shorter than its mandatory fields or carries unexpected tags
    #[error("Malformed response: {0}")]
    MalformedResponse(&'static str),

    /// The card cryptogram did not verify; wrong keys or diversification mode
    #[error("Card authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// The card answered a protocol step with a non-success status
    #[error("Card rejected command: {0} ({desc})", desc = .0.description())]
    CardRejected(StatusWord),

    /// A LOAD block was refused by the card
    #[error("Card rejected load block {block}: {status}")]
    LoadRejected {
        /// Zero-based index of the refused block
        block: usize,
        /// Status word returned for that block
        status: StatusWord,
    },

    /// The byte-level exchange with the card failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command data plus secure messaging overhead exceeds a short APDU
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Length the command would have had
        len: usize,
        /// Largest allowed length
        max: usize,
    },

    /// AID shorter than 5 or longer than 16 bytes, or not parseable
    #[error("Invalid AID: {0}")]
    InvalidAid(String),

    /// The card announced a secure channel protocol other than SCP02
    #[error("Unsupported SCP version: {0:#04x}")]
    UnsupportedScpVersion(u8),

    /// A secure command was issued while the channel is not authenticated
    #[error("Secure channel not established")]
    NoSecureChannel,

    /// Session configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// I/O error while reading a CAP file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error ends all further work on this card connection
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::Transport(_))
    }

    /// The card's status word, for card rejections
    pub const fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::CardRejected(status) | Self::LoadRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ResponseError> for Error {
    fn from(error: ResponseError) -> Self {
        match error {
            ResponseError::Incomplete => Self::MalformedResponse("response shorter than status word"),
            ResponseError::Parse(message) => Self::MalformedResponse(message),
            ResponseError::Status(status) => Self::CardRejected(status.status_word()),
        }
    }
}

impl From<CommandError> for Error {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::DataTooLong(len, max) => Self::PayloadTooLarge { len, max },
            CommandError::InvalidLength(_) => Self::MalformedResponse("invalid command length"),
        }
    }
}

impl From<gpman_apdu_core::Error> for Error {
    fn from(error: gpman_apdu_core::Error) -> Self {
        match error {
            gpman_apdu_core::Error::Transport(e) => Self::Transport(e),
            gpman_apdu_core::Error::Command(e) => e.into(),
            gpman_apdu_core::Error::Response(e) => e.into(),
            gpman_apdu_core::Error::ChainLimitExceeded(_) => {
                Self::MalformedResponse("GET RESPONSE chain limit exceeded")
            }
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(error: zip::result::ZipError) -> Self {
        Self::MalformedCapFile(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::AuthenticationFailed("cryptogram").is_fatal());
        assert!(Error::Transport(TransportError::Transmission).is_fatal());
        assert!(!Error::CardRejected(StatusWord::CONDITIONS_NOT_SATISFIED).is_fatal());
        assert!(!Error::NoSecureChannel.is_fatal());
    }

    #[test]
    fn test_status_word_accessor() {
        let error = Error::LoadRejected {
            block: 2,
            status: StatusWord::NOT_ENOUGH_MEMORY,
        };
        assert_eq!(error.status_word(), Some(StatusWord::new(0x6A, 0x84)));
        assert_eq!(
            Error::CardRejected(StatusWord::CONDITIONS_NOT_SATISFIED).to_string(),
            "Card rejected command: 6985 (Conditions of use not satisfied)"
        );
        assert_eq!(Error::InvalidConfig("x").status_word(), None);
    }
}
