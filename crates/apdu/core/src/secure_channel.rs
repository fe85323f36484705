//! Secure channel abstractions
//!
//! A secure channel sits between the typed command layer and the executor:
//! commands are wrapped before transmission and responses unwrapped after.

use std::fmt;

use crate::command::Command;
use crate::response::Response;

/// Protection applied to commands once a secure channel is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityLevel {
    /// No secure messaging
    #[default]
    Clear,
    /// Command integrity and data origin authentication (C-MAC)
    Mac,
    /// C-MAC plus command data encryption
    Enc,
}

impl SecurityLevel {
    /// Bytes the channel adds to a command's data field at this level
    ///
    /// Eight bytes of MAC, plus up to eight bytes of padding when encrypting.
    pub const fn overhead(&self) -> usize {
        match self {
            Self::Clear => 0,
            Self::Mac => 8,
            Self::Enc => 16,
        }
    }

    /// Check whether commands carry a MAC
    pub const fn is_mac(&self) -> bool {
        matches!(self, Self::Mac | Self::Enc)
    }

    /// Check whether command data is encrypted
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Enc)
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clear => "clear",
            Self::Mac => "mac",
            Self::Enc => "enc",
        })
    }
}

/// Trait for secure channel implementations
pub trait SecureChannel: fmt::Debug {
    /// Error produced while protecting or verifying messages
    type Error;

    /// Apply protection to an outgoing command
    fn wrap(&mut self, command: &Command) -> Result<Command, Self::Error>;

    /// Verify and strip protection from an incoming response
    fn unwrap(&mut self, response: Response) -> Result<Response, Self::Error>;

    /// Check if secure channel is established
    fn is_established(&self) -> bool;

    /// Get current security level
    fn security_level(&self) -> SecurityLevel;

    /// Discard session state; subsequent commands are sent in the clear
    fn close(&mut self);
}
