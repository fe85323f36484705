//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types and traits for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! - [`Command`] and [`Response`] model the short APDU byte layouts
//! - [`CardTransport`] is the synchronous `transmit(bytes) -> bytes` primitive that
//!   connects the stack to a physical or virtual card
//! - [`CardExecutor`] drives a transport and reassembles `61xx` responses with GET RESPONSE
//! - [`SecureChannel`] is the wrap/unwrap contract implemented by secure messaging protocols
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod executor;
pub mod response;
pub mod secure_channel;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{ApduCommand, Command};
pub use executor::CardExecutor;
pub use response::status::StatusWord;
pub use response::{FromApduResponse, Response};
pub use secure_channel::{SecureChannel, SecurityLevel};
pub use transport::{CardTransport, LoggingTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardExecutor, Command, Error, Response, Result,
        command::ApduCommand,
        response::{FromApduResponse, error::ResponseError, status::StatusWord},
        secure_channel::{SecureChannel, SecurityLevel},
        transport::{CardTransport, TransportError},
    };
}
