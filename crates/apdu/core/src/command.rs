//! APDU command definitions and traits
//!
//! This module provides types and traits for working with short APDU commands
//! according to ISO/IEC 7816-4.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::response::FromApduResponse;

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA_LENGTH: usize = 255;

/// Error for APDU command encoding and decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Raw command is shorter than a header or its Lc disagrees with its length
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),

    /// Data field does not fit into a short APDU
    #[error("Data too long: {0} bytes (max {1})")]
    DataTooLong(usize, usize),
}

/// A typed APDU command that knows how to interpret the card's answer
pub trait ApduCommand {
    /// Typed response produced from the card's answer
    type Response: FromApduResponse;

    /// The command as it goes on the wire, before any secure messaging
    fn command(&self) -> &Command;
}

/// Generic APDU command structure
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Bytes>,
    le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field (0 means 256)
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Command class byte
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction byte
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command data, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Length of the data field (0 when absent)
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Expected response length, if any
    pub const fn expected_length(&self) -> Option<u8> {
        self.le
    }

    /// Check that the command fits into a short APDU
    pub fn validate(&self) -> Result<(), CommandError> {
        let len = self.data_len();
        if len > MAX_SHORT_DATA_LENGTH {
            return Err(CommandError::DataTooLong(len, MAX_SHORT_DATA_LENGTH));
        }
        Ok(())
    }

    /// Serialized length of the command
    pub fn command_length(&self) -> usize {
        let data = match self.data() {
            Some(data) if !data.is_empty() => 1 + data.len(),
            _ => 0,
        };
        4 + data + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    ///
    /// Callers are expected to [`validate`](Self::validate) first; an empty data
    /// field is omitted together with its Lc byte.
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = self.data().filter(|data| !data.is_empty()) {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Parse a short APDU command from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CommandError> {
        if raw.len() < 4 {
            return Err(CommandError::InvalidLength(raw.len()));
        }

        let mut command = Self::new(raw[0], raw[1], raw[2], raw[3]);
        match raw.len() {
            4 => {}
            5 => command.le = Some(raw[4]),
            len => {
                let lc = raw[4] as usize;
                let body = &raw[5..];
                if body.len() == lc {
                    command.data = Some(Bytes::copy_from_slice(body));
                } else if body.len() == lc + 1 {
                    command.data = Some(Bytes::copy_from_slice(&body[..lc]));
                    command.le = Some(body[lc]);
                } else {
                    return Err(CommandError::InvalidLength(len));
                }
            }
        }

        Ok(command)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cla", &format_args!("{:#04x}", self.cla))
            .field("ins", &format_args!("{:#04x}", self.ins))
            .field("p1", &format_args!("{:#04x}", self.p1))
            .field("p2", &format_args!("{:#04x}", self.p2))
            .field("data", &self.data.as_ref().map(hex::encode_upper))
            .field("le", &self.le)
            .finish()
    }
}

impl From<&Command> for Bytes {
    fn from(command: &Command) -> Self {
        command.to_bytes()
    }
}
