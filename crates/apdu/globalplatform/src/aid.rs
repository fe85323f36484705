//! Application identifiers
//!
//! An [`Aid`] names a package, applet instance or security domain on the card.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use derive_more::{AsRef, Deref};

use crate::constants::sd_aid;
use crate::{Error, Result};

/// Shortest AID accepted by the card
pub const MIN_AID_LENGTH: usize = 5;
/// Longest AID accepted by the card
pub const MAX_AID_LENGTH: usize = 16;

/// Application identifier, 5 to 16 bytes, compared byte for byte
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, AsRef, Deref)]
#[as_ref(forward)]
pub struct Aid(Bytes);

impl Aid {
    /// GlobalPlatform issuer security domain
    pub const ISD: Self = Self(Bytes::from_static(sd_aid::ISD));
    /// Visa/OpenPlatform card manager
    pub const VISA_CARD_MANAGER: Self = Self(Bytes::from_static(sd_aid::VISA));
    /// Gemalto card manager
    pub const GEMALTO_CARD_MANAGER: Self = Self(Bytes::from_static(sd_aid::GEMALTO));

    /// Create an AID, checking its length
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if !(MIN_AID_LENGTH..=MAX_AID_LENGTH).contains(&bytes.len()) {
            return Err(Error::InvalidAid(format!(
                "length {} outside {MIN_AID_LENGTH}..={MAX_AID_LENGTH}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Copy an AID out of a byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::new(Bytes::copy_from_slice(bytes))
    }

    /// Parse a hex string such as `A000000151000000`
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidAid(format!("{s}: {e}")))?;
        Self::new(bytes)
    }

    /// The AID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Printable form with non-ASCII bytes escaped, e.g. `|jcop|` for `6A636F70`
    pub fn to_readable_string(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        out.push('|');
        for &byte in self.0.iter() {
            if byte.is_ascii_graphic() || byte == b' ' {
                out.push(byte as char);
            } else {
                out.push('.');
            }
        }
        out.push('|');
        out
    }
}

impl FromStr for Aid {
    type Err = Error;

    /// Accepts hex (`A000000003000000`) or readable text between pipes (`|HelloApp|`)
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.strip_prefix('|').and_then(|rest| rest.strip_suffix('|')) {
            Some(text) => Self::new(Bytes::copy_from_slice(text.as_bytes())),
            None => Self::from_hex(s),
        }
    }
}

impl TryFrom<&[u8]> for Aid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

impl From<Aid> for Bytes {
    fn from(aid: Aid) -> Self {
        aid.0
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aid({self})")
    }
}
