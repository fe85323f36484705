//! Static and session key material
//!
//! [`KeySet`] holds the static ENC/MAC/KEK triple a card shares with the host;
//! [`SessionKeys`] hold the keys derived for one secure channel. Both are
//! zeroized on drop when the `zeroize` feature is enabled (best effort: copies
//! made inside cipher implementations are out of reach).

use std::fmt;

use crate::{Error, Result};

/// Length of every SCP02 key
pub const KEY_LENGTH: usize = 16;

/// A two-key triple-DES key
pub type KeyBytes = [u8; KEY_LENGTH];

/// Default test key `404142…4F`
pub const DEFAULT_TEST_KEY: KeyBytes = [
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
];

/// Gemalto sample mother key (`GEMXPRESSOSAMPLE`)
pub const GEMALTO_MOTHER_KEY: KeyBytes = *b"GEMXPRESSOSAMPLE";

/// How per-card keys are derived from the static keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Diversification {
    /// Static keys are the card keys
    #[default]
    None,
    /// VISA2 diversification
    Visa2,
    /// EMV CPS diversification
    Emv,
}

/// Static credentials for one security domain key set
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct KeySet {
    enc: KeyBytes,
    mac: KeyBytes,
    kek: KeyBytes,
    version: u8,
    #[cfg_attr(feature = "zeroize", zeroize(skip))]
    diversification: Diversification,
}

impl KeySet {
    /// Highest key set version number
    pub const MAX_VERSION: u8 = 127;

    /// Create a key set; the version must be in `0..=127`
    pub fn new(
        enc: KeyBytes,
        mac: KeyBytes,
        kek: KeyBytes,
        version: u8,
        diversification: Diversification,
    ) -> Result<Self> {
        if version > Self::MAX_VERSION {
            return Err(Error::InvalidKeyMaterial("key set version above 127"));
        }
        Ok(Self {
            enc,
            mac,
            kek,
            version,
            diversification,
        })
    }

    /// Create a key set from slices, rejecting keys that are not 16 bytes
    pub fn from_slices(
        enc: &[u8],
        mac: &[u8],
        kek: &[u8],
        version: u8,
        diversification: Diversification,
    ) -> Result<Self> {
        let key = |bytes: &[u8], what: &'static str| {
            KeyBytes::try_from(bytes).map_err(|_| Error::InvalidKeyMaterial(what))
        };
        Self::new(
            key(enc, "ENC key must be 16 bytes")?,
            key(mac, "MAC key must be 16 bytes")?,
            key(kek, "KEK key must be 16 bytes")?,
            version,
            diversification,
        )
    }

    /// Use the same key for ENC, MAC and KEK
    pub fn from_single_key(key: KeyBytes, version: u8, diversification: Diversification) -> Result<Self> {
        Self::new(key, key, key, version, diversification)
    }

    /// The `404142…4F` development keys, version 0, no diversification
    pub fn default_test_keys() -> Self {
        Self {
            enc: DEFAULT_TEST_KEY,
            mac: DEFAULT_TEST_KEY,
            kek: DEFAULT_TEST_KEY,
            version: 0,
            diversification: Diversification::None,
        }
    }

    /// The Gemalto mother key with VISA2 diversification
    pub fn gemalto_defaults() -> Self {
        Self {
            enc: GEMALTO_MOTHER_KEY,
            mac: GEMALTO_MOTHER_KEY,
            kek: GEMALTO_MOTHER_KEY,
            version: 0,
            diversification: Diversification::Visa2,
        }
    }

    /// Same keys with another diversification mode
    pub fn with_diversification(mut self, diversification: Diversification) -> Self {
        self.diversification = diversification;
        self
    }

    /// Same keys under another key set version
    pub fn with_version(mut self, version: u8) -> Result<Self> {
        if version > Self::MAX_VERSION {
            return Err(Error::InvalidKeyMaterial("key set version above 127"));
        }
        self.version = version;
        Ok(self)
    }

    /// Static encryption key
    pub const fn enc(&self) -> &KeyBytes {
        &self.enc
    }

    /// Static MAC key
    pub const fn mac(&self) -> &KeyBytes {
        &self.mac
    }

    /// Static key encryption key
    pub const fn kek(&self) -> &KeyBytes {
        &self.kek
    }

    /// Key set version sent in INITIALIZE UPDATE
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Diversification mode
    pub const fn diversification(&self) -> Diversification {
        self.diversification
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("version", &self.version)
            .field("diversification", &self.diversification)
            .finish_non_exhaustive()
    }
}

/// Keys derived for a single secure channel session
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct SessionKeys {
    enc: KeyBytes,
    mac: KeyBytes,
    dek: KeyBytes,
}

impl SessionKeys {
    /// Bundle derived session keys
    pub const fn new(enc: KeyBytes, mac: KeyBytes, dek: KeyBytes) -> Self {
        Self { enc, mac, dek }
    }

    /// Session encryption key (S-ENC)
    pub const fn enc(&self) -> &KeyBytes {
        &self.enc
    }

    /// Command MAC key (C-MAC)
    pub const fn mac(&self) -> &KeyBytes {
        &self.mac
    }

    /// Data encryption key (DEK)
    pub const fn dek(&self) -> &KeyBytes {
        &self.dek
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_from_slices_validates_lengths() {
        let key = hex!("404142434445464748494a4b4c4d4e4f");
        let keys = KeySet::from_slices(&key, &key, &key, 1, Diversification::None).unwrap();
        assert_eq!(keys, KeySet::default_test_keys().with_version(1).unwrap());

        let short = hex!("4041424344454647");
        assert!(matches!(
            KeySet::from_slices(&key, &short, &key, 0, Diversification::None),
            Err(Error::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_version_range() {
        assert!(KeySet::from_single_key(DEFAULT_TEST_KEY, 127, Diversification::None).is_ok());
        assert!(KeySet::from_single_key(DEFAULT_TEST_KEY, 128, Diversification::None).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", KeySet::gemalto_defaults());
        assert!(rendered.contains("Visa2"));
        assert_eq!(format!("{:?}", SessionKeys::new([0; 16], [1; 16], [2; 16])), "SessionKeys(..)");
    }
}
