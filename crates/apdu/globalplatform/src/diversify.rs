//! Key diversification
//!
//! Derives per-card static keys from a mother key set and the 10 bytes of key
//! diversification data the card returns in INITIALIZE UPDATE.

use tracing::trace;

use crate::crypto::encrypt_ecb;
use crate::keys::{Diversification, KeyBytes, KeySet};

/// Key diversification data returned by the card
pub type DiversificationData = [u8; 10];

/// Card keys after diversification, ready for session key derivation
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct CardKeys {
    /// Encryption key
    pub enc: KeyBytes,
    /// MAC key
    pub mac: KeyBytes,
    /// Key encryption key
    pub kek: KeyBytes,
}

impl std::fmt::Debug for CardKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CardKeys(..)")
    }
}

/// Derive the card keys for `keys` and the card's diversification data
///
/// With [`Diversification::None`] the static keys are returned unchanged.
pub fn diversify(keys: &KeySet, kdd: &DiversificationData) -> CardKeys {
    let mode = keys.diversification();
    trace!(?mode, kdd = %hex::encode(kdd), "Diversifying card keys");

    let derive = |key: &KeyBytes, index: u8| match mode {
        Diversification::None => *key,
        Diversification::Visa2 => encrypt_ecb(key, &visa2_data(kdd, index)),
        Diversification::Emv => encrypt_ecb(key, &emv_data(kdd, index)),
    };

    CardKeys {
        enc: derive(keys.enc(), 1),
        mac: derive(keys.mac(), 2),
        kek: derive(keys.kek(), 3),
    }
}

/// VISA2 derivation block: card serial bytes from the CPLC part of the data
fn visa2_data(kdd: &DiversificationData, index: u8) -> [u8; 16] {
    let mut data = [0u8; 16];
    data[0..2].copy_from_slice(&kdd[0..2]);
    data[2..6].copy_from_slice(&kdd[4..8]);
    data[6] = 0xF0;
    data[7] = index;
    data[8..10].copy_from_slice(&kdd[0..2]);
    data[10..14].copy_from_slice(&kdd[4..8]);
    data[14] = 0x0F;
    data[15] = index;
    data
}

/// EMV CPS derivation block: the last six bytes of the data
fn emv_data(kdd: &DiversificationData, index: u8) -> [u8; 16] {
    let mut data = [0u8; 16];
    data[0..6].copy_from_slice(&kdd[4..10]);
    data[6] = 0xF0;
    data[7] = index;
    data[8..14].copy_from_slice(&kdd[4..10]);
    data[14] = 0x0F;
    data[15] = index;
    data
}
