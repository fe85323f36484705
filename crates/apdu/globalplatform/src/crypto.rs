//! Cryptographic operations for GlobalPlatform SCP02 protocol
//!
//! This module provides implementations of the cryptographic operations
//! required for the SCP02 protocol, including key derivation, MAC calculation,
//! cryptogram computation and command data encryption.

use cbc_mac::{CbcMac, Mac};
use cipher::{
    BlockEncrypt, BlockEncryptMut, Key, KeyInit, KeyIvInit,
    block_padding::{Iso7816, RawPadding},
    generic_array::GenericArray,
};
use des::{Des, TdesEde3};

use crate::keys::KeyBytes;

/// Derivation constant selecting which session key is derived
pub type Purpose = [u8; 2];
/// Card sequence counter from INITIALIZE UPDATE
pub type SequenceCounter = [u8; 2];
/// SCP02 card challenge
pub type CardChallenge = [u8; 6];
/// Host challenge sent in INITIALIZE UPDATE
pub type HostChallenge = [u8; 8];
/// Card or host cryptogram
pub type Cryptogram = [u8; 8];
/// Command MAC and chaining value
pub type Scp02Mac = [u8; 8];

/// Derivation purpose for encryption key
pub const DERIVATION_ENC: Purpose = [0x01, 0x82];
/// Derivation purpose for MAC key
pub const DERIVATION_MAC: Purpose = [0x01, 0x01];
/// Derivation purpose for data encryption key
pub const DERIVATION_DEK: Purpose = [0x01, 0x81];

const BLOCK: usize = 8;

/// Derive a session key from the card key using the sequence number and purpose
pub fn derive_key(card_key: &KeyBytes, seq: &SequenceCounter, purpose: &Purpose) -> KeyBytes {
    let mut blocks = [GenericArray::default(), GenericArray::default()];
    blocks[0][0..2].copy_from_slice(purpose);
    blocks[0][2..4].copy_from_slice(seq);

    let mut encryptor =
        cbc::Encryptor::<TdesEde3>::new(&resize_key(card_key), &GenericArray::default());
    encryptor.encrypt_blocks_mut(&mut blocks);

    let mut result = KeyBytes::default();
    result[0..8].copy_from_slice(&blocks[0]);
    result[8..16].copy_from_slice(&blocks[1]);
    result
}

/// Calculate the card (`for_host == false`) or host cryptogram
///
/// Card cryptogram input is `host challenge ‖ sequence counter ‖ card challenge`,
/// host cryptogram input is `sequence counter ‖ card challenge ‖ host challenge`.
pub fn calculate_cryptogram(
    enc_key: &KeyBytes,
    sequence_counter: &SequenceCounter,
    card_challenge: &CardChallenge,
    host_challenge: &HostChallenge,
    for_host: bool,
) -> Cryptogram {
    let mut blocks = [GenericArray::default(); 3];

    if for_host {
        blocks[0][0..2].copy_from_slice(sequence_counter);
        blocks[0][2..8].copy_from_slice(card_challenge);
        blocks[1][0..8].copy_from_slice(host_challenge);
    } else {
        blocks[0][0..8].copy_from_slice(host_challenge);
        blocks[1][0..2].copy_from_slice(sequence_counter);
        blocks[1][2..8].copy_from_slice(card_challenge);
    }

    // Full padding block, zero IV
    Iso7816::raw_pad(&mut blocks[2], 0);
    let mut cipher =
        cbc::Encryptor::<TdesEde3>::new(&resize_key(enc_key), &GenericArray::default());
    cipher.encrypt_blocks_mut(&mut blocks);
    blocks[2].into()
}

/// ISO 9797-1 MAC algorithm 3 with method 2 padding, as used for SCP02 C-MAC
///
/// Single DES under the first key half for all blocks but the last, which is
/// encrypted with two-key triple DES.
pub fn mac_full_3des(key: &KeyBytes, iv: &Scp02Mac, data: &[u8]) -> Scp02Mac {
    let padded = pad_80(data);

    let des_cipher = Des::new(GenericArray::from_slice(&key[..8]));
    let des3_cipher = TdesEde3::new(&resize_key(key));

    let mut chain = *iv;
    let (body, last) = padded.split_at(padded.len() - BLOCK);

    for chunk in body.chunks(BLOCK) {
        let mut block = GenericArray::clone_from_slice(chunk);
        xor_in_place(&mut block, &chain);
        des_cipher.encrypt_block(&mut block);
        chain.copy_from_slice(&block);
    }

    let mut block = GenericArray::clone_from_slice(last);
    xor_in_place(&mut block, &chain);
    des3_cipher.encrypt_block(&mut block);
    block.into()
}

/// Encrypt the previous C-MAC to obtain the next ICV
///
/// Single DES under the first half of the C-MAC key.
pub fn encrypt_icv(mac_key: &KeyBytes, icv: &Scp02Mac) -> Scp02Mac {
    let key = GenericArray::from_slice(&mac_key[..8]);
    let mut mac = <CbcMac<Des> as Mac>::new(key);
    mac.update(icv);
    mac.finalize().into_bytes().into()
}

/// Pad with `80 00…` and encrypt with triple DES in CBC mode, zero IV
pub fn encrypt_cbc_padded(key: &KeyBytes, data: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<TdesEde3>::new(&resize_key(key), &GenericArray::default())
        .encrypt_padded_vec_mut::<Iso7816>(data)
}

/// Encrypt whole 8-byte blocks with triple DES in ECB mode
///
/// Used for key diversification, where the input is always two blocks.
pub fn encrypt_ecb(key: &KeyBytes, data: &[u8; 16]) -> KeyBytes {
    let cipher = TdesEde3::new(&resize_key(key));
    let mut blocks = [
        GenericArray::clone_from_slice(&data[..8]),
        GenericArray::clone_from_slice(&data[8..]),
    ];
    cipher.encrypt_blocks(&mut blocks);

    let mut out = KeyBytes::default();
    out[..8].copy_from_slice(&blocks[0]);
    out[8..].copy_from_slice(&blocks[1]);
    out
}

/// Length of `data` after ISO 7816-4 padding
pub const fn padded_len(len: usize) -> usize {
    (len / BLOCK + 1) * BLOCK
}

/// Resize the SCP02 16-byte key to 24 bytes for 3DES
///
/// This copies the first 8 bytes to the end of the key.
pub fn resize_key(key: &KeyBytes) -> Key<TdesEde3> {
    let mut result = GenericArray::default();
    result[..16].copy_from_slice(key);
    result[16..24].copy_from_slice(&key[..8]);
    result
}

fn pad_80(data: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(padded_len(data.len()));
    padded.extend_from_slice(data);
    padded.push(0x80);
    padded.resize(padded_len(data.len()), 0x00);
    padded
}

fn xor_in_place(block: &mut [u8], other: &[u8; BLOCK]) {
    for (a, b) in block.iter_mut().zip(other) {
        *a ^= *b;
    }
}
