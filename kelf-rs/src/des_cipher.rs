//! Chained-block Triple-DES, the only primitive every KELF derivation is built from.
//!
//! `key_count` selects the variant: 1 is plain DES, 2 is two-key EDE (K1, K2, K1)
//! and 3 is three-key EDE. Key *k* occupies bytes `[8k, 8k + 8)` of the key slice.

use crate::error::{KelfError, Result};
use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use des::{Des, TdesEde2, TdesEde3};

/// DES block size in bytes.
pub const DES_BLOCK_SIZE: usize = 8;

/// All-zero IV used by every signature and key-wrap operation.
pub const IV_NULL: [u8; DES_BLOCK_SIZE] = [0; DES_BLOCK_SIZE];

/// Direction of a [`tdes_cbc`] transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}

/// A keyed DES variant.
enum DesVariant {
    Single(Des),
    Ede2(TdesEde2),
    Ede3(TdesEde3),
}

impl DesVariant {
    fn new(keys: &[u8], key_count: usize) -> Result<Self> {
        if !(1..=3).contains(&key_count) || keys.len() < key_count * DES_BLOCK_SIZE {
            return Err(KelfError::InvalidKeyCount(key_count));
        }
        let keys = &keys[..key_count * DES_BLOCK_SIZE];
        let variant = match key_count {
            1 => Des::new_from_slice(keys).map(DesVariant::Single),
            2 => TdesEde2::new_from_slice(keys).map(DesVariant::Ede2),
            _ => TdesEde3::new_from_slice(keys).map(DesVariant::Ede3),
        };
        variant.map_err(|_| KelfError::InvalidKeyCount(key_count))
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            DesVariant::Single(c) => c.encrypt_block(block),
            DesVariant::Ede2(c) => c.encrypt_block(block),
            DesVariant::Ede3(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            DesVariant::Single(c) => c.decrypt_block(block),
            DesVariant::Ede2(c) => c.decrypt_block(block),
            DesVariant::Ede3(c) => c.decrypt_block(block),
        }
    }
}

/// Runs CBC-mode DES/Triple-DES over `buffer` in place.
///
/// The buffer length should be a multiple of [`DES_BLOCK_SIZE`]; a trailing
/// partial block is left untouched.
///
/// # Errors
///
/// Returns [`KelfError::InvalidKeyCount`] when `key_count` is not 1, 2 or 3, or when
/// `keys` is shorter than `8 * key_count` bytes.
pub fn tdes_cbc(
    direction: CipherDirection,
    buffer: &mut [u8],
    keys: &[u8],
    key_count: usize,
    iv: &[u8; DES_BLOCK_SIZE],
) -> Result<()> {
    let cipher = DesVariant::new(keys, key_count)?;
    let mut chain = *iv;

    for block in buffer.chunks_exact_mut(DES_BLOCK_SIZE) {
        match direction {
            CipherDirection::Encrypt => {
                block
                    .iter_mut()
                    .zip(chain.iter())
                    .for_each(|(b, c)| *b ^= c);
                cipher.encrypt_block(block);
                chain.copy_from_slice(block);
            }
            CipherDirection::Decrypt => {
                let mut cipher_text = [0u8; DES_BLOCK_SIZE];
                cipher_text.copy_from_slice(block);
                cipher.decrypt_block(block);
                block
                    .iter_mut()
                    .zip(chain.iter())
                    .for_each(|(b, c)| *b ^= c);
                chain = cipher_text;
            }
        }
    }
    Ok(())
}

/// Shorthand for [`tdes_cbc`] with [`CipherDirection::Encrypt`].
pub fn tdes_cbc_encrypt(
    buffer: &mut [u8],
    keys: &[u8],
    key_count: usize,
    iv: &[u8; DES_BLOCK_SIZE],
) -> Result<()> {
    tdes_cbc(CipherDirection::Encrypt, buffer, keys, key_count, iv)
}

/// Shorthand for [`tdes_cbc`] with [`CipherDirection::Decrypt`].
pub fn tdes_cbc_decrypt(
    buffer: &mut [u8],
    keys: &[u8],
    key_count: usize,
    iv: &[u8; DES_BLOCK_SIZE],
) -> Result<()> {
    tdes_cbc(CipherDirection::Decrypt, buffer, keys, key_count, iv)
}
