//! The KELF signature chain: header, bit-table, block and root signatures, plus the
//! key-encryption-key derivation and key wrapping.
//!
//! Every tag is 8 bytes and every construction is a handful of [`tdes_cbc`] calls over
//! secrets taken from the [`KeyStore`].

use crate::bit_table::bit_block_flags::BitBlockFlags;
use crate::des_cipher::{tdes_cbc, tdes_cbc_decrypt, tdes_cbc_encrypt, CipherDirection, IV_NULL};
use crate::error::Result;
use crate::fold::{fold_into, fold_words, word, Word};
use crate::kelf_keys::KeyMaterial;
use crate::key_store::{KeyName, KeyStore};

/// Computes and checks signatures for one key store.
#[derive(Debug, Clone, Copy)]
pub struct SignatureChain<'k> {
    keys: &'k KeyStore,
}

impl<'k> SignatureChain<'k> {
    pub fn new(keys: &'k KeyStore) -> Self {
        Self { keys }
    }

    /// Signature over the serialized header.
    pub fn header_signature(&self, header: &[u8]) -> Result<Word> {
        self.nested_cbc_mac(header)
    }

    /// CBC-MAC under the signature master key, unsigned with the hash key and
    /// signed again with the master key. All single-key DES.
    fn nested_cbc_mac(&self, data: &[u8]) -> Result<Word> {
        let master = self.keys.get(KeyName::SignatureMasterKey);
        let hash = self.keys.get(KeyName::SignatureHashKey);

        // A trailing partial block is zero-padded before chaining.
        let padded_len = data.len().div_ceil(8).max(1) * 8;
        let mut buffer = vec![0u8; padded_len];
        buffer[..data.len()].copy_from_slice(data);
        tdes_cbc_encrypt(&mut buffer, master, 1, &IV_NULL)?;

        let mut tag = word(&buffer[padded_len - 8..]);
        tdes_cbc_decrypt(&mut tag, hash, 1, &IV_NULL)?;
        tdes_cbc_encrypt(&mut tag, master, 1, &IV_NULL)?;
        Ok(tag)
    }

    /// Derives the key-encryption key from the first 16 header bytes.
    pub fn derive_kek(&self, header: &[u8]) -> Result<[u8; 16]> {
        let mut header_data = word(&header[..8]);
        fold_into(&mut header_data, &header[8..16]);

        let mut kbit_half = self.keys.iv(KeyName::KbitIv);
        fold_into(&mut kbit_half, &header_data);
        let mut kc_half = self.keys.iv(KeyName::KcIv);
        fold_into(&mut kc_half, &header_data);

        tdes_cbc_encrypt(
            &mut kbit_half,
            self.keys.get(KeyName::KbitMasterKey),
            2,
            &IV_NULL,
        )?;
        tdes_cbc_encrypt(
            &mut kc_half,
            self.keys.get(KeyName::KcMasterKey),
            2,
            &IV_NULL,
        )?;

        let mut kek = [0u8; 16];
        kek[..8].copy_from_slice(&kbit_half);
        kek[8..].copy_from_slice(&kc_half);
        Ok(kek)
    }

    /// Wraps (encrypt) or unwraps (decrypt) Kbit and Kc under `kek`.
    ///
    /// Each 8-byte half is transformed on its own with a zero IV; the halves are
    /// never chained together.
    pub fn transform_keys(
        &self,
        keys: &mut KeyMaterial,
        kek: &[u8; 16],
        direction: CipherDirection,
    ) -> Result<()> {
        for half in keys
            .kbit
            .chunks_exact_mut(8)
            .chain(keys.kc.chunks_exact_mut(8))
        {
            tdes_cbc(direction, half, kek, 2, &IV_NULL)?;
        }
        Ok(())
    }

    pub fn wrap_keys(&self, keys: &mut KeyMaterial, kek: &[u8; 16]) -> Result<()> {
        self.transform_keys(keys, kek, CipherDirection::Encrypt)
    }

    pub fn unwrap_keys(&self, keys: &mut KeyMaterial, kek: &[u8; 16]) -> Result<()> {
        self.transform_keys(keys, kek, CipherDirection::Decrypt)
    }

    /// Signature over the plaintext bit table.
    ///
    /// `table` holds the serialized table; exactly `block_count * 2 + 1` words of it
    /// are folded in.
    pub fn bit_table_signature(
        &self,
        keys: &KeyMaterial,
        table: &[u8],
        block_count: usize,
    ) -> Result<Word> {
        let mut hash = word(&keys.kbit[..8]);
        if keys.kbit[..8] != keys.kbit[8..] {
            fold_into(&mut hash, &keys.kbit[8..]);
        }
        fold_into(&mut hash, &keys.kc[..8]);
        if keys.kc[..8] != keys.kc[8..] {
            fold_into(&mut hash, &keys.kc[8..]);
        }

        let words = (block_count * 2 + 1) * 8;
        fold_words(&mut hash, &table[..words.min(table.len())]);

        tdes_cbc_encrypt(
            &mut hash,
            &self.keys.signature_master_and_hash_key(),
            2,
            &IV_NULL,
        )?;
        Ok(hash)
    }

    /// Signature over one plaintext content block.
    pub fn block_signature(&self, block: &[u8], flags: BitBlockFlags) -> Result<Word> {
        if !flags.is_encrypted() {
            return self.nested_cbc_mac(block);
        }

        let mut signature = [0u8; 8];
        fold_words(&mut signature, block);
        tdes_cbc_encrypt(
            &mut signature,
            &self.keys.signature_master_and_hash_key(),
            2,
            &IV_NULL,
        )?;
        Ok(signature)
    }

    /// Root signature chaining the header, bit-table and signed-block signatures.
    pub fn root_signature<'s, I>(
        &self,
        header_signature: &Word,
        bit_table_signature: &Word,
        block_signatures: I,
    ) -> Result<Word>
    where
        I: IntoIterator<Item = &'s Word>,
    {
        let mut signatures = Vec::with_capacity(16);
        signatures.extend_from_slice(header_signature);
        signatures.extend_from_slice(bit_table_signature);
        for signature in block_signatures {
            signatures.extend_from_slice(signature);
        }

        tdes_cbc_encrypt(
            &mut signatures,
            self.keys.get(KeyName::RootSignatureMasterKey),
            1,
            &IV_NULL,
        )?;

        let mut root = word(&signatures[signatures.len() - 8..]);
        tdes_cbc_decrypt(
            &mut root,
            self.keys.get(KeyName::RootSignatureHashKey),
            2,
            &IV_NULL,
        )?;
        Ok(root)
    }
}
