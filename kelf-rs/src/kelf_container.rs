use crate::{
    bit_table::{bit_block::BitBlock, BitTable},
    block_plan::{self, BlockPlan},
    des_cipher::{tdes_cbc_decrypt, tdes_cbc_encrypt},
    error::{KelfError, Result},
    ext::io_ext::{ArrayReadExt, SeekExt},
    header_kind::HeaderKind,
    kelf_config::{KelfConfig, VerificationMode},
    kelf_header::{HeaderFlags, KelfHeader, SystemType},
    kelf_keys::{KeyMaterial, DEFAULT_KC},
    key_store::{KeyName, KeyStore},
    signature_chain::SignatureChain,
};
use log::{debug, info, warn};
use std::{
    fs,
    io::{self, Cursor, Seek},
    path::Path,
};

/// Size of every signature stored in a container.
const SIGNATURE_SIZE: usize = 8;

/// Bytes between the end of the header and the start of the bit table.
const KEYS_REGION_SIZE: usize = SIGNATURE_SIZE + 16 + 16;

/// Represents a KELF container in memory: header, bit table, keys and content.
///
/// `Kelf` is the entry point for both directions of the codec. Content and keys are
/// always held in plaintext; wrapping, signing and encryption happen on copies while
/// saving, so repeated saves of the same container produce identical bytes.
///
/// # Usage
///
/// Decrypting an existing container:
///
/// ```rust,no_run
/// use kelf_rs::{Kelf, KelfConfig, KeyStore};
///
/// # fn run(keys: &KeyStore) -> Result<(), kelf_rs::KelfError> {
/// let mut kelf = Kelf::new(keys, KelfConfig::default());
/// kelf.load_kelf("boot.kelf")?;
/// kelf.save_content("boot.elf")?;
/// # Ok(())
/// # }
/// ```
///
/// Building a new container from a raw payload:
///
/// ```rust,no_run
/// use kelf_rs::{HeaderFlags, HeaderKind, Kelf, KelfConfig, KeyStore, SystemType};
///
/// # fn run(keys: &KeyStore) -> Result<(), kelf_rs::KelfError> {
/// let mut kelf = Kelf::new(keys, KelfConfig::default());
/// kelf.load_content("boot.elf", HeaderKind::Fmcb)?;
/// kelf.save_kelf("boot.kelf", HeaderKind::Fmcb, SystemType::Ps2, HeaderFlags::DEFAULT)?;
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// A `Kelf` is owned by the call that created it and is never shared; every
/// operation runs synchronously to completion.
#[derive(Debug)]
pub struct Kelf<'k> {
    /// Platform secrets used by the signature chain.
    key_store: &'k KeyStore,
    /// Verification policy and header-kind table.
    config: KelfConfig,
    /// Header of the last loaded container, if any.
    header: Option<KelfHeader>,
    /// Block descriptors for `content`.
    bit_table: BitTable,
    /// Unwrapped Kbit and Kc.
    keys: KeyMaterial,
    /// Plaintext content.
    content: Vec<u8>,
}

impl<'k> Kelf<'k> {
    /// Creates an empty container bound to a key store and configuration.
    pub fn new(key_store: &'k KeyStore, config: KelfConfig) -> Self {
        Self {
            key_store,
            config,
            header: None,
            bit_table: BitTable::default(),
            keys: KeyMaterial::new([0; 16], DEFAULT_KC),
            content: Vec::new(),
        }
    }

    pub fn config(&self) -> &KelfConfig {
        &self.config
    }

    /// Header of the last loaded container.
    pub fn header(&self) -> Option<&KelfHeader> {
        self.header.as_ref()
    }

    pub fn bit_table(&self) -> &BitTable {
        &self.bit_table
    }

    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    fn chain(&self) -> SignatureChain<'k> {
        SignatureChain::new(self.key_store)
    }

    /// Loads, verifies and decrypts a container file.
    pub fn load_kelf<P: AsRef<Path>>(&mut self, file_name: P) -> Result<()> {
        let path = file_name.as_ref();
        let data = fs::read(path).map_err(|e| {
            KelfError::UnsupportedFile(format!("cannot open {}: {e}", path.display()))
        })?;
        info!("Loading KELF {}", path.display());
        self.load_kelf_bytes(&data)
    }

    /// Loads, verifies and decrypts a container held in memory.
    ///
    /// Nothing in `self` changes unless every check passes.
    pub fn load_kelf_bytes(&mut self, data: &[u8]) -> Result<()> {
        let chain = self.chain();
        let mut reader = Cursor::new(data);

        let header = KelfHeader::read(&mut reader).map_err(truncated("header"))?;
        let header_bytes = &data[..KelfHeader::SIZE];
        let kinds = self.config.header_kinds.identify(&header.user_defined);
        header.log_fields(kinds.first().map(|k| k.as_str()));

        if let Some(reason) = header.unsupported_reason() {
            match self.config.verification {
                VerificationMode::Strict => return Err(KelfError::UnsupportedFile(reason)),
                VerificationMode::Lenient => warn!("Unsupported header ({reason}), continuing"),
            }
        }

        let header_signature = reader
            .read_array::<SIGNATURE_SIZE>()
            .map_err(truncated("header signature"))?;
        debug!("HeaderSignature        = {}", hex::encode_upper(header_signature));
        if header_signature != chain.header_signature(header_bytes)? {
            return Err(KelfError::InvalidHeaderSignature);
        }

        let kek = chain.derive_kek(header_bytes)?;
        let kbit = reader.read_array::<16>().map_err(truncated("Kbit"))?;
        let kc = reader.read_array::<16>().map_err(truncated("Kc"))?;
        debug!("Kbit                   = {}", hex::encode_upper(kbit));
        debug!("Kc                     = {}", hex::encode_upper(kc));
        let mut keys = KeyMaterial::new(kbit, kc);
        chain.unwrap_keys(&mut keys, &kek)?;
        if let Some((kbit, kc)) = self.key_store.override_keys() {
            info!("Using override Kbit/Kc from key store");
            keys = KeyMaterial::new(kbit, kc);
        }

        let bit_table_size = header.header_size as i64
            - reader.stream_position()? as i64
            - (2 * SIGNATURE_SIZE) as i64;
        debug!("BitTableSize           = {bit_table_size:#X}");
        let bit_table_size = usize::try_from(bit_table_size).map_err(|_| {
            KelfError::InvalidBitTableSize(format!("negative size {bit_table_size:#X}"))
        })?;
        BitTable::check_declared_len(bit_table_size)?;

        let mut bit_table_bytes = reader
            .read_vec(bit_table_size)
            .map_err(truncated("bit table"))?;
        tdes_cbc_decrypt(
            &mut bit_table_bytes,
            &keys.kbit,
            2,
            &self.key_store.iv(KeyName::ContentTableIv),
        )?;
        let bit_table = BitTable::parse(&bit_table_bytes)?;
        bit_table.check_encrypted_alignment()?;
        bit_table.log_fields();

        let bit_table_signature = reader
            .read_array::<SIGNATURE_SIZE>()
            .map_err(truncated("bit table signature"))?;
        debug!(
            "BitTableSignature      = {}",
            hex::encode_upper(bit_table_signature)
        );
        if bit_table_signature
            != chain.bit_table_signature(&keys, &bit_table_bytes, bit_table.blocks.len())?
        {
            return Err(KelfError::InvalidBitTableSignature);
        }

        let root_signature = reader
            .read_array::<SIGNATURE_SIZE>()
            .map_err(truncated("root signature"))?;
        debug!("RootSignature          = {}", hex::encode_upper(root_signature));
        let expected_root = chain.root_signature(
            &header_signature,
            &bit_table_signature,
            bit_table.signed_block_signatures(),
        )?;
        if root_signature != expected_root {
            match self.config.verification {
                VerificationMode::Strict => return Err(KelfError::InvalidRootSignature),
                VerificationMode::Lenient => warn!("Root signature mismatch, continuing"),
            }
        }

        let content_len = bit_table.content_len();
        if content_len > reader.remaining()? {
            return Err(KelfError::Truncated(format!(
                "content of {content_len:#X} bytes, {:#X} available",
                reader.remaining()?
            )));
        }
        let mut content = reader
            .read_vec(content_len as usize)
            .map_err(truncated("content"))?;
        if header.content_size as u64 != content_len {
            debug!(
                "header.ContentSize {:#X} differs from block total {content_len:#X}",
                header.content_size
            );
        }
        let trailing = reader.remaining()?;
        if trailing > 0 {
            debug!("Ignoring {trailing:#X} trailing bytes");
        }

        self.decrypt_content(&mut content, &bit_table, &keys, header.flags.content_key_count())?;
        Self::verify_content_signatures(&chain, &content, &bit_table)?;

        info!(
            "KELF verified: {} blocks, {:#X} content bytes",
            bit_table.blocks.len(),
            content.len()
        );
        self.header = Some(header);
        self.bit_table = bit_table;
        self.keys = keys;
        self.content = content;
        Ok(())
    }

    fn decrypt_content(
        &self,
        content: &mut [u8],
        bit_table: &BitTable,
        keys: &KeyMaterial,
        key_count: usize,
    ) -> Result<()> {
        let content_key = keys.content_key(key_count);
        let iv = self.key_store.iv(KeyName::ContentIv);
        for (range, block) in bit_table.block_ranges() {
            if block.flags.is_encrypted() {
                tdes_cbc_decrypt(&mut content[range], &content_key, key_count, &iv)?;
            }
        }
        Ok(())
    }

    fn verify_content_signatures(
        chain: &SignatureChain<'_>,
        content: &[u8],
        bit_table: &BitTable,
    ) -> Result<()> {
        for (i, (range, block)) in bit_table.block_ranges().enumerate() {
            if !block.flags.is_signed() {
                continue;
            }
            let signature = chain.block_signature(&content[range], block.flags)?;
            if signature != block.signature {
                return Err(KelfError::InvalidContentSignature(i));
            }
        }
        Ok(())
    }

    /// Writes the current content verbatim.
    pub fn save_content<P: AsRef<Path>>(&self, file_name: P) -> Result<()> {
        fs::write(file_name, &self.content)?;
        Ok(())
    }

    /// Reads a raw payload and prepares it with the default block plan.
    pub fn load_content<P: AsRef<Path>>(&mut self, file_name: P, kind: HeaderKind) -> Result<()> {
        let path = file_name.as_ref();
        let data = fs::read(path).map_err(|e| {
            KelfError::UnsupportedFile(format!("cannot open {}: {e}", path.display()))
        })?;
        self.load_content_bytes(data, kind)
    }

    /// Prepares an in-memory payload with the default block plan.
    ///
    /// The payload's trailing zero run is trimmed, the rest is padded, and two blocks
    /// are laid over it: the bulk in the clear and a final encrypted, signed block.
    pub fn load_content_bytes(&mut self, mut content: Vec<u8>, kind: HeaderKind) -> Result<()> {
        let raw_len = content.len();
        block_plan::pad_content(&mut content);
        debug!("Content resized from {raw_len:#X} to {:#X}", content.len());

        let plan = BlockPlan::signed_tail(content.len());
        let blocks = plan.apply(content.len())?;

        self.header = None;
        self.keys = KeyMaterial::new(self.config.header_kinds.get(kind).kbit_seed, DEFAULT_KC);
        self.content = content;
        self.set_blocks(blocks);
        Ok(())
    }

    /// Re-partitions the current content with `plan`.
    pub fn apply_block_plan(&mut self, plan: &BlockPlan) -> Result<()> {
        let blocks = plan.apply(self.content.len())?;
        self.set_blocks(blocks);
        Ok(())
    }

    fn set_blocks(&mut self, blocks: Vec<BitBlock>) {
        self.bit_table = BitTable {
            header_size: Self::header_region_size(blocks.len()) as u32,
            reserved: [0; 3],
            blocks,
        };
    }

    /// Size of header, signatures, keys and a bit table of `block_count` blocks.
    pub fn header_region_size(block_count: usize) -> usize {
        KelfHeader::SIZE
            + KEYS_REGION_SIZE
            + BitTable::serialized_len(block_count)
            + 2 * SIGNATURE_SIZE
    }

    /// Builds, signs and encrypts the container and writes it to `file_name`.
    ///
    /// The file is only created once the whole container has been built.
    pub fn save_kelf<P: AsRef<Path>>(
        &self,
        file_name: P,
        kind: HeaderKind,
        system_type: SystemType,
        flags: HeaderFlags,
    ) -> Result<()> {
        let bytes = self.to_kelf_bytes(kind, system_type, flags)?;
        fs::write(file_name, bytes)?;
        Ok(())
    }

    /// Builds, signs and encrypts the container in memory.
    ///
    /// Flags that a strict load would refuse are rejected here, as is a zero content
    /// key count when any block is encrypted.
    pub fn to_kelf_bytes(
        &self,
        kind: HeaderKind,
        system_type: SystemType,
        flags: HeaderFlags,
    ) -> Result<Vec<u8>> {
        block_plan::validate_blocks(&self.bit_table.blocks)?;
        if self.bit_table.content_len() != self.content.len() as u64 {
            return Err(KelfError::UnsupportedBlockConfiguration(format!(
                "blocks cover {:#X} bytes, content is {:#X}",
                self.bit_table.content_len(),
                self.content.len()
            )));
        }
        let content_size = u32::try_from(self.content.len()).map_err(|_| {
            KelfError::UnsupportedBlockConfiguration("content larger than 4 GiB".into())
        })?;

        let key_count = flags.content_key_count();
        if key_count == 0 && self.bit_table.blocks.iter().any(|b| b.flags.is_encrypted()) {
            return Err(KelfError::InvalidKeyCount(key_count));
        }

        let chain = self.chain();
        let header_size = Self::header_region_size(self.bit_table.blocks.len()) as u32;

        let mut header = KelfHeader::new(self.config.header_kinds.get(kind).tag, system_type, flags);
        header.content_size = content_size;
        header.header_size = header_size;
        if let Some(reason) = header.unsupported_reason() {
            return Err(KelfError::UnsupportedFile(reason));
        }
        let header_bytes = header.to_bytes();

        let mut bit_table = self.bit_table.clone();
        bit_table.header_size = header_size;
        let mut content = self.content.clone();

        let content_key = self.keys.content_key(key_count);
        let content_iv = self.key_store.iv(KeyName::ContentIv);
        let ranges: Vec<_> = self
            .bit_table
            .block_ranges()
            .map(|(range, _)| range)
            .collect();
        for (block, range) in bit_table.blocks.iter_mut().zip(ranges) {
            if block.flags.is_signed() {
                block.signature = chain.block_signature(&content[range.clone()], block.flags)?;
            }
            if block.flags.is_encrypted() {
                tdes_cbc_encrypt(&mut content[range], &content_key, key_count, &content_iv)?;
            }
        }

        let header_signature = chain.header_signature(&header_bytes)?;
        let mut bit_table_bytes = bit_table.to_bytes();
        let bit_table_signature =
            chain.bit_table_signature(&self.keys, &bit_table_bytes, bit_table.blocks.len())?;
        let root_signature = chain.root_signature(
            &header_signature,
            &bit_table_signature,
            bit_table.signed_block_signatures(),
        )?;

        tdes_cbc_encrypt(
            &mut bit_table_bytes,
            &self.keys.kbit,
            2,
            &self.key_store.iv(KeyName::ContentTableIv),
        )?;

        let kek = chain.derive_kek(&header_bytes)?;
        let mut wrapped = self.keys.clone();
        chain.wrap_keys(&mut wrapped, &kek)?;

        header.log_fields(Some(kind.as_str()));
        bit_table.log_fields();

        let mut out = Vec::with_capacity(header_size as usize + content.len());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&header_signature);
        out.extend_from_slice(&wrapped.kbit);
        out.extend_from_slice(&wrapped.kc);
        out.extend_from_slice(&bit_table_bytes);
        out.extend_from_slice(&bit_table_signature);
        out.extend_from_slice(&root_signature);
        out.extend_from_slice(&content);

        info!(
            "KELF built: {kind} header, {} blocks, {:#X} bytes",
            bit_table.blocks.len(),
            out.len()
        );
        Ok(out)
    }
}

/// Maps a short read of `what` to [`KelfError::Truncated`].
fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> KelfError {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => KelfError::Truncated(format!("missing {what}")),
        _ => KelfError::Io(e),
    }
}
