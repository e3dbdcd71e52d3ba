mod common;

use common::{build, key_store, payload};
use kelf_rs::des_cipher::tdes_cbc_encrypt;
use kelf_rs::signature_chain::SignatureChain;
use kelf_rs::{
    BitBlock, BitBlockFlags, BitTable, HeaderFlags, Kelf, KelfConfig, KelfError, KelfHeader,
    KeyMaterial, KeyName, KeyStore, SystemType, VerificationMode,
};

const ROOT_SIGNATURE_OFFSET: usize = 0x78;

#[test]
fn every_bit_outside_plain_content_is_protected() {
    let keys = key_store();
    let (bytes, padded) = build(&keys, payload(0x20), HeaderFlags::DEFAULT);
    let plain_start = Kelf::header_region_size(2);
    let plain_end = plain_start + padded.len() - 0x10;

    for offset in 0..bytes.len() {
        for bit in 0..8 {
            let mut tampered = bytes.clone();
            tampered[offset] ^= 1 << bit;

            let mut kelf = Kelf::new(&keys, KelfConfig::default());
            let result = kelf.load_kelf_bytes(&tampered);
            if (plain_start..plain_end).contains(&offset) {
                assert!(result.is_ok(), "offset {offset:#X} bit {bit}");
                assert_ne!(kelf.content(), &padded[..]);
            } else {
                assert!(result.is_err(), "offset {offset:#X} bit {bit}");
                assert!(kelf.content().is_empty());
            }
        }
    }
}

#[test]
fn header_tampering_is_reported_as_header_signature() {
    let keys = key_store();
    let (mut bytes, _) = build(&keys, payload(0x20), HeaderFlags::DEFAULT);
    bytes[0x03] ^= 0x80;
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidHeaderSignature)
    ));
}

#[test]
fn signed_block_tampering_names_the_block() {
    let keys = key_store();
    let (mut bytes, _) = build(&keys, payload(0x20), HeaderFlags::DEFAULT);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidContentSignature(1))
    ));
}

#[test]
fn root_signature_mismatch_depends_on_verification_mode() {
    let keys = key_store();
    let (mut bytes, padded) = build(&keys, payload(0x30), HeaderFlags::DEFAULT);
    bytes[ROOT_SIGNATURE_OFFSET] ^= 0xFF;

    let mut strict = Kelf::new(&keys, KelfConfig::default());
    assert!(matches!(
        strict.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidRootSignature)
    ));

    let lenient_config = KelfConfig::new().with_verification(VerificationMode::Lenient);
    let mut lenient = Kelf::new(&keys, lenient_config);
    lenient.load_kelf_bytes(&bytes).unwrap();
    assert_eq!(lenient.content(), &padded[..]);
}

#[test]
fn blacklist_flag_depends_on_verification_mode() {
    let keys = key_store();
    let chain = SignatureChain::new(&keys);
    let (mut bytes, padded) = build(&keys, payload(0x30), HeaderFlags::DEFAULT);
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    kelf.load_kelf_bytes(&bytes).unwrap();

    // Set the flag and re-sign; the KEK only depends on the tag, so the keys stay valid.
    bytes[0x1A] |= HeaderFlags::BLACKLIST.bits() as u8;
    let header_signature = chain.header_signature(&bytes[..0x20]).unwrap();
    let bit_table_signature: [u8; 8] = bytes[0x70..0x78].try_into().unwrap();
    let root_signature = chain
        .root_signature(
            &header_signature,
            &bit_table_signature,
            kelf.bit_table().signed_block_signatures(),
        )
        .unwrap();
    bytes[0x20..0x28].copy_from_slice(&header_signature);
    bytes[ROOT_SIGNATURE_OFFSET..ROOT_SIGNATURE_OFFSET + 8].copy_from_slice(&root_signature);

    let mut strict = Kelf::new(&keys, KelfConfig::default());
    assert!(matches!(
        strict.load_kelf_bytes(&bytes),
        Err(KelfError::UnsupportedFile(_))
    ));

    let lenient_config = KelfConfig::new().with_verification(VerificationMode::Lenient);
    let mut lenient = Kelf::new(&keys, lenient_config);
    lenient.load_kelf_bytes(&bytes).unwrap();
    assert_eq!(lenient.content(), &padded[..]);
    assert!(lenient.header().unwrap().flags.contains(HeaderFlags::BLACKLIST));
}

#[test]
fn failed_load_keeps_previous_state() {
    let keys = key_store();
    let (good, padded) = build(&keys, payload(0x30), HeaderFlags::DEFAULT);
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    kelf.load_kelf_bytes(&good).unwrap();

    let mut bad = good.clone();
    bad[0x50] ^= 0x10;
    assert!(kelf.load_kelf_bytes(&bad).is_err());
    assert_eq!(kelf.content(), &padded[..]);
    assert_eq!(kelf.bit_table().blocks.len(), 2);
}

#[test]
fn truncated_content_is_rejected() {
    let keys = key_store();
    let (bytes, _) = build(&keys, payload(0x30), HeaderFlags::DEFAULT);
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes[..bytes.len() - 1]),
        Err(KelfError::Truncated(_))
    ));
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes[..0x30]),
        Err(KelfError::Truncated(_))
    ));
}

#[test]
fn trailing_bytes_are_ignored() {
    let keys = key_store();
    let (mut bytes, padded) = build(&keys, payload(0x30), HeaderFlags::DEFAULT);
    bytes.extend_from_slice(&[0x5A; 0x10]);
    let mut kelf = Kelf::new(&keys, KelfConfig::default());
    kelf.load_kelf_bytes(&bytes).unwrap();
    assert_eq!(kelf.content(), &padded[..]);
}

/// Assembles a container around `stored_content` with every signature valid for `blocks`.
fn assemble(
    store: &KeyStore,
    keys: &KeyMaterial,
    blocks: Vec<BitBlock>,
    stored_content: &[u8],
) -> Vec<u8> {
    let chain = SignatureChain::new(store);

    let mut header = KelfHeader::new([0x42; 16], SystemType::Ps2, HeaderFlags::DEFAULT);
    header.content_size = stored_content.len() as u32;
    header.header_size = Kelf::header_region_size(blocks.len()) as u32;
    let header_bytes = header.to_bytes();
    let header_signature = chain.header_signature(&header_bytes).unwrap();

    let table = BitTable {
        header_size: header.header_size,
        reserved: [0; 3],
        blocks,
    };
    let mut table_bytes = table.to_bytes();
    let table_signature = chain
        .bit_table_signature(keys, &table_bytes, table.blocks.len())
        .unwrap();
    let root_signature = chain
        .root_signature(
            &header_signature,
            &table_signature,
            table.signed_block_signatures(),
        )
        .unwrap();

    let table_iv: [u8; 8] = store.get(KeyName::ContentTableIv).try_into().unwrap();
    tdes_cbc_encrypt(&mut table_bytes, &keys.kbit, 2, &table_iv).unwrap();
    let kek = chain.derive_kek(&header_bytes).unwrap();
    let mut wrapped = keys.clone();
    chain.wrap_keys(&mut wrapped, &kek).unwrap();

    let mut bytes = header_bytes.to_vec();
    bytes.extend_from_slice(&header_signature);
    bytes.extend_from_slice(&wrapped.kbit);
    bytes.extend_from_slice(&wrapped.kc);
    bytes.extend_from_slice(&table_bytes);
    bytes.extend_from_slice(&table_signature);
    bytes.extend_from_slice(&root_signature);
    bytes.extend_from_slice(stored_content);
    bytes
}

#[test]
fn signed_only_block_is_verified_with_nested_mac() {
    let store = key_store();
    let chain = SignatureChain::new(&store);
    let content: Vec<u8> = (0u8..0x20).collect();
    let keys = KeyMaterial::new([0x11; 16], [0x22; 16]);

    let mut block = BitBlock::new(content.len() as u32, BitBlockFlags::SIGNED);
    block.signature = chain.block_signature(&content, block.flags).unwrap();
    let mut bytes = assemble(&store, &keys, vec![block], &content);

    let mut kelf = Kelf::new(&store, KelfConfig::default());
    kelf.load_kelf_bytes(&bytes).unwrap();
    assert_eq!(kelf.content(), &content[..]);
    assert_eq!(kelf.keys(), &keys);

    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidContentSignature(0))
    ));
}

#[test]
fn encrypted_block_with_partial_cipher_block_is_rejected() {
    let store = key_store();
    let chain = SignatureChain::new(&store);
    let keys = KeyMaterial::new([0x11; 16], [0x22; 16]);
    let iv: [u8; 8] = store.get(KeyName::ContentIv).try_into().unwrap();

    let plain: Vec<u8> = (1u8..=0x13).collect();
    let mut block = BitBlock::new(plain.len() as u32, BitBlockFlags::SIGNED_ENCRYPTED);
    block.signature = chain.block_signature(&plain, block.flags).unwrap();
    let mut stored = plain.clone();
    tdes_cbc_encrypt(&mut stored, &keys.kc, 2, &iv).unwrap();
    let mut bytes = assemble(&store, &keys, vec![block], &stored);

    let mut kelf = Kelf::new(&store, KelfConfig::default());
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidBitTableSize(_))
    ));

    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(matches!(
        kelf.load_kelf_bytes(&bytes),
        Err(KelfError::InvalidBitTableSize(_))
    ));
    assert!(kelf.content().is_empty());
}
