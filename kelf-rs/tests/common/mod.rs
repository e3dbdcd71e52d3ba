#![allow(dead_code)]

use kelf_rs::{HeaderFlags, HeaderKind, Kelf, KelfConfig, KeyStore, SystemType};

pub const TEST_KEYS: [(&str, &str); 10] = [
    ("MG_SIG_MASTER_KEY", "0F1E2D3C4B5A6978"),
    ("MG_SIG_HASH_KEY", "1122334455667788"),
    ("MG_KBIT_MASTER_KEY", "A1B2C3D4E5F60718293A4B5C6D7E8F90"),
    ("MG_KC_MASTER_KEY", "0918273645546372819AABBCCDDEEFF0"),
    ("MG_KBIT_IV", "0102030405060708"),
    ("MG_KC_IV", "8070605040302010"),
    ("MG_CONTENT_IV", "DEADBEEFCAFEBABE"),
    ("MG_CONTENT_TABLE_IV", "0011223344556677"),
    ("MG_ROOTSIG_MASTER_KEY", "7766554433221100"),
    ("MG_ROOTSIG_HASH_KEY", "F0E1D2C3B4A5968778695A4B3C2D1E0F"),
];

pub fn key_store() -> KeyStore {
    KeyStore::from_hex_entries(TEST_KEYS).expect("test key store")
}

pub fn key_store_with_override(kbit: &str, kc: &str) -> KeyStore {
    let mut entries = TEST_KEYS.to_vec();
    entries.push(("OVERRIDE_KBIT", kbit));
    entries.push(("OVERRIDE_KC", kc));
    KeyStore::from_hex_entries(entries).expect("test key store with override")
}

/// A payload with no trailing zeros so that padding is predictable.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7) | 1).collect()
}

/// Imports `payload` and returns the serialized container with the padded content.
pub fn build(keys: &KeyStore, payload: Vec<u8>, flags: HeaderFlags) -> (Vec<u8>, Vec<u8>) {
    let mut kelf = Kelf::new(keys, KelfConfig::default());
    kelf.load_content_bytes(payload, HeaderKind::Fmcb)
        .expect("import payload");
    let bytes = kelf
        .to_kelf_bytes(HeaderKind::Fmcb, SystemType::Ps2, flags)
        .expect("build container");
    (bytes, kelf.content().to_vec())
}
