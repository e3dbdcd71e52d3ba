use kelf_rs::des_cipher::{tdes_cbc, tdes_cbc_decrypt, tdes_cbc_encrypt, CipherDirection, IV_NULL};
use kelf_rs::KelfError;

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

#[test]
fn single_key_matches_fips81_cbc_example() {
    let key = unhex("0123456789ABCDEF");
    let iv: [u8; 8] = unhex("1234567890ABCDEF").try_into().unwrap();
    let mut buffer = b"Now is the time for all ".to_vec();

    tdes_cbc_encrypt(&mut buffer, &key, 1, &iv).unwrap();
    assert_eq!(
        buffer,
        unhex("E5C7CDDE872BF27C43E934008C389C0F683788499A7C05F6")
    );

    tdes_cbc_decrypt(&mut buffer, &key, 1, &iv).unwrap();
    assert_eq!(buffer, b"Now is the time for all ");
}

#[test]
fn single_key_matches_classic_des_vector() {
    let key = unhex("133457799BBCDFF1");
    let mut block = unhex("0123456789ABCDEF");
    tdes_cbc_encrypt(&mut block, &key, 1, &IV_NULL).unwrap();
    assert_eq!(block, unhex("85E813540F0AB405"));
}

#[test]
fn ede_with_repeated_key_degenerates_to_des() {
    let key = unhex("133457799BBCDFF1");
    for key_count in [2, 3] {
        let keys = key.repeat(key_count);
        let mut block = unhex("0123456789ABCDEF");
        tdes_cbc_encrypt(&mut block, &keys, key_count, &IV_NULL).unwrap();
        assert_eq!(block, unhex("85E813540F0AB405"), "key count {key_count}");
    }
}

#[test]
fn three_key_matches_sp800_67_example_block() {
    let keys = unhex("0123456789ABCDEF23456789ABCDEF01456789ABCDEF0123");
    let mut block = b"The qufc".to_vec();
    tdes_cbc_encrypt(&mut block, &keys, 3, &IV_NULL).unwrap();
    assert_eq!(block, unhex("A826FD8CE53B855F"));
}

#[test]
fn two_key_matches_reference_vectors() {
    let keys = unhex("0123456789ABCDEFFEDCBA9876543210");
    let plain = b"Now is the time for all ";

    let mut block = plain[..8].to_vec();
    tdes_cbc(CipherDirection::Encrypt, &mut block, &keys, 2, &IV_NULL).unwrap();
    assert_eq!(block, unhex("D80A0D8B2BAE5E4E"));
    tdes_cbc(CipherDirection::Decrypt, &mut block, &keys, 2, &IV_NULL).unwrap();
    assert_eq!(block, &plain[..8]);

    let iv: [u8; 8] = unhex("1234567890ABCDEF").try_into().unwrap();
    let mut buffer = plain.to_vec();
    tdes_cbc(CipherDirection::Encrypt, &mut buffer, &keys, 2, &iv).unwrap();
    assert_eq!(
        buffer,
        unhex("F85D4AB92066789E1D0430671F28AE7AB9627D35385D2E24")
    );
    tdes_cbc(CipherDirection::Decrypt, &mut buffer, &keys, 2, &iv).unwrap();
    assert_eq!(buffer, plain);
}

#[test]
fn two_key_equals_three_key_with_first_key_repeated() {
    let k1k2 = unhex("0123456789ABCDEF23456789ABCDEF01");
    let mut k1k2k1 = k1k2.clone();
    k1k2k1.extend_from_slice(&k1k2[..8]);
    let iv = [0x5A; 8];

    let mut a = b"sixteen byte msg".to_vec();
    let mut b = a.clone();
    tdes_cbc_encrypt(&mut a, &k1k2, 2, &iv).unwrap();
    tdes_cbc_encrypt(&mut b, &k1k2k1, 3, &iv).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, b"sixteen byte msg");
}

#[test]
fn key_count_outside_range_is_rejected() {
    let keys = [0x11u8; 32];
    for key_count in [0, 4, 7] {
        let mut buffer = [0u8; 8];
        let result = tdes_cbc(CipherDirection::Encrypt, &mut buffer, &keys, key_count, &IV_NULL);
        assert!(
            matches!(result, Err(KelfError::InvalidKeyCount(n)) if n == key_count),
            "key count {key_count}"
        );
        assert_eq!(buffer, [0u8; 8]);
    }
}

#[test]
fn short_key_material_is_rejected() {
    let mut buffer = [0u8; 8];
    let result = tdes_cbc_encrypt(&mut buffer, &[0x11u8; 16], 3, &IV_NULL);
    assert!(matches!(result, Err(KelfError::InvalidKeyCount(3))));
}
