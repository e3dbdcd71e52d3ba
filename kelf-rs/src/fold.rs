//! Byte-wise XOR folding used to build the keyed accumulators of the signature chain.

use crate::des_cipher::DES_BLOCK_SIZE;

/// An 8-byte fold accumulator.
pub type Word = [u8; DES_BLOCK_SIZE];

/// XORs two equal-length buffers into a new one.
///
/// Extra bytes of the longer input are ignored.
pub fn fold(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// XORs `b` into `acc`.
pub fn fold_into(acc: &mut [u8], b: &[u8]) {
    acc.iter_mut().zip(b.iter()).for_each(|(x, y)| *x ^= y);
}

/// Folds every whole 8-byte word of `buffer` into `acc`, in order.
pub fn fold_words(acc: &mut Word, buffer: &[u8]) {
    for word in buffer.chunks_exact(DES_BLOCK_SIZE) {
        fold_into(acc, word);
    }
}

/// Returns the first eight bytes of `bytes` as a word.
///
/// Callers pass slices of at least eight bytes.
pub(crate) fn word(bytes: &[u8]) -> Word {
    let mut w = [0u8; DES_BLOCK_SIZE];
    w.copy_from_slice(&bytes[..DES_BLOCK_SIZE]);
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_xor() {
        assert_eq!(fold(&[0xF0, 0x0F], &[0xFF, 0xFF]), vec![0x0F, 0xF0]);
    }

    #[test]
    fn fold_words_ignores_trailing_partial_word() {
        let mut acc = [0u8; 8];
        let mut buffer = vec![1u8; 16];
        buffer.extend_from_slice(&[0xFF; 4]);
        fold_words(&mut acc, &buffer);
        assert_eq!(acc, [0u8; 8]);
    }
}
