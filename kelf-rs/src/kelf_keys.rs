/// Content and bit-table keys of a container.
///
/// On disk both keys are wrapped under the per-container KEK; in memory they are
/// always kept unwrapped.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Protects the bit table.
    pub kbit: [u8; 16],
    /// Protects encrypted content blocks.
    pub kc: [u8; 16],
}

/// Kc used for new containers.
pub const DEFAULT_KC: [u8; 16] = [0xBB; 16];

impl KeyMaterial {
    pub fn new(kbit: [u8; 16], kc: [u8; 16]) -> Self {
        Self { kbit, kc }
    }

    /// Kc laid out for a content cipher using `key_count` DES keys.
    ///
    /// Three-key operation reuses the first half as the third key, which makes it
    /// equivalent to two-key operation.
    pub fn content_key(&self, key_count: usize) -> Vec<u8> {
        let mut key = self.kc.to_vec();
        if key_count == 3 {
            key.extend_from_slice(&self.kc[..8]);
        }
        key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kbit", &hex::encode_upper(self.kbit))
            .field("kc", &hex::encode_upper(self.kc))
            .finish()
    }
}
