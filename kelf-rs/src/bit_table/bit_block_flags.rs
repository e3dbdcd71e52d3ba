use bitflags::bitflags;

bitflags! {
    /// Describes how a content block is protected.
    ///
    /// The four legal combinations are: plain, encrypted, signed, and encrypted + signed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BitBlockFlags: u32 {
        /// The block is stored Triple-DES encrypted under Kc.
        const ENCRYPTED = 0x01;
        /// The block carries an 8-byte signature in the bit table.
        const SIGNED = 0x02;

        const _ = !0;
    }
}

impl BitBlockFlags {
    /// Encrypted and signed, the only protected layout block creation supports.
    pub const SIGNED_ENCRYPTED: Self = Self::ENCRYPTED.union(Self::SIGNED);

    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    pub fn is_signed(self) -> bool {
        self.contains(Self::SIGNED)
    }
}
