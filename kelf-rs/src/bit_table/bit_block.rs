use super::bit_block_flags::BitBlockFlags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Represents one descriptor in the KELF bit table.
/// Each descriptor covers one contiguous block of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitBlock {
    /// The length of the block in bytes.
    pub size: u32,
    /// How the block is protected.
    pub flags: BitBlockFlags,
    /// The block signature; meaningful only when the block is signed.
    pub signature: [u8; 8],
}

impl BitBlock {
    /// Serialized size of a descriptor.
    pub const SIZE: usize = 16;

    pub fn new(size: u32, flags: BitBlockFlags) -> Self {
        Self {
            size,
            flags,
            signature: [0; 8],
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let size = reader.read_u32::<LittleEndian>()?;
        let flags = BitBlockFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
        let mut signature = [0u8; 8];
        reader.read_exact(&mut signature)?;
        Ok(Self {
            size,
            flags,
            signature,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_u32::<LittleEndian>(self.flags.bits())?;
        writer.write_all(&self.signature)
    }
}
