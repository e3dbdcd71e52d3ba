//! The bit table: the block-descriptor table that partitions KELF content.

pub mod bit_block;
pub mod bit_block_flags;

use crate::des_cipher::DES_BLOCK_SIZE;
use crate::error::{KelfError, Result};
use bit_block::BitBlock;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read, Write};
use std::ops::Range;

/// Number of descriptor slots reserved by the on-disk format.
pub const BIT_TABLE_SLOTS: usize = 256;

/// Largest bit table the format can hold, in bytes.
pub const BIT_TABLE_CAPACITY: usize = BitTable::PREAMBLE_SIZE + BIT_TABLE_SLOTS * BitBlock::SIZE;

/// Largest block count the one-byte `BlockCount` field can express.
pub const MAX_BLOCK_COUNT: usize = u8::MAX as usize;

/// Represents the bit table of a KELF container.
///
/// The table is a bounded, ordered sequence of block descriptors. Its length is
/// always checked against [`BIT_TABLE_CAPACITY`] before anything is sized from
/// untrusted input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitTable {
    /// Copy of the header's `HeaderSize`.
    pub header_size: u32,
    /// Reserved bytes following the block count.
    pub reserved: [u8; 3],
    /// Block descriptors, in content order.
    pub blocks: Vec<BitBlock>,
}

impl BitTable {
    /// Size of the `HeaderSize`, `BlockCount` and reserved fields.
    pub const PREAMBLE_SIZE: usize = 8;

    /// Serialized length of a table holding `block_count` descriptors.
    pub fn serialized_len(block_count: usize) -> usize {
        (block_count * 2 + 1) * 8
    }

    /// Serialized length of this table.
    pub fn byte_len(&self) -> usize {
        Self::serialized_len(self.blocks.len())
    }

    /// Parses a decrypted bit table of `bytes.len()` declared bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KelfError::InvalidBitTableSize`] when the declared length is larger than
    /// the capacity, not a whole number of 8-byte words, or too short for the block
    /// count it declares.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::check_declared_len(bytes.len())?;

        let mut reader = Cursor::new(bytes);
        let header_size = reader.read_u32::<LittleEndian>()?;
        let block_count = reader.read_u8()? as usize;
        let mut reserved = [0u8; 3];
        reader.read_exact(&mut reserved)?;

        if Self::serialized_len(block_count) > bytes.len() {
            return Err(KelfError::InvalidBitTableSize(format!(
                "{block_count} blocks do not fit in {:#X} bytes",
                bytes.len()
            )));
        }

        let blocks = (0..block_count)
            .map(|_| BitBlock::read(&mut reader))
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            header_size,
            reserved,
            blocks,
        })
    }

    /// Validates a bit table length declared by a container header.
    pub fn check_declared_len(len: usize) -> Result<()> {
        if len > BIT_TABLE_CAPACITY {
            return Err(KelfError::InvalidBitTableSize(format!(
                "{len:#X} exceeds capacity {BIT_TABLE_CAPACITY:#X}"
            )));
        }
        if len < Self::PREAMBLE_SIZE || len % 8 != 0 {
            return Err(KelfError::InvalidBitTableSize(format!(
                "{len:#X} is not a whole bit table"
            )));
        }
        Ok(())
    }

    /// Rejects encrypted blocks that do not end on a cipher block boundary.
    ///
    /// The tail of such a block would be neither decrypted nor covered by its
    /// signature.
    pub fn check_encrypted_alignment(&self) -> Result<()> {
        for (i, block) in self.blocks.iter().enumerate() {
            if block.flags.is_encrypted() && block.size as usize % DES_BLOCK_SIZE != 0 {
                return Err(KelfError::InvalidBitTableSize(format!(
                    "encrypted block {i} size {:#X} is not a multiple of {DES_BLOCK_SIZE}",
                    block.size
                )));
            }
        }
        Ok(())
    }

    /// Serializes the table.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        let written = self.write(&mut bytes);
        debug_assert!(written.is_ok() && bytes.len() == self.byte_len());
        bytes
    }

    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.header_size)?;
        writer.write_u8(self.blocks.len() as u8)?;
        writer.write_all(&self.reserved)?;
        for block in &self.blocks {
            block.write(writer)?;
        }
        Ok(())
    }

    /// Total content length described by the table.
    pub fn content_len(&self) -> u64 {
        self.blocks.iter().map(|b| b.size as u64).sum()
    }

    /// Byte ranges of every block within the content, in order.
    pub fn block_ranges(&self) -> impl Iterator<Item = (Range<usize>, &BitBlock)> {
        self.blocks.iter().scan(0usize, |offset, block| {
            let start = *offset;
            *offset += block.size as usize;
            Some((start..*offset, block))
        })
    }

    /// Signatures of every signed block, in block order.
    pub fn signed_block_signatures(&self) -> impl Iterator<Item = &[u8; 8]> {
        self.blocks
            .iter()
            .filter(|b| b.flags.is_signed())
            .map(|b| &b.signature)
    }

    /// Dumps the table at debug level.
    pub(crate) fn log_fields(&self) {
        debug!("bitTable.HeaderSize    = {:#X}", self.header_size);
        debug!("bitTable.BlockCount    = {}", self.blocks.len());
        debug!("bitTable.gap           = {}", hex::encode_upper(self.reserved));
        for (i, block) in self.blocks.iter().enumerate() {
            debug!(
                "bitTable.Blocks[{i}]  = size {:08X} flags {:08X} signature {}",
                block.size,
                block.flags.bits(),
                hex::encode_upper(block.signature)
            );
        }
    }
}
