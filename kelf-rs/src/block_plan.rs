//! Turns a raw payload into content blocks ready for signing and encryption.

use crate::bit_table::bit_block::BitBlock;
use crate::bit_table::bit_block_flags::BitBlockFlags;
use crate::bit_table::MAX_BLOCK_COUNT;
use crate::error::{KelfError, Result};

/// How many trailing bytes are scanned for a zero run.
pub const TAIL_SCAN_LEN: usize = 0x18;

/// Zero padding appended after the payload: three 8-byte blocks.
pub const TAIL_PADDING_LEN: usize = 3 * 8;

/// Size of the encrypted and signed block closing the default plan.
pub const SIGNED_TAIL_LEN: usize = 0x10;

/// Encrypted blocks must be a multiple of this size when a container is built.
pub const ENCRYPTED_BLOCK_ALIGNMENT: usize = 0x10;

/// Length of the zero run to drop from the end of `content`.
///
/// Only the last [`TAIL_SCAN_LEN`] bytes are inspected. A run that fills the whole
/// window is kept as payload.
pub fn trailing_zero_run(content: &[u8]) -> usize {
    let window = content.len().min(TAIL_SCAN_LEN);
    let run = content
        .iter()
        .rev()
        .take(window)
        .take_while(|b| **b == 0)
        .count();
    if run == window {
        0
    } else {
        run
    }
}

/// Length `content` is resized to before blocks are built.
pub fn padded_len(content: &[u8]) -> usize {
    let trimmed = content.len() - trailing_zero_run(content);
    trimmed.next_multiple_of(8) + TAIL_PADDING_LEN
}

/// Trims the trailing zero run and appends the zero padding, in place.
pub fn pad_content(content: &mut Vec<u8>) {
    let len = padded_len(content);
    content.resize(len, 0);
}

/// One requested block of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub size: u32,
    pub flags: BitBlockFlags,
}

impl BlockSpec {
    pub fn new(size: u32, flags: BitBlockFlags) -> Self {
        Self { size, flags }
    }
}

/// An ordered list of block requests, laid over content from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    specs: Vec<BlockSpec>,
}

impl BlockPlan {
    pub fn new(specs: Vec<BlockSpec>) -> Self {
        Self { specs }
    }

    /// The default plan: everything but the last 0x10 bytes in the clear, then one
    /// encrypted and signed block.
    pub fn signed_tail(content_len: usize) -> Self {
        let head = content_len.saturating_sub(SIGNED_TAIL_LEN) as u32;
        Self::new(vec![
            BlockSpec::new(head, BitBlockFlags::empty()),
            BlockSpec::new(SIGNED_TAIL_LEN as u32, BitBlockFlags::SIGNED_ENCRYPTED),
        ])
    }

    pub fn specs(&self) -> &[BlockSpec] {
        &self.specs
    }

    /// Lays the plan over `content_len` bytes.
    ///
    /// The declared-last block, or the first block that would reach past the end,
    /// takes exactly the remaining length and ends the table.
    pub fn apply(&self, content_len: usize) -> Result<Vec<BitBlock>> {
        if self.specs.is_empty() {
            return Err(KelfError::UnsupportedBlockConfiguration(
                "empty block plan".into(),
            ));
        }

        let mut blocks = Vec::with_capacity(self.specs.len());
        let mut offset = 0usize;
        let last = self.specs.len() - 1;

        for (i, spec) in self.specs.iter().enumerate() {
            let remaining = content_len - offset;
            if i == last || spec.size as usize >= remaining {
                blocks.push(BitBlock::new(remaining as u32, spec.flags));
                break;
            }
            blocks.push(BitBlock::new(spec.size, spec.flags));
            offset += spec.size as usize;
        }

        validate_blocks(&blocks)?;
        Ok(blocks)
    }
}

/// Checks that blocks can be used to build a container.
///
/// # Errors
///
/// Returns [`KelfError::UnsupportedBlockConfiguration`] for misaligned encrypted blocks,
/// signed-only blocks, and tables with more blocks than the format can count.
pub fn validate_blocks(blocks: &[BitBlock]) -> Result<()> {
    if blocks.len() > MAX_BLOCK_COUNT {
        return Err(KelfError::UnsupportedBlockConfiguration(format!(
            "{} blocks exceed the limit of {MAX_BLOCK_COUNT}",
            blocks.len()
        )));
    }
    for (i, block) in blocks.iter().enumerate() {
        if block.flags.is_encrypted() && block.size as usize % ENCRYPTED_BLOCK_ALIGNMENT != 0 {
            return Err(KelfError::UnsupportedBlockConfiguration(format!(
                "encrypted block {i} size {:#X} is not a multiple of {ENCRYPTED_BLOCK_ALIGNMENT:#X}",
                block.size
            )));
        }
        if block.flags.is_signed() && !block.flags.is_encrypted() {
            return Err(KelfError::UnsupportedBlockConfiguration(format!(
                "block {i} is signed but not encrypted"
            )));
        }
    }
    Ok(())
}
