use thiserror::Error;

/// Represents all possible errors that can occur in the KELF library.
///
/// Loading is fail-fast: the first failing check surfaces its variant and no
/// partially decoded container is handed back. Saving validates the block plan
/// before anything is encrypted or written.
#[derive(Debug, Error)]
pub enum KelfError {
    /// The file could not be opened, or its header carries a flag combination
    /// this codec does not handle (blacklist bit, reserved bits, non-zero bit count).
    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),
    /// The stored header signature does not match the recomputed one.
    #[error("Invalid header signature")]
    InvalidHeaderSignature,
    /// The declared bit table size is out of bounds for the fixed on-disk capacity.
    #[error("Invalid bit table size: {0}")]
    InvalidBitTableSize(String),
    /// The stored bit table signature does not match the recomputed one.
    #[error("Invalid bit table signature")]
    InvalidBitTableSignature,
    /// The stored root signature does not match the recomputed one.
    #[error("Invalid root signature")]
    InvalidRootSignature,
    /// A signed content block does not match its stored signature.
    #[error("Invalid content signature in block {0}")]
    InvalidContentSignature(usize),
    /// The block cipher was asked for a key count outside 1..=3, or was given
    /// too few key bytes for the requested count.
    #[error("Invalid DES key count: {0}")]
    InvalidKeyCount(usize),
    /// A block plan cannot be used to build a container.
    #[error("Unsupported block configuration: {0}")]
    UnsupportedBlockConfiguration(String),
    /// The input ended before a declared field or block.
    #[error("Truncated container: {0}")]
    Truncated(String),
    /// A configuration file or key store entry could not be understood.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Represents an error that occurs during I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KelfError>;
