//! # kelf-rs
//!
//! `kelf-rs` is a pure Rust implementation of the KELF container, the signed and
//! optionally encrypted wrapper used for console boot-loader executables.
//! It verifies and decrypts existing containers, and builds new ones from a raw payload.
//!
//! ## Features
//! - Full signature chain: header, bit table, per-block and root signatures
//! - Key-encryption-key derivation and Kbit/Kc wrapping
//! - 1/2/3-key Triple-DES CBC content encryption
//! - Block-construction policy for importing raw payloads
//! - Strict or lenient verification
//!
//! ## Usage
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! kelf-rs = "0.1"
//! ```
//!
//! ### Example: Decrypting and Re-Signing a Container
//! ```rust,no_run
//! use kelf_rs::{HeaderFlags, HeaderKind, Kelf, KelfConfig, KeyStore, SystemType};
//!
//! # fn run(entries: &[(&str, &str)]) -> Result<(), kelf_rs::KelfError> {
//! // The caller supplies the platform secrets as hex strings.
//! let keys = KeyStore::from_hex_entries(entries.iter().copied())?;
//!
//! // Verify and decrypt an existing container
//! let mut kelf = Kelf::new(&keys, KelfConfig::default());
//! kelf.load_kelf("input.kelf")?;
//! kelf.save_content("payload.elf")?;
//!
//! // Wrap a raw payload into a new memory-card container
//! let mut kelf = Kelf::new(&keys, KelfConfig::default());
//! kelf.load_content("payload.elf", HeaderKind::Fmcb)?;
//! kelf.save_kelf("output.kelf", HeaderKind::Fmcb, SystemType::Ps2, HeaderFlags::DEFAULT)?;
//! # Ok(())
//! # }
//! ```

pub mod bit_table;
pub mod block_plan;
pub mod des_cipher;
pub mod error;
mod ext;
pub mod fold;
pub mod header_kind;
pub mod kelf_config;
pub mod kelf_container;
pub mod kelf_header;
pub mod kelf_keys;
pub mod key_store;
pub mod signature_chain;

pub use bit_table::{bit_block::BitBlock, bit_block_flags::BitBlockFlags, BitTable};
pub use block_plan::{BlockPlan, BlockSpec};
pub use error::KelfError;
pub use header_kind::{HeaderKind, HeaderKindEntry, HeaderKindTable};
pub use kelf_config::{KelfConfig, VerificationMode};
pub use kelf_container::Kelf;
pub use kelf_header::{ApplicationType, HeaderFlags, KelfHeader, Regions, SystemType};
pub use kelf_keys::KeyMaterial;
pub use key_store::{KeyName, KeyStore};
