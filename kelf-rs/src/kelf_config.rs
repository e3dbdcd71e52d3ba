use crate::error::{KelfError, Result};
use crate::header_kind::{HeaderKind, HeaderKindTable};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// How verification mismatches that the format tolerates in the wild are handled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Unsupported header flags and root signature mismatches abort the load.
    #[default]
    Strict,
    /// Both are logged as warnings and loading continues.
    Lenient,
}

impl FromStr for VerificationMode {
    type Err = KelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(VerificationMode::Strict),
            "lenient" => Ok(VerificationMode::Lenient),
            other => Err(KelfError::InvalidConfig(format!(
                "Unknown verification mode: {other}"
            ))),
        }
    }
}

/// Represents the codec configuration: verification policy and the header-kind table.
///
/// The configuration is immutable once handed to a [`crate::kelf_container::Kelf`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KelfConfig {
    pub verification: VerificationMode,
    pub header_kinds: HeaderKindTable,
}

impl KelfConfig {
    /// Creates a new configuration with strict verification and the default header kinds.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verification(mut self, verification: VerificationMode) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_header_kinds(mut self, header_kinds: HeaderKindTable) -> Self {
        self.header_kinds = header_kinds;
        self
    }

    /// Loads configuration variables from a file on top of the defaults.
    ///
    /// # Arguments
    ///
    /// * `file_name` - The path to the configuration file.
    pub fn load<P: AsRef<Path>>(file_name: P) -> Result<Self> {
        let file = File::open(file_name)?;
        Self::parse(file)
    }

    /// Parses `name = value` lines.
    ///
    /// Recognised names are `verification` and `<kind>.tag` / `<kind>.kbit`, where
    /// `<kind>` is one of `fmcb`, `dnasload`, `fhdb` or `mbr` and the value is 16
    /// hex-encoded bytes.
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let mut config = Self::default();
        let reader = BufReader::new(reader);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            // Ignore empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, value) = line
                .split_once('=')
                .ok_or_else(|| KelfError::InvalidConfig(format!("Expected name = value: {line}")))?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();

            if name == "verification" {
                config.verification = value.parse()?;
                continue;
            }

            let (kind, field) = name
                .split_once('.')
                .ok_or_else(|| KelfError::InvalidConfig(format!("Unknown setting: {name}")))?;
            let kind = kind.parse::<HeaderKind>()?;
            let bytes = Self::parse_key(&name, value)?;
            let entry = config.header_kinds.entry_mut(kind);
            match field {
                "tag" => entry.tag = bytes,
                "kbit" => entry.kbit_seed = bytes,
                _ => return Err(KelfError::InvalidConfig(format!("Unknown setting: {name}"))),
            }
        }

        Ok(config)
    }

    fn parse_key(name: &str, value: &str) -> Result<[u8; 16]> {
        let bytes = hex::decode(value)
            .map_err(|_| KelfError::InvalidConfig(format!("Invalid hex in {name}")))?;
        bytes
            .try_into()
            .map_err(|_| KelfError::InvalidConfig(format!("{name} must be 16 bytes")))
    }
}
