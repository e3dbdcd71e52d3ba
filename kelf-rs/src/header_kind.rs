use crate::error::{KelfError, Result};
use std::fmt;
use std::str::FromStr;

/// Usage classes a new container can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// Memory-card boot loader.
    Fmcb,
    /// Universal loader, accepted by both PS2 and PSX consoles.
    Dnasload,
    /// HDD-OSD boot loader.
    Fhdb,
    /// MBR-injection loader.
    Mbr,
}

impl HeaderKind {
    pub const ALL: [HeaderKind; 4] = [
        HeaderKind::Fmcb,
        HeaderKind::Dnasload,
        HeaderKind::Fhdb,
        HeaderKind::Mbr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HeaderKind::Fmcb => "fmcb",
            HeaderKind::Dnasload => "dnasload",
            HeaderKind::Fhdb => "fhdb",
            HeaderKind::Mbr => "mbr",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderKind {
    type Err = KelfError;

    fn from_str(s: &str) -> Result<Self> {
        HeaderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KelfError::InvalidConfig(format!("Unknown header kind: {s}")))
    }
}

/// The fixed values a header kind contributes to a new container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderKindEntry {
    /// `UserDefined` tag written into the header.
    pub tag: [u8; 16],
    /// Kbit used for the container.
    pub kbit_seed: [u8; 16],
}

const TAG_MEMORY_CARD: [u8; 16] = [
    0x01, 0x00, 0x00, 0x01, 0x00, 0x03, 0x00, 0x4A, 0x00, 0x01, 0x02, 0x19, 0x00, 0x00, 0x00, 0x56,
];
const TAG_HDD: [u8; 16] = [
    0x01, 0x00, 0x00, 0x04, 0x00, 0x02, 0x01, 0x57, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A,
];
const DEFAULT_KBIT: [u8; 16] = [0xAA; 16];

/// Immutable mapping from header kind to its tag and Kbit seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderKindTable {
    entries: [HeaderKindEntry; 4],
}

impl Default for HeaderKindTable {
    fn default() -> Self {
        let memory_card = HeaderKindEntry {
            tag: TAG_MEMORY_CARD,
            kbit_seed: DEFAULT_KBIT,
        };
        let hdd = HeaderKindEntry {
            tag: TAG_HDD,
            kbit_seed: DEFAULT_KBIT,
        };
        Self {
            entries: [memory_card, memory_card, hdd, hdd],
        }
    }
}

impl HeaderKindTable {
    pub fn get(&self, kind: HeaderKind) -> &HeaderKindEntry {
        &self.entries[kind.index()]
    }

    /// Returns a copy of the table with `kind` mapped to `entry`.
    pub fn with_entry(mut self, kind: HeaderKind, entry: HeaderKindEntry) -> Self {
        self.entries[kind.index()] = entry;
        self
    }

    pub(crate) fn entry_mut(&mut self, kind: HeaderKind) -> &mut HeaderKindEntry {
        &mut self.entries[kind.index()]
    }

    /// Header kinds whose tag equals `tag`, in declaration order.
    pub fn identify(&self, tag: &[u8; 16]) -> Vec<HeaderKind> {
        HeaderKind::ALL
            .into_iter()
            .filter(|kind| &self.get(*kind).tag == tag)
            .collect()
    }
}
