//! This module defines the `KelfHeader` struct, the fixed 0x20-byte record that opens every
//! KELF container, together with the typed views of its system, application, flag and
//! region fields.

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use std::io::{self, Read, Write};

/// Target system recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemType {
    /// Retail PS2 consoles.
    Ps2,
    /// PSX (DESR) consoles.
    Psx,
    /// Unknown value, stores the raw byte.
    Unknown(u8),
}

impl From<u8> for SystemType {
    fn from(byte: u8) -> Self {
        match byte {
            0 => SystemType::Ps2,
            1 => SystemType::Psx,
            other => SystemType::Unknown(other),
        }
    }
}

impl From<SystemType> for u8 {
    fn from(system: SystemType) -> Self {
        match system {
            SystemType::Ps2 => 0,
            SystemType::Psx => 1,
            SystemType::Unknown(other) => other,
        }
    }
}

/// Kind of loader the payload is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationType {
    /// System menu loader (xosdmain).
    Xosdmain,
    /// DVD player KIRX module.
    DvdPlayerKirx,
    /// DVD player KELF.
    DvdPlayerKelf,
    /// Unknown value, stores the raw byte.
    Unknown(u8),
}

impl From<u8> for ApplicationType {
    fn from(byte: u8) -> Self {
        match byte {
            1 => ApplicationType::Xosdmain,
            5 => ApplicationType::DvdPlayerKirx,
            7 => ApplicationType::DvdPlayerKelf,
            other => ApplicationType::Unknown(other),
        }
    }
}

impl From<ApplicationType> for u8 {
    fn from(app: ApplicationType) -> Self {
        match app {
            ApplicationType::Xosdmain => 1,
            ApplicationType::DvdPlayerKirx => 5,
            ApplicationType::DvdPlayerKelf => 7,
            ApplicationType::Unknown(other) => other,
        }
    }
}

bitflags! {
    /// Feature flags of the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u16 {
        /// Console blacklist check. Containers carrying it are not supported.
        const BLACKLIST = 0x0001;
        /// Console whitelist check.
        const WHITELIST = 0x0002;
        /// Low bit of the content key count.
        const CONTENT_1DES = 0x0010;
        /// High bit of the content key count.
        const CONTENT_3DES = 0x0020;

        const _ = !0;
    }
}

impl HeaderFlags {
    /// Flags written by default when building a container (two-key content encryption).
    pub const DEFAULT: Self = Self::from_bits_retain(0x022C);

    /// Number of DES keys used for content blocks, taken from bits 4 and 5.
    pub fn content_key_count(self) -> usize {
        ((self.bits() >> 4) & 3) as usize
    }
}

impl Default for HeaderFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

bitflags! {
    /// Regions allowed to boot the container.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Regions: u8 {
        const JAPAN = 0x01;
        const USA = 0x02;
        const OCEANIA = 0x04;
        const UNITED_KINGDOM = 0x08;
        const EUROPE = 0x10;
        const KOREA = 0x20;
        const ASIA = 0x40;
        const TAIWAN = 0x80;
    }
}

/// Represents the header of a KELF container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KelfHeader {
    /// Tag identifying the container's usage class.
    pub user_defined: [u8; 16],
    /// Size of the payload in bytes.
    pub content_size: u32,
    /// Size of everything before the content.
    pub header_size: u32,
    pub system_type: SystemType,
    pub application_type: ApplicationType,
    pub flags: HeaderFlags,
    /// Always zero in known containers.
    pub bit_count: u16,
    pub regions: Regions,
    pub reserved: u8,
}

impl KelfHeader {
    /// Serialized size of the header.
    pub const SIZE: usize = 0x20;

    /// Creates a header for a new container. Sizes are filled in when saving.
    pub fn new(user_defined: [u8; 16], system_type: SystemType, flags: HeaderFlags) -> Self {
        Self {
            user_defined,
            content_size: 0,
            header_size: 0,
            system_type,
            application_type: ApplicationType::Xosdmain,
            flags,
            bit_count: 0,
            regions: Regions::all(),
            reserved: 0,
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut user_defined = [0u8; 16];
        reader.read_exact(&mut user_defined)?;
        Ok(Self {
            user_defined,
            content_size: reader.read_u32::<LittleEndian>()?,
            header_size: reader.read_u32::<LittleEndian>()?,
            system_type: SystemType::from(reader.read_u8()?),
            application_type: ApplicationType::from(reader.read_u8()?),
            flags: HeaderFlags::from_bits_retain(reader.read_u16::<LittleEndian>()?),
            bit_count: reader.read_u16::<LittleEndian>()?,
            regions: Regions::from_bits_retain(reader.read_u8()?),
            reserved: reader.read_u8()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.user_defined)?;
        writer.write_u32::<LittleEndian>(self.content_size)?;
        writer.write_u32::<LittleEndian>(self.header_size)?;
        writer.write_u8(self.system_type.into())?;
        writer.write_u8(self.application_type.into())?;
        writer.write_u16::<LittleEndian>(self.flags.bits())?;
        writer.write_u16::<LittleEndian>(self.bit_count)?;
        writer.write_u8(self.regions.bits())?;
        writer.write_u8(self.reserved)
    }

    /// The exact serialized bytes, as covered by the header signature.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut cursor = &mut bytes[..];
        let written = self.write(&mut cursor);
        debug_assert!(written.is_ok() && cursor.is_empty());
        bytes
    }

    /// Describes why this header cannot be processed, if it cannot.
    pub fn unsupported_reason(&self) -> Option<String> {
        if self.flags.contains(HeaderFlags::BLACKLIST) {
            return Some(format!("blacklist flag set ({:#06X})", self.flags.bits()));
        }
        if self.bit_count != 0 {
            return Some(format!("non-zero bit count ({:#X})", self.bit_count));
        }
        None
    }

    /// Dumps every field at debug level.
    pub(crate) fn log_fields(&self, kind_name: Option<&str>) {
        debug!(
            "header.UserDefined     = {}{}",
            hex::encode_upper(self.user_defined),
            kind_name.map(|n| format!(" ({n})")).unwrap_or_default()
        );
        debug!("header.ContentSize     = {:#X}", self.content_size);
        debug!("header.HeaderSize      = {:#X}", self.header_size);
        match self.system_type {
            SystemType::Unknown(v) => warn!("header.SystemType      = {v:#X} (unknown)"),
            known => debug!("header.SystemType      = {known:?}"),
        }
        match self.application_type {
            ApplicationType::Unknown(v) => warn!("header.ApplicationType = {v:#X} (unknown)"),
            known => debug!("header.ApplicationType = {known:?}"),
        }
        debug!("header.Flags           = {:#X}", self.flags.bits());
        debug!("header.BitCount        = {:#X}", self.bit_count);
        debug!("header.MGZones         = {:#X}", self.regions.bits());
    }
}
