//! Variable-width string indices

use crate::encoder::{DecodeError, UnitReader, UnitWriter};

/// Byte width used for string pool indices inside a metadata blob
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexWidth {
    /// One byte
    U8 = 1,
    /// Two bytes
    U16 = 2,
    /// Three bytes
    U24 = 3,
    /// Four bytes
    U32 = 4,
}

impl IndexWidth {
    /// Smallest width able to hold every value in `0..=upper`
    pub fn for_upper_bound(upper: u32) -> Self {
        match upper {
            0..=0xFF => IndexWidth::U8,
            0x100..=0xFFFF => IndexWidth::U16,
            0x1_0000..=0xFF_FFFF => IndexWidth::U24,
            _ => IndexWidth::U32,
        }
    }

    /// Width from its header byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(IndexWidth::U8),
            2 => Some(IndexWidth::U16),
            3 => Some(IndexWidth::U24),
            4 => Some(IndexWidth::U32),
            _ => None,
        }
    }

    /// Header byte for this width
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Largest value representable at this width
    pub fn max_value(self) -> u32 {
        match self {
            IndexWidth::U8 => 0xFF,
            IndexWidth::U16 => 0xFFFF,
            IndexWidth::U24 => 0xFF_FFFF,
            IndexWidth::U32 => u32::MAX,
        }
    }

    /// Write `value` using this width
    pub fn write(self, writer: &mut UnitWriter, value: u32) {
        debug_assert!(value <= self.max_value());
        match self {
            IndexWidth::U8 => writer.emit_u8(value as u8),
            IndexWidth::U16 => writer.emit_u16(value as u16),
            IndexWidth::U24 => writer.emit_u24(value),
            IndexWidth::U32 => writer.emit_u32(value),
        }
    }

    /// Read a value written with this width
    pub fn read(self, reader: &mut UnitReader<'_>) -> Result<u32, DecodeError> {
        match self {
            IndexWidth::U8 => reader.read_u8().map(u32::from),
            IndexWidth::U16 => reader.read_u16().map(u32::from),
            IndexWidth::U24 => reader.read_u24(),
            IndexWidth::U32 => reader.read_u32(),
        }
    }
}
