//! Data section type codes and encoding constants
//!
//! A control byte carries a 3-bit type code and a 5-bit size field. Type
//! code 0 escapes to an extended type stored in the following byte as
//! `type - 7`.

use std::fmt;

/// Largest size that fits in the control byte itself
pub const MAX_INLINE_SIZE: usize = 28;

/// Size field value: one extra size byte follows
pub const SIZE_ONE_BYTE: u8 = 29;
/// Size field value: two extra size bytes follow
pub const SIZE_TWO_BYTES: u8 = 30;
/// Size field value: three extra size bytes follow
pub const SIZE_THREE_BYTES: u8 = 31;

/// Base added to a one-byte size extension
pub const SIZE_BASE_ONE: usize = 29;
/// Base added to a two-byte size extension
pub const SIZE_BASE_TWO: usize = 285;
/// Base added to a three-byte size extension
pub const SIZE_BASE_THREE: usize = 65_821;
/// Largest size the format can express
pub const MAX_SIZE: usize = SIZE_BASE_THREE + 0x00FF_FFFF;

/// Offset added to an unpacked pointer, indexed by `width - 1`
///
/// Each width addresses a range disjoint from the shorter ones, except the
/// 4-byte form which is absolute.
pub const POINTER_BIAS: [usize; 4] = [0, 2_048, 526_336, 0];

/// Data type codes of the data section format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// Reference to another value (1)
    Pointer = 1,
    /// UTF-8 text (2)
    String = 2,
    /// IEEE 754 double (3)
    Double = 3,
    /// Raw bytes (4)
    Bytes = 4,
    /// Unsigned 16-bit integer (5)
    Uint16 = 5,
    /// Unsigned 32-bit integer (6)
    Uint32 = 6,
    /// String-keyed map (7)
    Map = 7,
    /// Signed 32-bit integer (8, extended)
    Int32 = 8,
    /// Unsigned 64-bit integer (9, extended)
    Uint64 = 9,
    /// Unsigned 128-bit integer (10, extended)
    Uint128 = 10,
    /// Ordered array (11, extended)
    Array = 11,
    /// Boolean carried in the size field (14, extended)
    Bool = 14,
    /// IEEE 754 single (15, extended)
    Float = 15,
}

impl DataType {
    /// Map a resolved type code to a data type
    ///
    /// Codes 12 (data cache container) and 13 (end marker) are reserved by
    /// the format and have no decoder, so they map to `None` like any other
    /// unknown code.
    pub fn from_code(code: u16) -> Option<Self> {
        let data_type = match code {
            1 => DataType::Pointer,
            2 => DataType::String,
            3 => DataType::Double,
            4 => DataType::Bytes,
            5 => DataType::Uint16,
            6 => DataType::Uint32,
            7 => DataType::Map,
            8 => DataType::Int32,
            9 => DataType::Uint64,
            10 => DataType::Uint128,
            11 => DataType::Array,
            14 => DataType::Bool,
            15 => DataType::Float,
            _ => return None,
        };
        Some(data_type)
    }

    /// Numeric type code
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the type needs the extended-type escape byte
    #[inline]
    pub fn is_extended(self) -> bool {
        self.code() > 7
    }

    /// Lowercase name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            DataType::Pointer => "pointer",
            DataType::String => "string",
            DataType::Double => "double",
            DataType::Bytes => "bytes",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Map => "map",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Uint128 => "uint128",
            DataType::Array => "array",
            DataType::Bool => "boolean",
            DataType::Float => "float",
        }
    }

    /// Largest payload in bytes for fixed-width numeric types
    ///
    /// `None` for variable-length and container types.
    pub fn max_payload(self) -> Option<usize> {
        match self {
            DataType::Uint16 => Some(2),
            DataType::Uint32 | DataType::Int32 | DataType::Float => Some(4),
            DataType::Uint64 | DataType::Double => Some(8),
            DataType::Uint128 => Some(16),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
