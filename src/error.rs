//! Error types for data section decoding and encoding
use std::fmt;

use crate::types::DataType;

/// Result type alias for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while decoding a value from the data section
///
/// Every variant aborts the decode of the enclosing value tree. No variant
/// is ever turned into a default value inside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Control byte (after extension) names a type code with no decoder
    UnknownType {
        /// The resolved type code (may exceed 255 for extended bytes)
        type_code: u16,
        /// Offset of the control byte
        offset: usize,
    },

    /// A read would run past the end of the buffer
    OutOfBounds {
        /// Offset where the read starts
        offset: usize,
        /// Number of bytes the read needs
        needed: usize,
        /// Length of the buffer
        buffer_len: usize,
    },

    /// A map key decoded to something other than a UTF-8 string
    InvalidMapKey {
        /// Offset of the key's control byte
        offset: usize,
        /// Type name of the value found in key position
        found: &'static str,
    },

    /// Container nesting or pointer chain exceeded the configured limit
    ExcessiveDepth {
        /// The configured maximum depth
        limit: usize,
    },

    /// Declared payload size is not valid for the data type
    InvalidSize {
        /// The type whose payload was being decoded
        data_type: DataType,
        /// The declared payload size in bytes
        size: usize,
        /// Offset of the payload
        offset: usize,
    },

    /// A string or map key is not well-formed UTF-8
    InvalidUtf8 {
        /// Byte index of the first invalid sequence within the string
        valid_up_to: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownType { type_code, offset } => {
                write!(f, "Unknown data type {} at offset {}", type_code, offset)
            }
            DecodeError::OutOfBounds {
                offset,
                needed,
                buffer_len,
            } => write!(
                f,
                "Read of {} bytes at offset {} exceeds buffer of {} bytes",
                needed, offset, buffer_len
            ),
            DecodeError::InvalidMapKey { offset, found } => {
                write!(f, "Map key at offset {} is {}, expected string", offset, found)
            }
            DecodeError::ExcessiveDepth { limit } => {
                write!(f, "Nesting depth exceeds limit of {}", limit)
            }
            DecodeError::InvalidSize {
                data_type,
                size,
                offset,
            } => write!(
                f,
                "Invalid size {} for {} at offset {}",
                size,
                data_type.name(),
                offset
            ),
            DecodeError::InvalidUtf8 { valid_up_to } => {
                write!(f, "Invalid UTF-8 after {} bytes", valid_up_to)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        DecodeError::InvalidUtf8 {
            valid_up_to: err.valid_up_to(),
        }
    }
}

/// Errors raised while building a data section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// String, byte, map or array size cannot be expressed in 3 extra size bytes
    SizeTooLarge(usize),

    /// Section grew past what a 32-bit offset can address
    SectionTooLarge(usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::SizeTooLarge(size) => {
                write!(f, "Size {} exceeds maximum encodable size", size)
            }
            EncodeError::SectionTooLarge(len) => {
                write!(f, "Data section of {} bytes exceeds 32-bit offsets", len)
            }
        }
    }
}

impl std::error::Error for EncodeError {}
