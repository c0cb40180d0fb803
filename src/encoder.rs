//! Data section encoder
//!
//! Produces bytes that [`DataDecoder`](crate::DataDecoder) reads back. Used
//! to build fixtures and data sections for tests, benchmarks and tools that
//! write databases.

use rustc_hash::FxHashMap;

use crate::error::EncodeError;
use crate::types::{
    DataType, MAX_INLINE_SIZE, MAX_SIZE, POINTER_BIAS, SIZE_BASE_ONE, SIZE_BASE_THREE,
    SIZE_BASE_TWO, SIZE_ONE_BYTE, SIZE_THREE_BYTES, SIZE_TWO_BYTES,
};
use crate::value::{DataMap, DataValue};

/// Data section encoder
///
/// Builds a data section by encoding values and tracking offsets.
/// Identical encodings are stored once and share an offset.
#[derive(Debug, Default)]
pub struct DataEncoder {
    /// Encoded data buffer
    buffer: Vec<u8>,
    /// Map from serialized value to offset (for deduplication)
    dedup_map: FxHashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value and return its offset
    ///
    /// If the same bytes were encoded before, returns the existing offset.
    pub fn encode(&mut self, value: &DataValue<'_>) -> Result<u32, EncodeError> {
        let mut temp = Vec::new();
        encode_to_buffer(value, &mut temp)?;

        if let Some(&offset) = self.dedup_map.get(&temp) {
            return Ok(offset);
        }

        let offset = self.next_offset()?;
        self.buffer.extend_from_slice(&temp);
        self.dedup_map.insert(temp, offset);
        Ok(offset)
    }

    /// Append a pointer to `target` and return the pointer's own offset
    ///
    /// `target` is relative to the start of this data section.
    pub fn encode_pointer(&mut self, target: u32) -> Result<u32, EncodeError> {
        let offset = self.next_offset()?;
        encode_pointer(target, &mut self.buffer);
        Ok(offset)
    }

    /// Current buffer size
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// The encoded data section
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn next_offset(&self) -> Result<u32, EncodeError> {
        u32::try_from(self.buffer.len()).map_err(|_| EncodeError::SectionTooLarge(self.buffer.len()))
    }
}

/// Encode a single value into a fresh buffer
pub fn encode_to_vec(value: &DataValue<'_>) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    encode_to_buffer(value, &mut buffer)?;
    Ok(buffer)
}

fn encode_to_buffer(value: &DataValue<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    match value {
        DataValue::String(s) => encode_blob(DataType::String, s.as_bytes(), buffer)?,
        DataValue::Double(d) => {
            write_control(DataType::Double, 8, buffer)?;
            buffer.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => encode_blob(DataType::Bytes, b, buffer)?,
        DataValue::Uint16(n) => encode_uint(DataType::Uint16, u128::from(*n), buffer)?,
        DataValue::Uint32(n) => encode_uint(DataType::Uint32, u128::from(*n), buffer)?,
        DataValue::Map(m) => encode_map(m, buffer)?,
        DataValue::Int32(n) => {
            if *n >= 0 {
                encode_uint(DataType::Int32, *n as u128, buffer)?;
            } else {
                // Short encodings are zero-padded on decode, so negatives need all 4 bytes
                write_control(DataType::Int32, 4, buffer)?;
                buffer.extend_from_slice(&n.to_be_bytes());
            }
        }
        DataValue::Uint64(n) => encode_uint(DataType::Uint64, u128::from(*n), buffer)?,
        DataValue::Uint128(n) => encode_uint(DataType::Uint128, *n, buffer)?,
        DataValue::Array(a) => {
            write_control(DataType::Array, a.len(), buffer)?;
            for item in a {
                encode_to_buffer(item, buffer)?;
            }
        }
        DataValue::Bool(b) => {
            // The size field carries the value
            write_control(DataType::Bool, usize::from(*b), buffer)?;
        }
        DataValue::Float(f) => {
            write_control(DataType::Float, 4, buffer)?;
            buffer.extend_from_slice(&f.to_be_bytes());
        }
    }
    Ok(())
}

fn encode_blob(data_type: DataType, bytes: &[u8], buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    write_control(data_type, bytes.len(), buffer)?;
    buffer.extend_from_slice(bytes);
    Ok(())
}

/// Unsigned payload with leading zero bytes stripped
fn encode_uint(data_type: DataType, n: u128, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    let bytes = n.to_be_bytes();
    let skip = (n.leading_zeros() / 8) as usize;
    encode_blob(data_type, &bytes[skip..], buffer)
}

fn encode_map(m: &DataMap<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    write_control(DataType::Map, m.len(), buffer)?;
    for (key, value) in m.iter() {
        encode_blob(DataType::String, key.as_bytes(), buffer)?;
        encode_to_buffer(value, buffer)?;
    }
    Ok(())
}

/// Control byte, extended type byte if needed, then extra size bytes
fn write_control(data_type: DataType, size: usize, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    if size > MAX_SIZE {
        return Err(EncodeError::SizeTooLarge(size));
    }

    let type_bits = if data_type.is_extended() {
        0
    } else {
        data_type.code() << 5
    };

    let (size_bits, extra_len, base) = if size <= MAX_INLINE_SIZE {
        (size as u8, 0, 0)
    } else if size < SIZE_BASE_TWO {
        (SIZE_ONE_BYTE, 1, SIZE_BASE_ONE)
    } else if size < SIZE_BASE_THREE {
        (SIZE_TWO_BYTES, 2, SIZE_BASE_TWO)
    } else {
        (SIZE_THREE_BYTES, 3, SIZE_BASE_THREE)
    };

    buffer.push(type_bits | size_bits);
    if data_type.is_extended() {
        buffer.push(data_type.code() - 7);
    }
    let extra = ((size - base) as u32).to_be_bytes();
    buffer.extend_from_slice(&extra[4 - extra_len..]);
    Ok(())
}

fn encode_pointer(target: u32, buffer: &mut Vec<u8>) {
    let target = target as usize;
    let ptr_type = DataType::Pointer.code() << 5;

    // Width 1: 11 bits, width 2: 19 bits, width 3: 27 bits, each after its bias
    let width = if target < POINTER_BIAS[1] {
        1
    } else if target < POINTER_BIAS[2] {
        2
    } else if target - POINTER_BIAS[2] < 1 << 27 {
        3
    } else {
        4
    };

    if width == 4 {
        buffer.push(ptr_type | (3 << 3));
        buffer.extend_from_slice(&(target as u32).to_be_bytes());
        return;
    }

    let packed = (target - POINTER_BIAS[width - 1]) as u32;
    let high = (packed >> (8 * width)) as u8 & 0x7;
    buffer.push(ptr_type | (((width - 1) as u8) << 3) | high);
    buffer.extend_from_slice(&packed.to_be_bytes()[4 - width..]);
}
