//! Data section decoder
//!
//! Decodes values from a MaxMind DB style data section. The decoder holds no
//! cursor: every step takes an offset and returns the decoded value together
//! with the offset just past it. Pointer resolution relies on this, since the
//! caller's position advances only past the pointer's own bytes, never past
//! the value it references.
//!
//! # Format
//!
//! ```text
//! control byte:  TTT SSSSS     type (3 bits), size (5 bits)
//! TTT == 000:    next byte holds (type - 7)
//! SSSSS 0..=28:  size
//! SSSSS 29:      size = 29 + next byte
//! SSSSS 30:      size = 285 + next 2 bytes (big-endian)
//! SSSSS 31:      size = 65821 + next 3 bytes (big-endian)
//! ```
//!
//! Pointers reuse the size bits as `0bWWVVV`: `WW + 1` pointer bytes follow
//! and `VVV` supplies the high bits for widths 1 through 3.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{DecodeError, Result};
use crate::types::{
    DataType, MAX_INLINE_SIZE, POINTER_BIAS, SIZE_BASE_ONE, SIZE_BASE_THREE, SIZE_BASE_TWO,
    SIZE_ONE_BYTE, SIZE_TWO_BYTES,
};
use crate::value::{DataMap, DataStr, DataValue};

/// Default maximum nesting depth (containers plus pointer hops)
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Decoder settings
///
/// Deserializable so an application can carry it in its own config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Maximum number of nested containers and pointer hops below the value
    /// being decoded
    pub max_depth: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// One step of a [`DataDecoder::decode_path`] lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElement<'p> {
    /// Map key
    Key(&'p str),
    /// Array index
    Index(usize),
}

impl<'p> From<&'p str> for PathElement<'p> {
    fn from(key: &'p str) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement<'_> {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

/// Parsed control byte(s)
#[derive(Debug, Clone, Copy)]
struct Control {
    data_type: DataType,
    /// Payload size, or the raw 5-bit field for pointers and booleans
    size: usize,
    /// Offset of the payload
    offset: usize,
}

/// Data section decoder
///
/// Immutable after construction; a single decoder can be shared across
/// threads and reused for any number of lookups.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
    pointer_base: usize,
    options: DecoderOptions,
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder
    ///
    /// # Arguments
    /// * `buffer` - Bytes containing the data section (pointer targets are
    ///   offsets into this same buffer)
    /// * `pointer_base` - Offset of the data section start, added to every
    ///   pointer (0 for a standalone data section)
    pub fn new(buffer: &'a [u8], pointer_base: usize) -> Self {
        Self::with_options(buffer, pointer_base, DecoderOptions::default())
    }

    /// Create a decoder with explicit options
    pub fn with_options(buffer: &'a [u8], pointer_base: usize, options: DecoderOptions) -> Self {
        Self {
            buffer,
            pointer_base,
            options,
        }
    }

    /// The underlying buffer
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Offset added to every pointer
    pub fn pointer_base(&self) -> usize {
        self.pointer_base
    }

    /// Active options
    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Decode the value at `offset`
    ///
    /// Returns the value and the offset immediately after its encoding. For
    /// a pointer that is the end of the pointer itself.
    pub fn decode(&self, offset: usize) -> Result<(DataValue<'a>, usize)> {
        self.decode_at(offset, 0).map_err(|e| {
            debug!(offset, error = %e, "data section decode failed");
            e
        })
    }

    /// Decode the value at `offset`, discarding the next offset
    pub fn decode_value(&self, offset: usize) -> Result<DataValue<'a>> {
        self.decode(offset).map(|(value, _)| value)
    }

    /// Offset just past the value at `offset`, without building it
    ///
    /// Pointers are not followed. Scalar payloads are bounds checked but
    /// not interpreted.
    pub fn skip(&self, offset: usize) -> Result<usize> {
        self.skip_at(offset, 0)
    }

    /// Decode only the value addressed by `path` under the value at `offset`
    ///
    /// Siblings along the way are skipped rather than decoded. Returns
    /// `Ok(None)` when a key is absent, an index is out of range, or a step
    /// lands on a type that cannot be indexed that way. A repeated map key
    /// resolves to its last occurrence.
    pub fn decode_path(
        &self,
        offset: usize,
        path: &[PathElement<'_>],
    ) -> Result<Option<DataValue<'a>>> {
        let mut offset = offset;
        let mut depth = 0;

        for element in path {
            let ctrl = self.resolve(offset, &mut depth)?;
            depth += 1;
            self.check_depth(depth)?;

            match (ctrl.data_type, element) {
                (DataType::Map, PathElement::Key(key)) => {
                    let mut cursor = ctrl.offset;
                    let mut found = None;
                    for _ in 0..ctrl.size {
                        let (candidate, next) = self.decode_key(cursor, depth)?;
                        if candidate == *key {
                            found = Some(next);
                        }
                        cursor = self.skip_at(next, depth)?;
                    }
                    match found {
                        Some(value_offset) => offset = value_offset,
                        None => return Ok(None),
                    }
                }
                (DataType::Array, PathElement::Index(index)) => {
                    if *index >= ctrl.size {
                        return Ok(None);
                    }
                    let mut cursor = ctrl.offset;
                    for _ in 0..*index {
                        cursor = self.skip_at(cursor, depth)?;
                    }
                    offset = cursor;
                }
                _ => return Ok(None),
            }
        }

        self.decode_at(offset, depth).map(|(value, _)| Some(value))
    }

    /// Iterate over consecutive values from `start` to the end of the buffer
    pub fn iter(&self, start: usize) -> DataIter<'a> {
        DataIter {
            decoder: *self,
            offset: start,
            failed: false,
        }
    }

    fn decode_at(&self, offset: usize, depth: usize) -> Result<(DataValue<'a>, usize)> {
        let ctrl = self.read_control(offset)?;

        match ctrl.data_type {
            DataType::Pointer => self.decode_pointer(ctrl, depth),
            DataType::Bool => Ok((DataValue::Bool(ctrl.size != 0), ctrl.offset)),
            DataType::String => {
                let (bytes, next) = self.take(ctrl)?;
                Ok((DataValue::String(DataStr::new(bytes)), next))
            }
            DataType::Bytes => {
                let (bytes, next) = self.take(ctrl)?;
                Ok((DataValue::Bytes(bytes), next))
            }
            DataType::Double => {
                let (bytes, next) = self.take_exact(ctrl, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok((DataValue::Double(f64::from_be_bytes(raw)), next))
            }
            DataType::Float => {
                let (bytes, next) = self.take_exact(ctrl, 4)?;
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                Ok((DataValue::Float(f32::from_be_bytes(raw)), next))
            }
            DataType::Uint16 => {
                let (n, next) = self.take_uint(ctrl)?;
                Ok((DataValue::Uint16(n as u16), next))
            }
            DataType::Uint32 => {
                let (n, next) = self.take_uint(ctrl)?;
                Ok((DataValue::Uint32(n as u32), next))
            }
            DataType::Uint64 => {
                let (n, next) = self.take_uint(ctrl)?;
                Ok((DataValue::Uint64(n as u64), next))
            }
            DataType::Uint128 => {
                let (n, next) = self.take_uint(ctrl)?;
                Ok((DataValue::Uint128(n), next))
            }
            DataType::Int32 => {
                // Short encodings are zero-padded on the left, never sign-extended
                let (n, next) = self.take_uint(ctrl)?;
                Ok((DataValue::Int32(n as u32 as i32), next))
            }
            DataType::Array => self.decode_array(ctrl, depth),
            DataType::Map => self.decode_map(ctrl, depth),
        }
    }

    fn decode_pointer(&self, ctrl: Control, depth: usize) -> Result<(DataValue<'a>, usize)> {
        let (target, next) = self.pointer_target(ctrl)?;
        trace!(pointer_target = target, pointer_end = next, "following data pointer");

        let depth = depth + 1;
        self.check_depth(depth)?;
        // The pointee's end offset belongs to the pointee, not to our caller
        let (value, _) = self.decode_at(target, depth)?;
        Ok((value, next))
    }

    /// Absolute target of a pointer and the offset just past it
    fn pointer_target(&self, ctrl: Control) -> Result<(usize, usize)> {
        let width = ((ctrl.size >> 3) & 0x3) + 1;
        let bytes = self.read_bytes(ctrl.offset, width)?;

        let unpacked = if width == 4 {
            be_uint(bytes)
        } else {
            bytes
                .iter()
                .fold((ctrl.size & 0x7) as u128, |acc, &b| (acc << 8) | b as u128)
        };

        let target = (unpacked as usize)
            .checked_add(self.pointer_base)
            .and_then(|t| t.checked_add(POINTER_BIAS[width - 1]))
            .ok_or(DecodeError::OutOfBounds {
                offset: ctrl.offset,
                needed: width,
                buffer_len: self.buffer.len(),
            })?;

        Ok((target, ctrl.offset + width))
    }

    fn decode_array(&self, ctrl: Control, depth: usize) -> Result<(DataValue<'a>, usize)> {
        let depth = depth + 1;
        if ctrl.size > 0 {
            self.check_depth(depth)?;
        }

        let mut array = Vec::with_capacity(self.capacity_hint(ctrl));
        let mut offset = ctrl.offset;
        for _ in 0..ctrl.size {
            let (value, next) = self.decode_at(offset, depth)?;
            array.push(value);
            offset = next;
        }

        Ok((DataValue::Array(array), offset))
    }

    fn decode_map(&self, ctrl: Control, depth: usize) -> Result<(DataValue<'a>, usize)> {
        let depth = depth + 1;
        if ctrl.size > 0 {
            self.check_depth(depth)?;
        }

        let mut map = DataMap::with_capacity(self.capacity_hint(ctrl) / 2);
        let mut offset = ctrl.offset;
        for _ in 0..ctrl.size {
            let (key, next) = self.decode_key(offset, depth)?;
            let (value, next) = self.decode_at(next, depth)?;
            map.insert(key, value);
            offset = next;
        }

        Ok((DataValue::Map(map), offset))
    }

    fn decode_key(&self, offset: usize, depth: usize) -> Result<(DataStr<'a>, usize)> {
        match self.decode_at(offset, depth)? {
            (DataValue::String(key), next) => Ok((key, next)),
            (other, _) => Err(DecodeError::InvalidMapKey {
                offset,
                found: other.type_name(),
            }),
        }
    }

    fn skip_at(&self, offset: usize, depth: usize) -> Result<usize> {
        let ctrl = self.read_control(offset)?;

        match ctrl.data_type {
            DataType::Pointer => self.pointer_target(ctrl).map(|(_, next)| next),
            DataType::Bool => Ok(ctrl.offset),
            DataType::Array | DataType::Map => {
                let items = if ctrl.data_type == DataType::Map {
                    ctrl.size.saturating_mul(2)
                } else {
                    ctrl.size
                };
                let depth = depth + 1;
                if items > 0 {
                    self.check_depth(depth)?;
                }
                let mut offset = ctrl.offset;
                for _ in 0..items {
                    offset = self.skip_at(offset, depth)?;
                }
                Ok(offset)
            }
            _ => self.take(ctrl).map(|(_, next)| next),
        }
    }

    /// Follow pointers from `offset` until a non-pointer control byte
    fn resolve(&self, offset: usize, depth: &mut usize) -> Result<Control> {
        let mut ctrl = self.read_control(offset)?;
        while ctrl.data_type == DataType::Pointer {
            *depth += 1;
            self.check_depth(*depth)?;
            let (target, _) = self.pointer_target(ctrl)?;
            ctrl = self.read_control(target)?;
        }
        Ok(ctrl)
    }

    fn read_control(&self, offset: usize) -> Result<Control> {
        let ctrl_byte = self.read_byte(offset)?;
        let mut next = offset + 1;

        let mut type_code = u16::from(ctrl_byte >> 5);
        if type_code == 0 {
            type_code = 7 + u16::from(self.read_byte(next)?);
            next += 1;
        }

        let data_type = DataType::from_code(type_code)
            .ok_or(DecodeError::UnknownType { type_code, offset })?;

        let inline = ctrl_byte & 0x1F;
        if matches!(data_type, DataType::Pointer | DataType::Bool) {
            return Ok(Control {
                data_type,
                size: inline as usize,
                offset: next,
            });
        }

        let (size, next) = self.decode_size(inline, next)?;
        Ok(Control {
            data_type,
            size,
            offset: next,
        })
    }

    fn decode_size(&self, inline: u8, offset: usize) -> Result<(usize, usize)> {
        let (extra, base) = match inline {
            n if n as usize <= MAX_INLINE_SIZE => return Ok((n as usize, offset)),
            SIZE_ONE_BYTE => (1, SIZE_BASE_ONE),
            SIZE_TWO_BYTES => (2, SIZE_BASE_TWO),
            _ => (3, SIZE_BASE_THREE),
        };
        let bytes = self.read_bytes(offset, extra)?;
        Ok((base + be_uint(bytes) as usize, offset + extra))
    }

    /// Payload bytes of `ctrl`
    fn take(&self, ctrl: Control) -> Result<(&'a [u8], usize)> {
        let bytes = self.read_bytes(ctrl.offset, ctrl.size)?;
        Ok((bytes, ctrl.offset + ctrl.size))
    }

    fn take_exact(&self, ctrl: Control, size: usize) -> Result<(&'a [u8], usize)> {
        if ctrl.size != size {
            return Err(self.invalid_size(ctrl));
        }
        self.take(ctrl)
    }

    /// Big-endian unsigned payload of at most the type's width
    fn take_uint(&self, ctrl: Control) -> Result<(u128, usize)> {
        let max = ctrl.data_type.max_payload().unwrap_or(0);
        if ctrl.size > max {
            return Err(self.invalid_size(ctrl));
        }
        let (bytes, next) = self.take(ctrl)?;
        Ok((be_uint(bytes), next))
    }

    fn invalid_size(&self, ctrl: Control) -> DecodeError {
        DecodeError::InvalidSize {
            data_type: ctrl.data_type,
            size: ctrl.size,
            offset: ctrl.offset,
        }
    }

    fn read_byte(&self, offset: usize) -> Result<u8> {
        self.buffer
            .get(offset)
            .copied()
            .ok_or(DecodeError::OutOfBounds {
                offset,
                needed: 1,
                buffer_len: self.buffer.len(),
            })
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .map(|end| &self.buffer[offset..end])
            .ok_or(DecodeError::OutOfBounds {
                offset,
                needed: len,
                buffer_len: self.buffer.len(),
            })
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(DecodeError::ExcessiveDepth {
                limit: self.options.max_depth,
            });
        }
        Ok(())
    }

    /// Every element takes at least one byte, so a count larger than the
    /// remaining buffer is never worth pre-allocating for
    fn capacity_hint(&self, ctrl: Control) -> usize {
        ctrl.size
            .min(self.buffer.len().saturating_sub(ctrl.offset))
    }
}

/// Iterator over consecutive top-level values
///
/// Yields `(offset, value)` pairs. Stops at the end of the buffer, or after
/// yielding the first error.
#[derive(Debug, Clone)]
pub struct DataIter<'a> {
    decoder: DataDecoder<'a>,
    offset: usize,
    failed: bool,
}

impl<'a> Iterator for DataIter<'a> {
    type Item = Result<(usize, DataValue<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.decoder.buffer.len() {
            return None;
        }
        let offset = self.offset;
        match self.decoder.decode(offset) {
            Ok((value, next)) => {
                self.offset = next;
                Some(Ok((offset, value)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for DataIter<'_> {}

/// Accumulate big-endian bytes (at most 16)
#[inline]
fn be_uint(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<(DataValue<'_>, usize)> {
        DataDecoder::new(bytes, 0).decode(0)
    }

    #[test]
    fn test_inline_sizes() {
        for s in 0..=28u8 {
            let mut buf = vec![0x40 | s];
            buf.extend(std::iter::repeat(b'x').take(s as usize));
            let (value, next) = decode(&buf).unwrap();
            assert_eq!(value.as_bytes().map(|b| b.len()), Some(s as usize));
            assert_eq!(next, 1 + s as usize);
        }
    }

    #[test]
    fn test_extended_sizes() {
        let decoder_buf = [0x5D, 0x05];
        let d = DataDecoder::new(&decoder_buf, 0);
        assert_eq!(d.decode_size(29, 1).unwrap(), (34, 2));

        let buf = [0x5E, 0x00, 0x01];
        let d = DataDecoder::new(&buf, 0);
        assert_eq!(d.decode_size(30, 1).unwrap(), (286, 3));

        let buf = [0x5F, 0x00, 0x00, 0x01];
        let d = DataDecoder::new(&buf, 0);
        assert_eq!(d.decode_size(31, 1).unwrap(), (65822, 4));
    }

    #[test]
    fn test_size_bytes_truncated() {
        let err = decode(&[0x5E, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfBounds { offset: 1, needed: 2, .. }));
    }

    #[test]
    fn test_bool_ignores_size_extension() {
        // Size field 29 on a boolean is the value itself, no extra byte
        let (value, next) = decode(&[0x1D, 0x07]).unwrap();
        assert_eq!(value, DataValue::Bool(true));
        assert_eq!(next, 2);

        let (value, _) = decode(&[0x00, 0x07]).unwrap();
        assert_eq!(value, DataValue::Bool(false));
    }

    #[test]
    fn test_int32_zero_padding() {
        // 3-byte encoding of 0xFFFFFF stays positive
        let (value, next) = decode(&[0x03, 0x01, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, DataValue::Int32(0x00FF_FFFF));
        assert_eq!(next, 5);

        let (value, _) = decode(&[0x04, 0x01, 0xFF, 0xFF, 0xFF, 0xFE]).unwrap();
        assert_eq!(value, DataValue::Int32(-2));

        let (value, _) = decode(&[0x00, 0x01]).unwrap();
        assert_eq!(value, DataValue::Int32(0));
    }

    #[test]
    fn test_oversized_numbers_rejected() {
        let err = decode(&[0xA3, 1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSize { data_type: DataType::Uint16, size: 3, .. }
        ));

        let err = decode(&[0x67, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSize { data_type: DataType::Double, size: 7, .. }
        ));
    }

    #[test]
    fn test_unknown_types() {
        // Extended byte 5 -> type 12, reserved
        assert_eq!(
            decode(&[0x00, 0x05]).unwrap_err(),
            DecodeError::UnknownType { type_code: 12, offset: 0 }
        );
        // Extended byte 9 -> type 16
        assert_eq!(
            decode(&[0x00, 0x09]).unwrap_err(),
            DecodeError::UnknownType { type_code: 16, offset: 0 }
        );
        // Extended byte 255 does not wrap around
        assert_eq!(
            decode(&[0x00, 0xFF]).unwrap_err(),
            DecodeError::UnknownType { type_code: 262, offset: 0 }
        );
    }

    #[test]
    fn test_offset_past_end() {
        let d = DataDecoder::new(&[0x40], 0);
        assert!(matches!(
            d.decode(1).unwrap_err(),
            DecodeError::OutOfBounds { offset: 1, needed: 1, buffer_len: 1 }
        ));
        assert!(matches!(
            d.decode(usize::MAX).unwrap_err(),
            DecodeError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_pointer_widths() {
        let d = DataDecoder::new(&[], 0);
        let ctrl = |size: usize| Control {
            data_type: DataType::Pointer,
            size,
            offset: 1,
        };

        let buf = [0x25, 0x0A];
        let d1 = DataDecoder { buffer: &buf, ..d };
        assert_eq!(d1.pointer_target(ctrl(0x05)).unwrap(), (0x50A, 2));

        let buf = [0x29, 0x00, 0x01];
        let d2 = DataDecoder { buffer: &buf, ..d };
        assert_eq!(d2.pointer_target(ctrl(0x09)).unwrap(), (0x1_0001 + 2048, 3));

        let buf = [0x32, 0x00, 0x00, 0x00];
        let d3 = DataDecoder { buffer: &buf, ..d };
        assert_eq!(d3.pointer_target(ctrl(0x12)).unwrap(), (0x0200_0000 + 526_336, 4));

        // Low bits are ignored for 4-byte pointers
        let buf = [0x3F, 0xDE, 0xAD, 0xBE, 0xEF];
        let d4 = DataDecoder { buffer: &buf, ..d };
        assert_eq!(d4.pointer_target(ctrl(0x1F)).unwrap(), (0xDEAD_BEEF, 5));
    }

    #[test]
    fn test_pointer_base_applied() {
        // [ptr -> 0][string "hi"] with data section starting at 2
        let buf = [0xFF, 0xFF, 0x42, b'h', b'i', 0x20, 0x00];
        let d = DataDecoder::new(&buf, 2);
        let (value, next) = d.decode(5).unwrap();
        assert_eq!(value, DataValue::from("hi"));
        assert_eq!(next, 7);
    }

    #[test]
    fn test_options_deserialize() {
        let opts: DecoderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, DecoderOptions::default());

        let opts: DecoderOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(opts, DecoderOptions::new().max_depth(8));
    }
}
