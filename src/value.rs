//! Decoded data section values
//!
//! Values borrow strings and byte arrays straight from the decoder's buffer,
//! so a `DataValue<'a>` cannot outlive the bytes it was decoded from.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, Serializer};

use crate::error::DecodeError;
use crate::types::DataType;

/// A decoded data section value
///
/// Pointers never appear here: the decoder always resolves them to the
/// value they reference.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue<'a> {
    /// UTF-8 string (not validated on decode)
    String(DataStr<'a>),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(&'a [u8]),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(DataMap<'a>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue<'a>>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl<'a> DataValue<'a> {
    /// Wire type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::String(_) => DataType::String,
            DataValue::Double(_) => DataType::Double,
            DataValue::Bytes(_) => DataType::Bytes,
            DataValue::Uint16(_) => DataType::Uint16,
            DataValue::Uint32(_) => DataType::Uint32,
            DataValue::Map(_) => DataType::Map,
            DataValue::Int32(_) => DataType::Int32,
            DataValue::Uint64(_) => DataType::Uint64,
            DataValue::Uint128(_) => DataType::Uint128,
            DataValue::Array(_) => DataType::Array,
            DataValue::Bool(_) => DataType::Bool,
            DataValue::Float(_) => DataType::Float,
        }
    }

    /// Lowercase type name
    pub fn type_name(&self) -> &'static str {
        self.data_type().name()
    }

    /// String contents, if this is a string holding valid UTF-8
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            DataValue::String(s) => s.to_str().ok(),
            _ => None,
        }
    }

    /// Raw bytes of a string or byte array
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            DataValue::String(s) => Some(s.as_bytes()),
            DataValue::Bytes(b) => Some(*b),
            _ => None,
        }
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer that fits in a `u64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(u64::from(*n)),
            DataValue::Uint32(n) => Some(u64::from(*n)),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            DataValue::Int32(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Any integer that fits in an `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Int32(n) => Some(i64::from(*n)),
            DataValue::Uint16(n) => Some(i64::from(*n)),
            DataValue::Uint32(n) => Some(i64::from(*n)),
            DataValue::Uint64(n) => i64::try_from(*n).ok(),
            DataValue::Uint128(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Either float width, widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            DataValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    /// Map contents
    pub fn as_map(&self) -> Option<&DataMap<'a>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[DataValue<'a>]> {
        match self {
            DataValue::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// Look up a key if this is a map
    pub fn get(&self, key: &str) -> Option<&DataValue<'a>> {
        self.as_map()?.get(key)
    }

    /// Walk nested maps and arrays
    ///
    /// Array elements are addressed by their decimal index. Returns `None` as
    /// soon as a key is missing, an index does not parse or is out of range,
    /// or the walk reaches a scalar with path left over.
    pub fn get_path(&self, path: &[&str]) -> Option<&DataValue<'a>> {
        let mut value = self;
        for key in path {
            match value {
                DataValue::Map(m) => {
                    value = m.get(key)?;
                }
                DataValue::Array(a) => {
                    let idx: usize = key.parse().ok()?;
                    value = a.get(idx)?;
                }
                _ => return None,
            }
        }
        Some(value)
    }

    /// Check every string and map key in the tree for well-formed UTF-8
    ///
    /// Returns the number of strings checked (keys included).
    pub fn check_utf8(&self) -> Result<usize, DecodeError> {
        match self {
            DataValue::String(s) => {
                s.to_str()?;
                Ok(1)
            }
            DataValue::Map(map) => {
                let mut count = 0;
                for (key, value) in map.iter() {
                    key.to_str()?;
                    count += 1 + value.check_utf8()?;
                }
                Ok(count)
            }
            DataValue::Array(arr) => {
                let mut count = 0;
                for value in arr {
                    count += value.check_utf8()?;
                }
                Ok(count)
            }
            _ => Ok(0),
        }
    }
}

impl<'a> From<&'a str> for DataValue<'a> {
    fn from(s: &'a str) -> Self {
        DataValue::String(DataStr::from(s))
    }
}

impl Serialize for DataValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::String(s) => serializer.serialize_str(&s.to_string_lossy()),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Bytes(b) => serializer.serialize_bytes(b),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Map(m) => {
                serializer.collect_map(m.iter().map(|(k, v)| (k.to_string_lossy(), v)))
            }
            DataValue::Int32(n) => serializer.serialize_i32(*n),
            DataValue::Uint64(n) => serializer.serialize_u64(*n),
            DataValue::Uint128(n) => serializer.serialize_u128(*n),
            DataValue::Array(a) => serializer.collect_seq(a),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Float(f) => serializer.serialize_f32(*f),
        }
    }
}

/// Borrowed string bytes from the data section
///
/// The decoder passes string payloads through without UTF-8 validation.
/// Use [`DataStr::to_str`] to validate, or [`DataStr::to_string_lossy`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DataStr<'a>(&'a [u8]);

impl<'a> DataStr<'a> {
    /// Wrap raw string bytes
    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        DataStr(bytes)
    }

    /// Underlying bytes
    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Length in bytes
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty string
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate and borrow as `&str`
    pub fn to_str(&self) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(self.0)
    }

    /// Borrow as `&str`, replacing invalid sequences if needed
    pub fn to_string_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.0)
    }
}

impl<'a> From<&'a str> for DataStr<'a> {
    fn from(s: &'a str) -> Self {
        DataStr(s.as_bytes())
    }
}

impl PartialEq<str> for DataStr<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for DataStr<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Debug for DataStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Display for DataStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// String-keyed map preserving encoding order
///
/// Inserting an existing key replaces its value in place. Equality ignores
/// entry order.
#[derive(Clone, Default)]
pub struct DataMap<'a> {
    entries: Vec<(DataStr<'a>, DataValue<'a>)>,
    index: FxHashMap<&'a [u8], usize>,
}

impl<'a> DataMap<'a> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Insert a pair, returning the value it replaced
    pub fn insert(&mut self, key: DataStr<'a>, value: DataValue<'a>) -> Option<DataValue<'a>> {
        match self.index.get(key.as_bytes()) {
            Some(&idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.index.insert(key.as_bytes(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&DataValue<'a>> {
        self.get_bytes(key.as_bytes())
    }

    /// Value stored under a raw byte key
    pub fn get_bytes(&self, key: &[u8]) -> Option<&DataValue<'a>> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key.as_bytes())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in encoding order
    pub fn iter(&self) -> impl Iterator<Item = (&DataStr<'a>, &DataValue<'a>)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Keys in encoding order
    pub fn keys(&self) -> impl Iterator<Item = &DataStr<'a>> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values in encoding order
    pub fn values(&self) -> impl Iterator<Item = &DataValue<'a>> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for DataMap<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get_bytes(k.as_bytes()) == Some(v))
    }
}

impl fmt::Debug for DataMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> FromIterator<(DataStr<'a>, DataValue<'a>)> for DataMap<'a> {
    fn from_iter<I: IntoIterator<Item = (DataStr<'a>, DataValue<'a>)>>(iter: I) -> Self {
        let mut map = DataMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> FromIterator<(&'a str, DataValue<'a>)> for DataMap<'a> {
    fn from_iter<I: IntoIterator<Item = (&'a str, DataValue<'a>)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (DataStr::from(k), v)).collect()
    }
}

impl<'a> IntoIterator for DataMap<'a> {
    type Item = (DataStr<'a>, DataValue<'a>);
    type IntoIter = std::vec::IntoIter<(DataStr<'a>, DataValue<'a>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataValue<'static> {
        let names: DataMap = [("en", DataValue::from("Germany")), ("de", "Deutschland".into())]
            .into_iter()
            .collect();
        let country: DataMap = [
            ("iso_code", DataValue::from("DE")),
            ("geoname_id", DataValue::Uint32(2921044)),
            ("names", DataValue::Map(names)),
        ]
        .into_iter()
        .collect();
        let root: DataMap = [
            ("country", DataValue::Map(country)),
            (
                "subdivisions",
                DataValue::Array(vec![DataValue::from("BY"), DataValue::from("BE")]),
            ),
        ]
        .into_iter()
        .collect();
        DataValue::Map(root)
    }

    #[test]
    fn test_get_path() {
        let value = sample();
        assert_eq!(
            value.get_path(&["country", "names", "en"]).and_then(|v| v.as_str()),
            Some("Germany")
        );
        assert_eq!(
            value.get_path(&["subdivisions", "1"]).and_then(|v| v.as_str()),
            Some("BE")
        );
        assert_eq!(value.get_path(&["subdivisions", "2"]), None);
        assert_eq!(value.get_path(&["subdivisions", "x"]), None);
        assert_eq!(value.get_path(&["country", "iso_code", "deeper"]), None);
        assert_eq!(value.get_path(&[]), Some(&value));
    }

    #[test]
    fn test_map_last_write_wins_keeps_position() {
        let mut map = DataMap::new();
        assert_eq!(map.insert("a".into(), DataValue::Uint16(1)), None);
        map.insert("b".into(), DataValue::Uint16(2));
        assert_eq!(
            map.insert("a".into(), DataValue::Uint16(3)),
            Some(DataValue::Uint16(1))
        );

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&DataValue::Uint16(3)));
        let keys: Vec<_> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let m1: DataMap = [("x", DataValue::Bool(true)), ("y", DataValue::Bool(false))]
            .into_iter()
            .collect();
        let m2: DataMap = [("y", DataValue::Bool(false)), ("x", DataValue::Bool(true))]
            .into_iter()
            .collect();
        assert_eq!(m1, m2);

        let m3: DataMap = [("x", DataValue::Bool(true))].into_iter().collect();
        assert_ne!(m1, m3);
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(DataValue::Uint16(7).as_u64(), Some(7));
        assert_eq!(DataValue::Int32(-1).as_u64(), None);
        assert_eq!(DataValue::Int32(-1).as_i64(), Some(-1));
        assert_eq!(DataValue::Uint128(u128::MAX).as_u64(), None);
        assert_eq!(DataValue::Uint64(u64::MAX).as_i64(), None);
        assert_eq!(DataValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(DataValue::Bool(true).as_u64(), None);
    }

    #[test]
    fn test_data_str_lossy() {
        let s = DataStr::new(b"ok\xFF");
        assert!(s.to_str().is_err());
        assert_eq!(s.to_string_lossy(), "ok\u{FFFD}");
        assert_eq!(DataStr::from("abc"), "abc");
        assert_eq!(format!("{:?}", DataStr::from("abc")), "\"abc\"");
    }

    #[test]
    fn test_check_utf8() {
        assert_eq!(sample().check_utf8(), Ok(12));

        let bad = DataValue::Array(vec![
            DataValue::from("fine"),
            DataValue::String(DataStr::new(b"\xC3")),
        ]);
        assert_eq!(
            bad.check_utf8(),
            Err(DecodeError::InvalidUtf8 { valid_up_to: 0 })
        );

        let bad_key: DataMap = [(DataStr::new(b"k\xFF"), DataValue::Bool(true))]
            .into_iter()
            .collect();
        assert!(DataValue::Map(bad_key).check_utf8().is_err());
    }

    #[test]
    fn test_serialize_json() {
        let value = sample();
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["country"]["iso_code"], "DE");
        assert_eq!(json["country"]["geoname_id"], 2921044);
        assert_eq!(json["subdivisions"][1], "BE");

        let big = serde_json::to_string(&DataValue::Uint128(u128::MAX)).unwrap();
        assert_eq!(big, u128::MAX.to_string());

        let bytes = serde_json::to_string(&DataValue::Bytes(&[1, 2])).unwrap();
        assert_eq!(bytes, "[1,2]");
    }
}
