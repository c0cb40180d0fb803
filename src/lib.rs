//! mmdb-data - Zero-Copy Decoder for the MaxMind DB Data Section
//!
//! Decodes the typed, self-describing values stored in the data section of
//! MaxMind DB (MMDB) style databases: scalars, byte strings, 128-bit
//! integers, string-keyed maps and arrays, with pointers that let repeated
//! values be stored once.
//!
//! Locating the data section inside a database file, searching the IP tree
//! and mapping the file are left to the caller. The decoder takes a byte
//! buffer and the offset where the data section starts, nothing else.
//!
//! # Quick Start
//!
//! ```rust
//! use mmdb_data::{DataDecoder, DataEncoder, DataMap, DataValue, PathElement};
//!
//! // Build a small data section
//! let names: DataMap = [("en", DataValue::from("Berlin"))].into_iter().collect();
//! let city: DataMap = [
//!     ("geoname_id", DataValue::Uint32(2950159)),
//!     ("names", DataValue::Map(names)),
//! ]
//! .into_iter()
//! .collect();
//!
//! let mut encoder = DataEncoder::new();
//! let offset = encoder.encode(&DataValue::Map(city))? as usize;
//! let section = encoder.into_bytes();
//!
//! // Decode it back
//! let decoder = DataDecoder::new(&section, 0);
//! let (value, next) = decoder.decode(offset)?;
//! assert_eq!(next, section.len());
//! assert_eq!(value.get_path(&["names", "en"]).and_then(|v| v.as_str()), Some("Berlin"));
//!
//! // Or decode only what you need
//! let id = decoder.decode_path(offset, &[PathElement::Key("geoname_id")])?;
//! assert_eq!(id.and_then(|v| v.as_u64()), Some(2950159));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Key Features
//!
//! - **Zero-Copy**: strings and byte arrays borrow from the input buffer
//! - **No Hidden State**: every decode takes an offset and returns the next one
//! - **Hardened**: bounds checked reads, typed errors, nesting depth limit
//! - **Lazy Paths**: `decode_path` skips siblings instead of decoding them
//!
//! # Layout
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Database File                         │
//! ├────────────────────────────────────────┤
//! │  1. IP Search Tree        (caller)     │
//! │  2. Data Section          (this crate) │
//! │  3. Metadata              (caller)     │
//! └────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section decoder
pub mod decoder;
/// Data section encoder
pub mod encoder;
/// Error types for decoding and encoding
pub mod error;
/// Type codes and format constants
pub mod types;
/// Decoded value types
pub mod value;

// Re-exports for Rust consumers

pub use crate::decoder::{DataDecoder, DataIter, DecoderOptions, PathElement, DEFAULT_MAX_DEPTH};
pub use crate::encoder::{encode_to_vec, DataEncoder};
pub use crate::error::{DecodeError, EncodeError, Result};
pub use crate::types::DataType;
pub use crate::value::{DataMap, DataStr, DataValue};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
