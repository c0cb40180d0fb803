//! Property tests: encoder output always decodes to the original value
//!
//! Also checks that arbitrary input never panics the decoder.

use mmdb_data::{encode_to_vec, DataDecoder, DataStr, DataValue, DecoderOptions};
use proptest::prelude::*;

fn decode_exact(bytes: &[u8]) -> DataValue<'_> {
    let (value, next) = DataDecoder::new(bytes, 0).decode(0).unwrap();
    assert_eq!(next, bytes.len());
    value
}

proptest! {
    #[test]
    fn prop_uint_round_trip(a: u16, b: u32, c: u64, d: u128) {
        for value in [
            DataValue::Uint16(a),
            DataValue::Uint32(b),
            DataValue::Uint64(c),
            DataValue::Uint128(d),
        ] {
            let bytes = encode_to_vec(&value).unwrap();
            prop_assert_eq!(decode_exact(&bytes), value);
        }
    }

    #[test]
    fn prop_int32_round_trip(n: i32) {
        let value = DataValue::Int32(n);
        let bytes = encode_to_vec(&value).unwrap();
        prop_assert_eq!(decode_exact(&bytes), value);
    }

    #[test]
    fn prop_float_round_trip(f: f32, d: f64) {
        let bytes = encode_to_vec(&DataValue::Float(f)).unwrap();
        match decode_exact(&bytes) {
            DataValue::Float(out) => prop_assert_eq!(out.to_bits(), f.to_bits()),
            other => prop_assert!(false, "expected float, got {:?}", other),
        }

        let bytes = encode_to_vec(&DataValue::Double(d)).unwrap();
        match decode_exact(&bytes) {
            DataValue::Double(out) => prop_assert_eq!(out.to_bits(), d.to_bits()),
            other => prop_assert!(false, "expected double, got {:?}", other),
        }
    }

    #[test]
    fn prop_bool_round_trip(b: bool) {
        let value = DataValue::Bool(b);
        let bytes = encode_to_vec(&value).unwrap();
        prop_assert_eq!(decode_exact(&bytes), value);
    }

    #[test]
    fn prop_bytes_round_trip(data in prop::collection::vec(any::<u8>(), 0..70_000)) {
        let value = DataValue::Bytes(&data);
        let bytes = encode_to_vec(&value).unwrap();
        prop_assert_eq!(decode_exact(&bytes), value);
    }

    #[test]
    fn prop_string_round_trip(s in ".{0,300}") {
        let value = DataValue::String(DataStr::from(s.as_str()));
        let bytes = encode_to_vec(&value).unwrap();
        let decoded = decode_exact(&bytes);
        prop_assert_eq!(decoded.as_str(), Some(s.as_str()));
    }

    #[test]
    fn prop_arbitrary_input_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..256),
        offset in 0usize..300,
    ) {
        let decoder = DataDecoder::with_options(&data, 0, DecoderOptions::new().max_depth(16));
        if let Ok((_, next)) = decoder.decode(offset) {
            prop_assert!(next <= data.len());
            prop_assert_eq!(decoder.skip(offset).ok(), Some(next));
        }
    }
}
