#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_data::{DataDecoder, DecoderOptions, PathElement};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the start offset and pointer base, the rest is the buffer
    let start = (data[0] & 0x0F) as usize;
    let base = (data[0] >> 4) as usize;
    let buffer = &data[1..];

    let decoder = DataDecoder::with_options(buffer, base, DecoderOptions::new().max_depth(32));

    if let Ok((value, next)) = decoder.decode(start) {
        assert!(next <= buffer.len());
        assert_eq!(decoder.skip(start).ok(), Some(next));
        let _ = value.check_utf8();
    }

    let _ = decoder.decode_path(start, &[PathElement::Key("names"), PathElement::Index(0)]);

    for item in decoder.iter(0).take(64) {
        if item.is_err() {
            break;
        }
    }
});
