#![no_main]

use libfuzzer_sys::fuzz_target;
use vmscope::devirtualization::{decode_position, encode_position};

fuzz_target!(|input: (i64, &str)| {
    let (key, encoded) = input;
    if let Ok(position) = decode_position(encoded, key) {
        let canonical = encode_position(position, key);
        if !encoded.is_empty() {
            assert_eq!(canonical, encoded);
        }
        assert_eq!(decode_position(&canonical, key), Ok(position));
    }
});
