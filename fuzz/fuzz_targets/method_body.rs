#![no_main]

use libfuzzer_sys::fuzz_target;
use vmscope::{disassembler::decode_stream, metadata::method::MethodBody, Parser};

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = MethodBody::from(data) {
        if let Ok(code) = body.code(data) {
            let mut parser = Parser::new(code);
            let _ = decode_stream(&mut parser);
        }
    }
});
