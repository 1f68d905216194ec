#![no_main]

use libfuzzer_sys::fuzz_target;
use snapjs::parser::parse;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Limit input size to avoid timeout
    if source.len() > 100_000 {
        return;
    }

    // A parsed program must survive the JSON round trip snapshots use
    if let Ok(program) = parse(source) {
        let json = serde_json::to_string(&program).expect("program serializes");
        let _: snapjs::ast::Program = serde_json::from_str(&json).expect("program deserializes");
    }
});
