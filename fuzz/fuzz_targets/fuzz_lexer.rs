#![no_main]

use libfuzzer_sys::fuzz_target;
use snapjs::lexer::Lexer;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Limit input size to avoid timeout
    if source.len() > 100_000 {
        return;
    }

    // Ok or Err, never a panic
    let _ = Lexer::new(source).tokenize();
});
