#![no_main]

use libfuzzer_sys::fuzz_target;
use snapjs::Interpreter;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 100_000 {
        return;
    }

    // Arbitrary input must be rejected cleanly, never half-installed
    let Ok(mut interp) = Interpreter::new() else {
        return;
    };
    if interp.restore_str(text).is_err() {
        let _ = interp.eval("1 + 1").expect("interpreter still usable");
    }
});
