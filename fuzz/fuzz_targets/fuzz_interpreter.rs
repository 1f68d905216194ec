#![no_main]

use libfuzzer_sys::fuzz_target;
use snapjs::platform::ManualTimeProvider;
use snapjs::{Interpreter, ThreadStatus};

const MAX_STEPS: usize = 100_000;

/// Steps between the snapshot taken and restored mid-run
const SNAPSHOT_AT: usize = 500;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Smaller limit for interpreter (more expensive per byte)
    if source.len() > 10_000 {
        return;
    }

    let Ok(mut interp) = Interpreter::new() else {
        return;
    };
    let clock = ManualTimeProvider::new();
    interp.set_time_provider(Box::new(clock.clone()));
    if interp.spawn(source).is_err() {
        return;
    }

    // Step loop with timeout protection; the snapshot must always restore
    let mut steps = 0;
    loop {
        match interp.step_once() {
            Ok(true) => {
                steps += 1;
                if steps == SNAPSHOT_AT {
                    let snapshot = interp.snapshot().expect("snapshot encodes");
                    let mut restored = Interpreter::new().expect("interpreter starts");
                    restored.set_time_provider(Box::new(clock.clone()));
                    restored.restore(&snapshot).expect("snapshot restores");
                    interp = restored;
                }
                if steps > MAX_STEPS {
                    break; // Prevent infinite loops
                }
            }
            Ok(false) => {
                // Sleeping threads: jump the clock forward, else finished
                let sleeping = interp
                    .thread_ids()
                    .into_iter()
                    .any(|t| interp.thread_status(t) == Some(ThreadStatus::Sleeping));
                if sleeping {
                    clock.advance(1_000.0);
                } else {
                    break;
                }
            }
            Err(_) => break, // Host faults end the run
        }
    }
});
