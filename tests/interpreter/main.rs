//! Integration tests for the interpreter, organized by feature
//!
//! These tests exercise the interpreter through the public API.
//!
//! ## Aggressive Test Defaults
//!
//! Tests use aggressive defaults to catch bugs early:
//! - `GC_THRESHOLD=1` - GC between every step that allocated
//! - a manual clock, so timers never sleep the test process
//!
//! Override via environment variables:
//!
//! ```bash
//! cargo test                           # Default: aggressive settings
//! GC_THRESHOLD=100 cargo test          # Less aggressive GC for faster runs
//! ```

mod basics;
mod control_flow;
mod error;
mod function;
mod gc;
mod native_bridge;
mod object;
mod permission;
mod scheduler;
mod snapshot;
mod timeout;

use snapjs::platform::{BufferConsole, ManualTimeProvider};
use snapjs::{Interpreter, InterpreterConfig, JsError, JsValue};

/// GC threshold for tests; `GC_THRESHOLD` overrides the default of 1
pub fn test_gc_threshold() -> usize {
    // GC_THRESHOLD=100 cargo test  # Faster runs
    // GC_THRESHOLD=0 cargo test    # Disable automatic GC
    std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1)
}

/// Create an interpreter from `config` with test defaults applied: the
/// test GC threshold and a manual clock starting at zero
#[allow(clippy::expect_used)]
pub fn create_runtime_with(config: InterpreterConfig) -> (Interpreter, ManualTimeProvider) {
    let config = config.with_gc_threshold(test_gc_threshold());
    let clock = ManualTimeProvider::new();
    let interp = Interpreter::with_time_provider(config, Box::new(clock.clone()))
        .expect("interpreter should start");
    (interp, clock)
}

/// Create a new interpreter with aggressive defaults for testing
pub fn create_test_runtime() -> Interpreter {
    create_runtime_with(InterpreterConfig::default()).0
}

/// Like [`create_test_runtime`], with console output captured
pub fn create_console_runtime() -> (Interpreter, BufferConsole) {
    let mut interp = create_test_runtime();
    let console = BufferConsole::new();
    interp.set_console(Box::new(console.clone()));
    (interp, console)
}

/// Evaluate source code and return its completion value
#[allow(clippy::expect_used)]
pub fn eval(source: &str) -> JsValue {
    eval_result(source).expect("eval failed")
}

/// Evaluate and return the Result, for error testing
pub fn eval_result(source: &str) -> Result<JsValue, JsError> {
    create_test_runtime().eval(source)
}

/// Evaluate and return everything written to the console
#[allow(clippy::expect_used)]
pub fn eval_output(source: &str) -> Vec<String> {
    let (mut interp, console) = create_console_runtime();
    interp.eval(source).expect("eval failed");
    console.messages()
}

/// Helper to check if evaluation throws an error containing a specific message
pub fn throws_error(source: &str, error_contains: &str) -> bool {
    match eval_result(source) {
        Err(e) => e.to_string().contains(error_contains),
        Ok(_) => false,
    }
}

/// String value shorthand for assertions
pub fn s(text: &str) -> JsValue {
    JsValue::from(text)
}
