//! Resumable JavaScript interpreter
//!
//! Programs run as cooperative threads on an explicit state machine, so the
//! whole runtime (heap, scopes, every thread's continuation, pending timers)
//! can be snapshotted to JSON at any point between steps and restored later
//! to carry on where it stopped.
//!
//! # Example
//!
//! ```
//! use snapjs::{Interpreter, JsValue};
//!
//! # fn main() -> Result<(), snapjs::JsError> {
//! let mut interp = Interpreter::new()?;
//! assert_eq!(interp.eval("1 + 2 * 3")?, JsValue::Number(7.0));
//!
//! // Take a snapshot and carry on in a fresh interpreter
//! interp.eval("var counter = 41;")?;
//! let snapshot = interp.snapshot()?;
//! let mut restored = Interpreter::new()?;
//! restored.restore(&snapshot)?;
//! assert_eq!(restored.eval("counter + 1")?, JsValue::Number(42.0));
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod gc;
pub mod interpreter;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod platform;
pub mod snapshot;
pub mod value;

pub use config::{InterpreterConfig, PolicyKind};
pub use error::{ErrorKind, JsError};
pub use gc::Guard;
pub use interpreter::native::{
    done, native, reenter_call, Continuation, NativeCall, NativeFn, NativeResult, Resolver,
};
pub use interpreter::permission::{Access, AccessRequest, AuthorizationPolicy};
pub use interpreter::thread::{ThreadId, ThreadOutcome, ThreadStatus};
pub use interpreter::{Interpreter, RunResult, RunStatus};
pub use snapshot::FORMAT_VERSION;
pub use value::{CheapClone, JsString, JsValue, ObjectId, Owner};
