//! Error types for the interpreter
//!
//! Three classes of failure flow through the engine:
//! - user errors (`User`, `Thrown`, `Syntax`) become throw completions inside a
//!   thread and can be caught by interpreted `try`/`catch`;
//! - host faults (`HostFault`, `Snapshot`, `Json`) are invariant violations that
//!   kill the running thread and are handed back to the embedder;
//! - suspension (sleep/block) is not an error at all and never appears here.

use crate::value::JsValue;
use std::fmt;
use thiserror::Error;

/// Source location information for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The interpreted-language error classes.
///
/// Each kind has a constructor and a prototype object in the builtins table,
/// named after [`ErrorKind::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    URIError,
    EvalError,
    PermissionError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::URIError,
        ErrorKind::EvalError,
        ErrorKind::PermissionError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::URIError => "URIError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::PermissionError => "PermissionError",
        }
    }

    /// Key of this kind's prototype in the builtins table
    pub fn prototype_key(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error.prototype",
            ErrorKind::TypeError => "TypeError.prototype",
            ErrorKind::RangeError => "RangeError.prototype",
            ErrorKind::ReferenceError => "ReferenceError.prototype",
            ErrorKind::SyntaxError => "SyntaxError.prototype",
            ErrorKind::URIError => "URIError.prototype",
            ErrorKind::EvalError => "EvalError.prototype",
            ErrorKind::PermissionError => "PermissionError.prototype",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for the interpreter
#[derive(Debug, Error)]
pub enum JsError {
    /// An error to be raised inside the interpreted program as an Error object
    #[error("{kind}: {message}")]
    User { kind: ErrorKind, message: String },

    /// Source text could not be parsed
    #[error("SyntaxError: {message} at {location}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// An interpreted value is being thrown. `message` is filled in when the
    /// value escapes to the host and is empty while inside the engine.
    #[error("Uncaught {message}")]
    Thrown { value: JsValue, message: String },

    /// Internal invariant violation; never catchable by interpreted code
    #[error("Host fault: {0}")]
    HostFault(String),

    /// A snapshot could not be decoded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsError::User {
            kind,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// `name is not defined`
    pub fn reference_error(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ReferenceError, format!("{} is not defined", name))
    }

    pub fn permission_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionError, message)
    }

    pub fn syntax_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::Syntax {
            message: message.into(),
            location: SourceLocation { line, column },
        }
    }

    pub fn thrown(value: JsValue) -> Self {
        JsError::Thrown {
            value,
            message: String::new(),
        }
    }

    pub fn host_fault(message: impl Into<String>) -> Self {
        JsError::HostFault(message.into())
    }

    pub fn snapshot(message: impl Into<String>) -> Self {
        JsError::Snapshot(message.into())
    }

    /// Whether this error must bypass interpreted `catch` blocks
    pub fn is_host_fault(&self) -> bool {
        matches!(
            self,
            JsError::HostFault(_) | JsError::Snapshot(_) | JsError::Json(_)
        )
    }

    /// The interpreted error class this error will be raised as, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            JsError::User { kind, .. } => Some(*kind),
            JsError::Syntax { .. } => Some(ErrorKind::SyntaxError),
            _ => None,
        }
    }
}
