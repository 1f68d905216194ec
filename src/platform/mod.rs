//! Platform abstraction traits.
//!
//! The interpreter never reads the wall clock, prints, or draws random numbers
//! directly; it goes through these providers so that embedders (and tests) can
//! substitute deterministic implementations.

mod std_impl;

pub use std_impl::{
    BufferConsole, ManualTimeProvider, StdConsoleProvider, StdRandomProvider, StdTimeProvider,
    TracingConsole,
};

/// Trait for providing time-related functionality.
pub trait TimeProvider {
    /// Current time as milliseconds since the Unix epoch. Used for `Date.now()`.
    fn now_millis(&self) -> f64;

    /// Monotonic milliseconds since the provider was created. Drives the
    /// interpreter clock used for sleeping threads and time limits.
    fn uptime_millis(&self) -> f64;

    /// Block the host until `millis` have elapsed. Only used by blocking
    /// conveniences such as `Interpreter::eval`, never by the scheduler.
    fn wait(&self, millis: f64);
}

/// Trait for providing random number generation.
pub trait RandomProvider {
    /// Generate a random f64 in the range [0, 1). Used for `Math.random()`.
    fn random(&mut self) -> f64;
}

/// Log level for console output.
///
/// Maps to the different console methods: console.log(), console.warn(), etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }
}

/// Trait for handling console output.
pub trait ConsoleProvider {
    /// Write a message at the specified log level.
    fn write(&self, level: ConsoleLevel, message: &str);
}
