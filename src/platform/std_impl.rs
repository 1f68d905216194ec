//! Standard library implementations of platform traits.

use super::{ConsoleLevel, ConsoleProvider, RandomProvider, TimeProvider};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time provider using std::time.
pub struct StdTimeProvider {
    /// Reference instant for uptime calculations
    epoch: Instant,
}

impl StdTimeProvider {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for StdTimeProvider {
    fn now_millis(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0)
    }

    fn uptime_millis(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn wait(&self, millis: f64) {
        if millis > 0.0 && millis.is_finite() {
            std::thread::sleep(Duration::from_secs_f64(millis / 1000.0));
        }
    }
}

/// Deterministic clock for tests and simulations.
///
/// Clones share the same clock, so a test can keep a handle and advance time
/// while the interpreter owns another. With a non-zero `tick`, every reading
/// advances the clock, which makes "ran too long" checks reproducible.
#[derive(Clone, Default)]
pub struct ManualTimeProvider {
    now: Rc<Cell<f64>>,
    tick: f64,
}

impl ManualTimeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that moves forward `tick` milliseconds on every reading
    pub fn ticking(tick: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(0.0)),
            tick,
        }
    }

    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set(&self, millis: f64) {
        self.now.set(millis);
    }

    pub fn current(&self) -> f64 {
        self.now.get()
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_millis(&self) -> f64 {
        self.now.get()
    }

    fn uptime_millis(&self) -> f64 {
        let value = self.now.get();
        self.now.set(value + self.tick);
        value
    }

    fn wait(&self, millis: f64) {
        if millis > 0.0 && millis.is_finite() {
            self.advance(millis);
        }
    }
}

/// Random provider using a simple xorshift64 PRNG.
///
/// Seeded from the current time on creation.
pub struct StdRandomProvider {
    state: u64,
}

impl StdRandomProvider {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x12345678_9abcdef0);
        Self::with_seed(seed)
    }

    /// Create with a specific seed (for testing).
    pub fn with_seed(seed: u64) -> Self {
        let seed = if seed == 0 { 0x12345678_9abcdef0 } else { seed };
        Self { state: seed }
    }
}

impl Default for StdRandomProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomProvider for StdRandomProvider {
    fn random(&mut self) -> f64 {
        // xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        // 53 random bits mapped to [0, 1)
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Console provider that forwards to `tracing` under the `console` target.
///
/// This is the default provider: output lands wherever the embedder's
/// subscriber sends it.
#[derive(Default)]
pub struct TracingConsole;

impl ConsoleProvider for TracingConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Error => tracing::error!(target: "console", "{}", message),
            ConsoleLevel::Warn => tracing::warn!(target: "console", "{}", message),
            ConsoleLevel::Debug => tracing::debug!(target: "console", "{}", message),
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "console", "{}", message)
            }
        }
    }
}

/// Console provider writing to stdout (log/info/debug) and stderr (warn/error).
#[derive(Default)]
pub struct StdConsoleProvider;

impl ConsoleProvider for StdConsoleProvider {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{}", message),
            _ => println!("{}", message),
        }
    }
}

/// Console provider that records every line, for tests.
///
/// Clones share the same buffer.
#[derive(Clone, Default)]
pub struct BufferConsole {
    lines: Rc<RefCell<Vec<(ConsoleLevel, String)>>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, in order
    pub fn messages(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Recorded messages at one level
    pub fn messages_at(&self, level: ConsoleLevel) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// All recorded messages joined by newlines
    pub fn output(&self) -> String {
        self.messages().join("\n")
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl ConsoleProvider for BufferConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}
