//! Whole-interpreter snapshots
//!
//! A snapshot is a JSON array of records. Record 0 describes the interpreter
//! itself; every other record is an object, a scope, a loaded program or a
//! thread, numbered breadth-first from record 0. Records refer to each other
//! with `{"#": index}`, so cycles and sharing survive a round trip.
//!
//! Values use plain JSON where they can. The exceptions are tagged:
//! `{"Value": "undefined"}` and `{"Number": "NaN" | "Infinity" | "-Infinity" | "-0"}`.
//!
//! Host configuration is not part of a snapshot: native functions are
//! recorded by id and must be registered again before a restore, and the
//! config, policy and providers stay those of the restoring interpreter.

mod decode;
mod encode;

use crate::error::JsError;
use crate::interpreter::Interpreter;

/// Bumped whenever the record layout changes
pub const FORMAT_VERSION: u64 = 1;

/// Key under which a record refers to another
const REF: &str = "#";

/// Build a `{"#": index}` reference
fn reference(index: usize) -> serde_json::Value {
    serde_json::json!({ REF: index })
}

/// Index of a `{"#": index}` reference
fn as_reference(value: &serde_json::Value) -> Option<usize> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(REF)?.as_u64().map(|index| index as usize)
}

impl Interpreter {
    /// Capture the complete runtime state.
    ///
    /// Taking `&self` guarantees no step is in progress.
    pub fn snapshot(&self) -> Result<serde_json::Value, JsError> {
        let records = encode::Encoder::new(self).encode()?;
        tracing::info!(
            records = records.len(),
            threads = self.threads.len(),
            "snapshot taken"
        );
        Ok(serde_json::Value::Array(records))
    }

    pub fn snapshot_string(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string(&self.snapshot()?)?)
    }

    /// Replace the runtime state with a snapshot's. Natives, configuration
    /// and providers are kept; every native id the snapshot names must be
    /// registered. On error the interpreter is left unchanged.
    pub fn restore(&mut self, snapshot: &serde_json::Value) -> Result<(), JsError> {
        let image = decode::Decoder::new(self, snapshot)?.decode()?;
        let threads = image.threads.len();
        image.install(self);
        tracing::info!(threads, "snapshot restored");
        Ok(())
    }

    pub fn restore_str(&mut self, text: &str) -> Result<(), JsError> {
        let snapshot: serde_json::Value = serde_json::from_str(text)?;
        self.restore(&snapshot)
    }
}
