//! Threads: independent stacks of states plus scheduling metadata

use std::fmt;

use crate::gc::{Marker, Traceable};
use crate::value::JsValue;

use super::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Ready,
    Sleeping,
    Blocked,
    Zombie,
}

impl ThreadStatus {
    pub fn name(self) -> &'static str {
        match self {
            ThreadStatus::Ready => "ready",
            ThreadStatus::Sleeping => "sleeping",
            ThreadStatus::Blocked => "blocked",
            ThreadStatus::Zombie => "zombie",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ready" => ThreadStatus::Ready,
            "sleeping" => ThreadStatus::Sleeping,
            "blocked" => ThreadStatus::Blocked,
            "zombie" => ThreadStatus::Zombie,
            _ => return None,
        })
    }
}

/// How a finished thread ended
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadOutcome {
    Completed(JsValue),
    Threw(JsValue),
    Killed,
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    pub status: ThreadStatus,
    pub stack: Vec<State>,
    /// When the thread became (or becomes) runnable, on the interpreter clock
    pub run_at: f64,
    /// Position in the run queue; orders threads runnable at the same time
    pub queued: u64,
    /// Budget for one uninterrupted run, in milliseconds
    pub time_limit: Option<f64>,
    /// Clock reading when the current run started
    pub run_started: f64,
    pub outcome: Option<ThreadOutcome>,
    /// Keep the zombie around until the host takes its outcome
    pub keep_outcome: bool,
}

impl Thread {
    pub fn new(id: ThreadId, run_at: f64, time_limit: Option<f64>) -> Self {
        Self {
            id,
            status: ThreadStatus::Ready,
            stack: Vec::new(),
            run_at,
            queued: 0,
            time_limit,
            run_started: run_at,
            outcome: None,
            keep_outcome: false,
        }
    }

    pub fn is_zombie(&self) -> bool {
        self.status == ThreadStatus::Zombie
    }

    /// Mark finished and drop the stack. Pending finalizers do not run.
    pub fn finish(&mut self, outcome: ThreadOutcome) {
        self.status = ThreadStatus::Zombie;
        self.stack.clear();
        self.outcome = Some(outcome);
    }
}

impl Traceable for ThreadOutcome {
    fn trace(&self, marker: &mut Marker) {
        match self {
            ThreadOutcome::Completed(v) | ThreadOutcome::Threw(v) => marker.value(v),
            ThreadOutcome::Killed => {}
        }
    }
}

impl Traceable for Thread {
    fn trace(&self, marker: &mut Marker) {
        for state in &self.stack {
            state.trace(marker);
        }
        if let Some(outcome) = &self.outcome {
            outcome.trace(marker);
        }
    }
}
