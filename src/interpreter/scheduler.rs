//! Cooperative scheduler
//!
//! Threads run one at a time and only yield at well-defined points: when they
//! finish, sleep, block on a native, or when the host pauses the interpreter.
//! Among runnable threads the one due earliest goes next, then the one queued
//! first, then the lowest thread id, so a run is deterministic given the clock.

use crate::error::JsError;
use crate::platform::ConsoleLevel;
use crate::value::{JsValue, ScopeId};

use super::state::{Completion, Step};
use super::thread::{Thread, ThreadId, ThreadOutcome, ThreadStatus};
use super::Interpreter;

/// Whether the scheduler may pick threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Paused,
    Stopped,
}

impl RunStatus {
    pub fn name(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Stopped => "stopped",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "running" => Some(RunStatus::Running),
            "paused" => Some(RunStatus::Paused),
            "stopped" => Some(RunStatus::Stopped),
            _ => None,
        }
    }
}

/// Why [`Interpreter::run_to_quiescence`] returned
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunResult {
    /// Nothing is runnable now; a sleeping thread wakes at this time
    MoreWorkAt(f64),
    /// Only blocked threads remain; a resolver must wake one
    BlockedForever,
    /// No live threads remain
    Done,
    Paused,
}

enum Pick {
    Run(ThreadId),
    WaitUntil(f64),
    Blocked,
    Idle,
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Host control
    // ═══════════════════════════════════════════════════════════════════════

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Stop picking threads after the current step
    pub fn pause(&mut self) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Paused;
            tracing::debug!("interpreter paused");
        }
    }

    pub fn resume(&mut self) {
        if self.status == RunStatus::Paused {
            self.status = RunStatus::Running;
            tracing::debug!("interpreter resumed");
        }
    }

    /// Kill every thread. A stopped interpreter stays stopped.
    pub fn stop(&mut self) {
        let live: Vec<ThreadId> = self
            .threads
            .values()
            .filter(|t| !t.is_zombie())
            .map(|t| t.id)
            .collect();
        for id in live {
            self.kill_thread(id);
        }
        self.status = RunStatus::Stopped;
        tracing::info!("interpreter stopped");
    }

    /// Finish a thread without running its pending finalizers. Returns
    /// whether a live thread was killed.
    pub fn kill_thread(&mut self, thread: ThreadId) -> bool {
        match self.threads.get_mut(&thread) {
            Some(t) if !t.is_zombie() => {
                t.finish(ThreadOutcome::Killed);
                tracing::debug!(thread = %thread, "thread killed");
                true
            }
            _ => false,
        }
    }

    pub fn set_time_limit(&mut self, thread: ThreadId, limit: Option<f64>) -> Result<(), JsError> {
        self.thread_mut(thread)?.time_limit = limit.filter(|l| l.is_finite() && *l >= 0.0);
        Ok(())
    }

    pub fn time_limit(&self, thread: ThreadId) -> Option<f64> {
        self.threads.get(&thread).and_then(|t| t.time_limit)
    }

    /// Thread currently being stepped
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current_thread
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scheduling
    // ═══════════════════════════════════════════════════════════════════════

    fn schedule(&mut self) -> Pick {
        let now = self.now();
        for thread in self.threads.values_mut() {
            if thread.status == ThreadStatus::Sleeping && thread.run_at <= now {
                thread.status = ThreadStatus::Ready;
                // Time spent asleep is not charged to the next run
                thread.run_started = now;
            }
        }
        let ready = self
            .threads
            .values()
            .filter(|t| t.status == ThreadStatus::Ready)
            .min_by(|a, b| {
                a.run_at
                    .total_cmp(&b.run_at)
                    .then(a.queued.cmp(&b.queued))
                    .then(a.id.cmp(&b.id))
            });
        if let Some(thread) = ready {
            return Pick::Run(thread.id);
        }
        let wake = self
            .threads
            .values()
            .filter(|t| t.status == ThreadStatus::Sleeping)
            .map(|t| t.run_at)
            .min_by(f64::total_cmp);
        match wake {
            Some(at) => Pick::WaitUntil(at),
            None if self
                .threads
                .values()
                .any(|t| t.status == ThreadStatus::Blocked) =>
            {
                Pick::Blocked
            }
            None => Pick::Idle,
        }
    }

    /// Run threads until none is runnable right now
    pub fn run_to_quiescence(&mut self) -> Result<RunResult, JsError> {
        loop {
            match self.status {
                RunStatus::Paused => return Ok(RunResult::Paused),
                RunStatus::Stopped => return Ok(RunResult::Done),
                RunStatus::Running => {}
            }
            match self.schedule() {
                Pick::Run(thread) => self.run_thread(thread)?,
                Pick::WaitUntil(at) => return Ok(RunResult::MoreWorkAt(at)),
                Pick::Blocked => return Ok(RunResult::BlockedForever),
                Pick::Idle => return Ok(RunResult::Done),
            }
        }
    }

    /// Execute a single step of the next runnable thread. Returns `false`
    /// when nothing was runnable.
    pub fn step_once(&mut self) -> Result<bool, JsError> {
        if self.status != RunStatus::Running {
            return Ok(false);
        }
        let Pick::Run(thread) = self.schedule() else {
            return Ok(false);
        };
        if self.last_stepped != Some(thread) {
            let now = self.now();
            self.thread_mut(thread)?.run_started = now;
            self.last_stepped = Some(thread);
        }
        self.current_thread = Some(thread);
        let result = self.step_thread(thread);
        self.current_thread = None;
        self.maybe_collect_garbage();
        result.map(|_| true)
    }

    /// Step `thread` until it finishes or stops being runnable
    fn run_thread(&mut self, thread: ThreadId) -> Result<(), JsError> {
        let now = self.now();
        self.thread_mut(thread)?.run_started = now;
        self.last_stepped = Some(thread);
        self.current_thread = Some(thread);
        tracing::trace!(thread = %thread, "thread running");
        let result = loop {
            if self.status != RunStatus::Running {
                break Ok(());
            }
            if self.thread_status(thread) != Some(ThreadStatus::Ready) {
                break Ok(());
            }
            if let Err(err) = self.step_thread(thread) {
                break Err(err);
            }
            self.maybe_collect_garbage();
        };
        self.current_thread = None;
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Step loop
    // ═══════════════════════════════════════════════════════════════════════

    fn step_thread(&mut self, thread: ThreadId) -> Result<(), JsError> {
        let Some(mut state) = self.thread_mut(thread)?.stack.pop() else {
            self.finish_thread(thread, ThreadOutcome::Completed(JsValue::Undefined))?;
            return Ok(());
        };
        let result = self.dispatch(thread, &mut state);
        if self.threads.get(&thread).is_none_or(Thread::is_zombie) {
            // Killed from inside the step
            return Ok(());
        }
        let scope = state.scope;
        match result {
            Ok(Step::Push(child)) => {
                let limit = self.config.max_stack_depth;
                let stack = &mut self.thread_mut(thread)?.stack;
                stack.push(state);
                if stack.len() >= limit {
                    let err = JsError::range_error("Maximum call stack size exceeded");
                    return self.raise(thread, scope, err);
                }
                stack.push(child);
                Ok(())
            }
            Ok(Step::Stay | Step::Suspend) => {
                self.thread_mut(thread)?.stack.push(state);
                Ok(())
            }
            Ok(Step::Done(value)) => match self.thread_mut(thread)?.stack.last_mut() {
                Some(parent) => {
                    parent.value = value;
                    Ok(())
                }
                None => self.finish_thread(thread, ThreadOutcome::Completed(value)),
            },
            Ok(Step::Ref(reference)) => match self.thread_mut(thread)?.stack.last_mut() {
                Some(parent) => {
                    parent.reference = Some(reference);
                    Ok(())
                }
                None => self.fault(thread, JsError::host_fault("reference produced at the stack base")),
            },
            Ok(Step::Unwind(completion)) => self.unwind(thread, completion),
            Err(err) => self.raise(thread, scope, err),
        }
    }

    /// Throw `err` into the thread, or kill the thread if it is a host fault
    pub(super) fn raise(&mut self, thread: ThreadId, scope: ScopeId, err: JsError) -> Result<(), JsError> {
        if err.is_host_fault() {
            return self.fault(thread, err);
        }
        match self.error_to_value(err, scope, thread) {
            Ok(value) => self.unwind(thread, Completion::throw(value)),
            Err(fault) => self.fault(thread, fault),
        }
    }

    pub(super) fn fault(&mut self, thread: ThreadId, err: JsError) -> Result<(), JsError> {
        tracing::error!(thread = %thread, error = %err, "host fault, thread killed");
        self.kill_thread(thread);
        Err(err)
    }

    pub(super) fn finish_thread(&mut self, thread: ThreadId, outcome: ThreadOutcome) -> Result<(), JsError> {
        if let ThreadOutcome::Threw(value) = &outcome {
            let message = self.render_error(value);
            let stack = match value.as_object().map(|id| self.lookup(id, "stack")) {
                Some(Ok(Some(prop))) => prop.value.as_str().map(str::to_string),
                _ => None,
            }
            .unwrap_or_else(|| message.clone());
            tracing::error!(target: "unhandled", thread = %thread, message = %message, stack = %stack, "uncaught exception");
            self.console_write(ConsoleLevel::Error, &format!("Uncaught {}", stack));
        }
        let t = self.thread_mut(thread)?;
        tracing::debug!(thread = %thread, outcome = ?outcome, "thread finished");
        t.finish(outcome);
        Ok(())
    }
}
