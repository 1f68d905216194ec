//! Resumable interpreter
//!
//! The interpreter walks the AST one step at a time. Every partially evaluated
//! construct is a [`State`] on an explicit per-thread stack, so between any two
//! steps the whole continuation of every thread is plain data: it can be
//! paused, inspected, snapshotted and restored.
//!
//! All runtime state hangs off one [`Interpreter`] value: the heap, the global
//! scope, the builtins table, the thread table and the logical clock. Host
//! services (time, console, randomness) are reached through the providers in
//! [`crate::platform`].

pub mod builtins;
pub mod call;
pub mod native;
pub mod object;
pub mod operators;
pub mod permission;
pub mod scheduler;
pub mod scope;
pub mod state;
mod step;
mod step_expr;
pub mod thread;
mod unwind;

use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{NodeRef, ProgramId};
use crate::config::InterpreterConfig;
use crate::error::{ErrorKind, JsError};
use crate::gc::{GcStats, Guard, Heap, Traceable};
use crate::platform::{
    ConsoleLevel, ConsoleProvider, RandomProvider, StdRandomProvider, StdTimeProvider, TimeProvider,
    TracingConsole,
};
use crate::value::{JsObject, JsString, JsValue, ObjectClass, ObjectId, Owner, PropertyMap, ScopeId};

use native::{NativeEntry, NativeFn};
use operators::to_js_string;
use permission::AuthorizationPolicy;
use scope::{Scope, ScopeKind};
use state::{CallInfo, State};
use thread::{Thread, ThreadId, ThreadOutcome, ThreadStatus};

pub use scheduler::{RunResult, RunStatus};

/// The interpreter state
pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) global_scope: ScopeId,
    /// Owner of every builtin and of code the host runs directly
    pub(crate) root_owner: Owner,
    /// Builtin objects by name (`"Object.prototype"`, `"ToPrimitive"`, ...)
    pub(crate) builtins: PropertyMap<JsValue>,
    /// Results handed to the host by `eval` and `take_thread_result`
    pub(crate) host_values: Guard,

    // ═══════════════════════════════════════════════════════════════
    // Threads and scheduling
    // ═══════════════════════════════════════════════════════════════
    pub(crate) threads: BTreeMap<ThreadId, Thread>,
    pub(crate) next_thread_id: u64,
    pub(crate) next_queued: u64,
    pub(crate) current_thread: Option<ThreadId>,
    /// Thread the previous step belonged to; a switch starts a new run
    pub(crate) last_stepped: Option<ThreadId>,
    pub(crate) status: RunStatus,
    /// Resolver id to the thread it wakes
    pub(crate) pending_resolvers: BTreeMap<u64, ThreadId>,
    pub(crate) next_resolver_id: u64,
    /// Settlements made by a native before it returned `Block`; applied
    /// within the same step
    pub(crate) early_settlements: BTreeMap<ThreadId, Result<JsValue, JsValue>>,
    /// Clock offset carried across restores: `now = previous_elapsed + uptime`
    pub(crate) previous_elapsed: f64,
    /// Set once a thread was scheduled against the clock or a snapshot set it
    pub(crate) clock_started: bool,

    // ═══════════════════════════════════════════════════════════════
    // Host configuration (not part of a snapshot)
    // ═══════════════════════════════════════════════════════════════
    pub(crate) natives: FxHashMap<JsString, NativeEntry>,
    pub(crate) config: InterpreterConfig,
    pub(crate) policy: Box<dyn AuthorizationPolicy>,
    time: Box<dyn TimeProvider>,
    random: Box<dyn RandomProvider>,
    console: Box<dyn ConsoleProvider>,
}

impl Interpreter {
    pub fn new() -> Result<Self, JsError> {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Result<Self, JsError> {
        Self::with_time_provider(config, Box::new(StdTimeProvider::new()))
    }

    /// Create an interpreter whose clock starts at zero on `time`
    pub fn with_time_provider(
        config: InterpreterConfig,
        time: Box<dyn TimeProvider>,
    ) -> Result<Self, JsError> {
        let mut heap = Heap::new(config.gc_threshold);
        let (root_owner, global_scope) = Self::bootstrap_roots(&mut heap)?;
        let host_values = heap.create_guard();
        let mut interp = Self {
            heap,
            global_scope,
            root_owner,
            builtins: PropertyMap::default(),
            host_values,
            threads: BTreeMap::new(),
            next_thread_id: 1,
            next_queued: 1,
            current_thread: None,
            last_stepped: None,
            status: RunStatus::Running,
            pending_resolvers: BTreeMap::new(),
            next_resolver_id: 1,
            early_settlements: BTreeMap::new(),
            previous_elapsed: 0.0,
            clock_started: false,
            natives: FxHashMap::default(),
            policy: permission::policy_for(config.policy),
            config,
            time,
            random: Box::new(StdRandomProvider::new()),
            console: Box::new(TracingConsole),
        };
        builtins::init_builtins(&mut interp)?;
        builtins::link_root_owner(&mut interp)?;
        interp.previous_elapsed = -interp.time.uptime_millis();
        tracing::debug!(policy = interp.policy.name(), "interpreter created");
        Ok(interp)
    }

    /// The root owner object and the global scope, which everything else
    /// is created under
    fn bootstrap_roots(heap: &mut Heap) -> Result<(Owner, ScopeId), JsError> {
        let root = heap.alloc_object(JsObject::new(ObjectClass::Object, None, None));
        let root_owner = Owner(root);
        heap.object_mut(root)?.owner = Some(root_owner);
        let global = heap.alloc_scope(Scope::new(
            ScopeKind::Global,
            Some(root_owner),
            None,
            JsValue::Undefined,
        ));
        Ok((root_owner, global))
    }

    // ═══════════════════════════════════════════════════════════════
    // Providers and configuration
    // ═══════════════════════════════════════════════════════════════

    /// Replace the clock. Once threads were scheduled (or a snapshot was
    /// restored) interpreter time keeps running from its current value;
    /// before that it starts at zero on the new clock.
    pub fn set_time_provider(&mut self, time: Box<dyn TimeProvider>) {
        let now = if self.clock_started { self.now() } else { 0.0 };
        self.time = time;
        self.previous_elapsed = now - self.time.uptime_millis();
    }

    pub fn set_console(&mut self, console: Box<dyn ConsoleProvider>) {
        self.console = console;
    }

    pub fn set_random_provider(&mut self, random: Box<dyn RandomProvider>) {
        self.random = random;
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn set_policy(&mut self, policy: Box<dyn AuthorizationPolicy>) {
        self.policy = policy;
    }

    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.config.gc_threshold = threshold;
        self.heap.set_gc_threshold(threshold);
    }

    /// Interpreter time in milliseconds; survives snapshot round trips
    pub fn now(&self) -> f64 {
        self.previous_elapsed + self.time.uptime_millis()
    }

    /// Move the interpreter clock to `at`; used when restoring a snapshot
    pub(crate) fn set_clock(&mut self, at: f64) {
        self.previous_elapsed = at - self.time.uptime_millis();
        self.clock_started = true;
    }

    /// Wall-clock milliseconds since the Unix epoch
    pub fn wall_clock(&self) -> f64 {
        self.time.now_millis()
    }

    /// Block the host until interpreter time `at`
    pub fn wait_until(&self, at: f64) {
        let delay = at - self.now();
        if delay > 0.0 {
            self.time.wait(delay);
        }
    }

    pub(crate) fn random(&mut self) -> f64 {
        self.random.random()
    }

    pub(crate) fn console_write(&self, level: ConsoleLevel, message: &str) {
        self.console.write(level, message);
    }

    pub fn root_owner(&self) -> Owner {
        self.root_owner
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    // ═══════════════════════════════════════════════════════════════
    // Builtins table and globals
    // ═══════════════════════════════════════════════════════════════

    pub fn builtin(&self, name: &str) -> Option<JsValue> {
        self.builtins.get(name).cloned()
    }

    pub fn builtin_object(&self, name: &str) -> Result<ObjectId, JsError> {
        self.builtins
            .get(name)
            .and_then(JsValue::as_object)
            .ok_or_else(|| JsError::host_fault(format!("missing builtin '{}'", name)))
    }

    pub(crate) fn set_builtin(&mut self, name: &str, value: JsValue) {
        self.builtins.insert(JsString::from(name), value);
    }

    pub fn global_get(&self, name: &str) -> Option<JsValue> {
        self.heap
            .scope(self.global_scope)
            .ok()
            .and_then(|scope| scope.bindings.get(name))
            .map(|binding| binding.value.clone())
    }

    /// Assign a global, declaring it if needed
    pub fn global_set(&mut self, name: &str, value: JsValue) -> Result<(), JsError> {
        if self.binds_locally(self.global_scope, name)? {
            self.write_binding(self.global_scope, name, value)
        } else {
            self.declare_mutable(self.global_scope, name, value)
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Programs and threads
    // ═══════════════════════════════════════════════════════════════

    /// Parse and load a program
    pub fn parse(&mut self, source: &str) -> Result<ProgramId, JsError> {
        let program = crate::parser::parse(source)?;
        Ok(self.heap.add_program(Rc::new(program)))
    }

    /// Start a thread running `source` in the global scope as the root owner
    pub fn spawn(&mut self, source: &str) -> Result<ThreadId, JsError> {
        let program = self.parse(source)?;
        self.spawn_program(program)
    }

    pub fn spawn_program(&mut self, program: ProgramId) -> Result<ThreadId, JsError> {
        let root = self.heap.program(program)?.root;
        let base = State::new(
            NodeRef {
                program,
                node: root,
            },
            self.global_scope,
        );
        Ok(self.new_thread(base, 0.0, true))
    }

    /// Start a thread that calls `func` after `delay` milliseconds, as the
    /// root owner
    pub fn spawn_call(
        &mut self,
        func: JsValue,
        this: JsValue,
        args: Vec<JsValue>,
        delay: f64,
    ) -> Result<ThreadId, JsError> {
        self.spawn_call_as(func, this, args, delay, self.root_owner, true)
    }

    pub(crate) fn spawn_call_as(
        &mut self,
        func: JsValue,
        this: JsValue,
        args: Vec<JsValue>,
        delay: f64,
        owner: Owner,
        keep_outcome: bool,
    ) -> Result<ThreadId, JsError> {
        if !self.is_callable(&func) {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.describe(&func)
            )));
        }
        let scope = self.new_scope(
            ScopeKind::Dummy,
            Some(self.global_scope),
            Some(owner),
            Some(JsValue::Undefined),
        )?;
        let base = State::call(scope, CallInfo::new(func, this, args, false));
        Ok(self.new_thread(base, delay, keep_outcome))
    }

    fn new_thread(&mut self, base: State, delay: f64, keep_outcome: bool) -> ThreadId {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;
        let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
        self.clock_started = true;
        let mut thread = Thread::new(id, self.now() + delay, self.config.default_time_limit_ms);
        if delay > 0.0 {
            thread.status = ThreadStatus::Sleeping;
        }
        thread.keep_outcome = keep_outcome;
        thread.queued = self.take_queue_position();
        thread.stack.push(base);
        tracing::debug!(thread = %id, delay, "thread spawned");
        self.threads.insert(id, thread);
        id
    }

    /// Run `source` to completion and return its completion value. Other
    /// threads run too while it is pending; an uncaught throw comes back as
    /// [`JsError::Thrown`].
    pub fn eval(&mut self, source: &str) -> Result<JsValue, JsError> {
        let thread = self.spawn(source)?;
        loop {
            let result = self.run_to_quiescence()?;
            if self.thread_status(thread) == Some(ThreadStatus::Zombie) {
                break;
            }
            match result {
                RunResult::MoreWorkAt(at) => self.wait_until(at),
                RunResult::BlockedForever => {
                    return Err(JsError::error(format!("thread {} is blocked forever", thread)));
                }
                RunResult::Done | RunResult::Paused => {
                    return Err(JsError::error(format!("thread {} did not finish", thread)));
                }
            }
        }
        match self.take_thread_result(thread) {
            Some(ThreadOutcome::Completed(value)) => Ok(value),
            Some(ThreadOutcome::Threw(value)) => Err(JsError::Thrown {
                message: self.render_error(&value),
                value,
            }),
            Some(ThreadOutcome::Killed) | None => {
                Err(JsError::error(format!("thread {} was killed", thread)))
            }
        }
    }

    pub fn thread_status(&self, thread: ThreadId) -> Option<ThreadStatus> {
        self.threads.get(&thread).map(|t| t.status)
    }

    pub fn thread_result(&self, thread: ThreadId) -> Option<&ThreadOutcome> {
        self.threads.get(&thread).and_then(|t| t.outcome.as_ref())
    }

    /// Take a finished thread's outcome and forget the thread. An object in
    /// the outcome stays alive until [`Interpreter::release_host_values`].
    pub fn take_thread_result(&mut self, thread: ThreadId) -> Option<ThreadOutcome> {
        let finished = self.threads.get(&thread).is_some_and(Thread::is_zombie);
        if !finished {
            return None;
        }
        let outcome = self.threads.remove(&thread).and_then(|t| t.outcome);
        if let Some(ThreadOutcome::Completed(value) | ThreadOutcome::Threw(value)) = &outcome {
            self.host_values.guard(value);
        }
        outcome
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.keys().copied().collect()
    }

    /// Next run queue position; a thread that yields goes behind every
    /// thread already waiting for the same time
    pub(crate) fn take_queue_position(&mut self) -> u64 {
        let position = self.next_queued;
        self.next_queued += 1;
        position
    }

    pub(crate) fn thread_mut(&mut self, thread: ThreadId) -> Result<&mut Thread, JsError> {
        self.threads
            .get_mut(&thread)
            .ok_or_else(|| JsError::host_fault(format!("no thread {}", thread)))
    }

    // ═══════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════

    /// Create an Error object of `kind`, with a `stack` rendered from
    /// `thread`'s call frames
    pub fn create_error(
        &mut self,
        kind: ErrorKind,
        message: &str,
        owner: Option<Owner>,
        thread: Option<ThreadId>,
    ) -> Result<ObjectId, JsError> {
        let proto = self.builtin_object(kind.prototype_key())?;
        let mut error = JsObject::new(ObjectClass::Error, Some(proto), owner);
        error.insert("message", crate::value::Property::hidden(JsValue::from(message)));
        let mut stack = if message.is_empty() {
            kind.name().to_string()
        } else {
            format!("{}: {}", kind.name(), message)
        };
        if let Some(thread) = thread {
            stack.push_str(&self.render_stack(thread));
        }
        error.insert("stack", crate::value::Property::hidden(JsValue::from(stack)));
        Ok(self.alloc(error))
    }

    /// Turn an error raised by a step into the value to throw
    pub(crate) fn error_to_value(
        &mut self,
        error: JsError,
        scope: ScopeId,
        thread: ThreadId,
    ) -> Result<JsValue, JsError> {
        let owner = self.scope_owner(scope)?;
        let (kind, message) = match error {
            JsError::Thrown { value, .. } => return Ok(value),
            JsError::User { kind, message } => (kind, message),
            JsError::Syntax { message, location } => {
                (ErrorKind::SyntaxError, format!("{} at {}", message, location))
            }
            fault => return Err(fault),
        };
        self.create_error(kind, &message, owner, Some(thread))
            .map(JsValue::Object)
    }

    /// `Name: message` for Error objects, ToString for primitives
    pub fn render_error(&self, value: &JsValue) -> String {
        let Some(id) = value.as_object() else {
            return to_js_string(value).to_string();
        };
        let field = |key: &str| match self.lookup(id, key) {
            Ok(Some(prop)) => match prop.value {
                JsValue::String(s) => Some(s),
                _ => None,
            },
            _ => None,
        };
        match (field("name"), field("message")) {
            (Some(name), Some(message)) if !message.is_empty() => format!("{}: {}", name, message),
            (Some(name), _) => name.to_string(),
            (None, Some(message)) => message.to_string(),
            (None, None) => self.describe(value),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════

    /// Drop finished threads nobody waits on, then mark and sweep. Objects
    /// pinned by a [`Guard`] are roots too. Returns the number of freed slots.
    pub fn collect_garbage(&mut self) -> usize {
        self.threads
            .retain(|_, thread| !thread.is_zombie() || thread.keep_outcome);
        let global_scope = self.global_scope;
        let root_owner = self.root_owner;
        let builtins = &self.builtins;
        let threads = &self.threads;
        let freed = self.heap.collect(|marker| {
            marker.scope(global_scope);
            marker.owner(Some(root_owner));
            for value in builtins.values() {
                marker.value(value);
            }
            for thread in threads.values() {
                thread.trace(marker);
            }
        });
        tracing::debug!(freed, "garbage collected");
        freed
    }

    /// A root anchor for objects the host holds across steps
    pub fn create_guard(&self) -> Guard {
        self.heap.create_guard()
    }

    /// Unpin every result `eval` and `take_thread_result` handed out
    pub fn release_host_values(&mut self) {
        self.host_values.clear();
    }

    pub(crate) fn maybe_collect_garbage(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Names of registered natives, sorted
    pub fn native_ids(&self) -> Vec<JsString> {
        let mut ids: Vec<JsString> = self.natives.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn native_entry(&self, id: &str) -> Option<(NativeFn, Option<NativeFn>)> {
        self.natives
            .get(id)
            .map(|entry| (entry.call.clone(), entry.construct.clone()))
    }
}
