//! Native bridge
//!
//! Host functions take part in the state machine through [`NativeResult`]:
//! they either return a value, ask the interpreter to evaluate something and
//! call them again, park the thread on a [`Resolver`], or put it to sleep.
//! Natives are registered under stable string ids; function objects refer to
//! them by id, which is what a snapshot records.

use std::rc::Rc;

use crate::ast::ProgramId;
use crate::error::JsError;
use crate::value::{JsFunction, JsObject, JsString, JsValue, ObjectClass, ObjectId, Owner, Property, ScopeId};

use super::state::{CallPhase, StateInfo};
use super::thread::{ThreadId, ThreadStatus};
use super::Interpreter;

/// Signature of every host function
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &mut NativeCall) -> Result<NativeResult, JsError>>;

/// Wrap a function or closure as a [`NativeFn`]
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&mut Interpreter, &mut NativeCall) -> Result<NativeResult, JsError> + 'static,
{
    Rc::new(f)
}

/// Everything a native sees about its invocation
#[derive(Debug)]
pub struct NativeCall {
    /// The function object being called
    pub func: ObjectId,
    pub this: JsValue,
    pub args: Vec<JsValue>,
    /// Acting Owner of the caller
    pub owner: Option<Owner>,
    /// The caller's scope
    pub scope: ScopeId,
    pub thread: ThreadId,
    pub construct: bool,
    /// Native-defined progress counter, preserved across re-entries
    pub phase: u32,
    /// Native-defined working values, preserved across re-entries
    pub scratch: Vec<JsValue>,
    /// Value of the last requested evaluation
    pub resumed: Option<JsValue>,
}

impl NativeCall {
    pub fn arg(&self, index: usize) -> JsValue {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// The acting Owner; code without one may not touch objects
    pub fn actor(&self) -> Result<Owner, JsError> {
        self.owner
            .ok_or_else(|| JsError::permission_error("No owner for this operation"))
    }

    /// Take the value of the last re-entry
    pub fn take_resumed(&mut self) -> JsValue {
        self.resumed.take().unwrap_or_default()
    }
}

/// Evaluation a native asks for before it is called again
#[derive(Debug, Clone)]
pub enum Continuation {
    Call {
        func: JsValue,
        this: JsValue,
        args: Vec<JsValue>,
    },
    /// Run a loaded program in a fresh `Eval` scope under the global scope
    Eval { program: ProgramId },
}

#[derive(Debug, Clone)]
pub enum NativeResult {
    Value(JsValue),
    Reenter(Continuation),
    /// Park the thread; it resumes through a [`Resolver`] issued by
    /// [`Interpreter::block_thread`]
    Block,
    /// Sleep until the given interpreter time, then return `undefined`
    Sleep { until: f64 },
}

impl From<JsValue> for NativeResult {
    fn from(value: JsValue) -> Self {
        NativeResult::Value(value)
    }
}

/// Shorthand for natives that complete synchronously
pub fn done(value: impl Into<JsValue>) -> Result<NativeResult, JsError> {
    Ok(NativeResult::Value(value.into()))
}

/// Shorthand for re-entering with a call
pub fn reenter_call(func: JsValue, this: JsValue, args: Vec<JsValue>) -> Result<NativeResult, JsError> {
    Ok(NativeResult::Reenter(Continuation::Call { func, this, args }))
}

pub struct NativeEntry {
    pub arity: u32,
    pub call: NativeFn,
    pub construct: Option<NativeFn>,
}

/// Single-use handle that wakes a blocked thread.
///
/// Deliberately not `Clone`: [`Interpreter::resolve`] and
/// [`Interpreter::reject`] consume it.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolver {
    id: u64,
    thread: ThreadId,
}

impl Resolver {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Rebuild a resolver from persisted parts, e.g. after a restore
    pub fn from_raw(id: u64, thread: ThreadId) -> Self {
        Self { id, thread }
    }
}

impl Interpreter {
    /// Register a host function under a stable id.
    ///
    /// The id is the snapshot key for every function object that refers to
    /// it, so it must not change between runs. Re-registering an id replaces
    /// the implementation.
    pub fn register_native(
        &mut self,
        id: impl Into<JsString>,
        arity: u32,
        call: NativeFn,
        construct: Option<NativeFn>,
    ) {
        let id = id.into();
        tracing::debug!(id = %id, arity, "registered native");
        self.natives.insert(
            id,
            NativeEntry {
                arity,
                call,
                construct,
            },
        );
    }

    pub fn is_native_registered(&self, id: &str) -> bool {
        self.natives.contains_key(id)
    }

    /// Create a function object for a registered native
    pub fn create_native_function(&mut self, id: &str, name: &str) -> Result<ObjectId, JsError> {
        let arity = self
            .natives
            .get(id)
            .map(|entry| entry.arity)
            .ok_or_else(|| JsError::host_fault(format!("native '{}' is not registered", id)))?;
        let proto = self.builtin_object("Function.prototype")?;
        let mut object = JsObject::new(ObjectClass::Function, Some(proto), Some(self.root_owner));
        object.function = Some(JsFunction::Native { id: id.into() });
        object.insert("length", Property::frozen(JsValue::from(arity)));
        object.insert("name", Property::frozen(JsValue::from(name)));
        Ok(self.alloc(object))
    }

    /// Register a native and expose it as a global binding
    pub fn define_global_native(
        &mut self,
        name: &str,
        arity: u32,
        call: NativeFn,
    ) -> Result<ObjectId, JsError> {
        self.register_native(name, arity, call, None);
        let func = self.create_native_function(name, name)?;
        self.global_set(name, JsValue::Object(func))?;
        Ok(func)
    }

    /// Issue the resolver for a thread about to return [`NativeResult::Block`]
    pub fn block_thread(&mut self, thread: ThreadId) -> Resolver {
        let id = self.next_resolver_id;
        self.next_resolver_id += 1;
        self.pending_resolvers.insert(id, thread);
        tracing::debug!(thread = %thread, resolver = id, "resolver issued");
        Resolver { id, thread }
    }

    /// Wake the blocked thread with a value
    pub fn resolve(&mut self, resolver: Resolver, value: JsValue) -> Result<(), JsError> {
        self.settle(resolver, Ok(value))
    }

    /// Wake the blocked thread with a throw
    pub fn reject(&mut self, resolver: Resolver, reason: JsValue) -> Result<(), JsError> {
        self.settle(resolver, Err(reason))
    }

    /// Ids and threads of resolvers not yet settled
    pub fn pending_resolvers(&self) -> Vec<(u64, ThreadId)> {
        self.pending_resolvers
            .iter()
            .map(|(id, thread)| (*id, *thread))
            .collect()
    }

    fn settle(&mut self, resolver: Resolver, outcome: Result<JsValue, JsValue>) -> Result<(), JsError> {
        let thread_id = self.pending_resolvers.remove(&resolver.id).ok_or_else(|| {
            JsError::host_fault(format!("resolver {} was already settled", resolver.id))
        })?;
        if thread_id != resolver.thread {
            return Err(JsError::host_fault(format!(
                "resolver {} belongs to thread {}, not {}",
                resolver.id, thread_id, resolver.thread
            )));
        }

        let now = self.now();
        let queued = self.take_queue_position();
        let Some(thread) = self.threads.get_mut(&thread_id) else {
            // Thread was killed and collected while blocked
            return Ok(());
        };
        match thread.status {
            ThreadStatus::Zombie => return Ok(()),
            ThreadStatus::Blocked => {}
            ThreadStatus::Ready if self.current_thread == Some(thread_id) => {
                // Settled from inside the native that is about to block
                self.early_settlements.insert(thread_id, outcome);
                tracing::debug!(thread = %thread_id, resolver = resolver.id, "resolver settled before blocking");
                return Ok(());
            }
            status => {
                return Err(JsError::host_fault(format!(
                    "resolver {} settled while thread {} is {}",
                    resolver.id,
                    thread_id,
                    status.name()
                )));
            }
        }

        let state = thread
            .stack
            .last_mut()
            .ok_or_else(|| JsError::host_fault("blocked thread has an empty stack"))?;
        let StateInfo::Call(call) = &mut state.info else {
            return Err(JsError::host_fault("blocked thread is not parked in a call"));
        };
        if call.phase != CallPhase::Blocked {
            return Err(JsError::host_fault("blocked thread's call frame is not blocked"));
        }
        match outcome {
            Ok(value) => {
                call.phase = CallPhase::Returned;
                state.value = value;
            }
            Err(reason) => {
                call.phase = CallPhase::Rejected;
                state.value = reason;
            }
        }
        thread.status = ThreadStatus::Ready;
        thread.run_at = now;
        thread.run_started = now;
        thread.queued = queued;
        tracing::debug!(thread = %thread_id, resolver = resolver.id, "thread unblocked");
        Ok(())
    }
}
