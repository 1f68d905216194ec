//! Function objects and call frames
//!
//! A call is its own state on the thread stack: the expression that makes the
//! call evaluates callee and arguments, then pushes a call frame. The frame
//! dispatches over the three function variants. Interpreted functions push
//! their body; natives run right away and report back through
//! [`NativeResult`].

use crate::ast::{Function, Hoisted, NodeKind, NodeRef, ProgramId};
use crate::error::JsError;
use crate::value::{JsFunction, JsObject, JsString, JsValue, ObjectClass, ObjectId, Owner, Property, ScopeId};

use super::native::{Continuation, NativeCall, NativeResult};
use super::scope::ScopeKind;
use super::state::{CallInfo, CallPhase, State, StateInfo, Step};
use super::thread::{ThreadId, ThreadStatus};
use super::Interpreter;

fn call_info(state: &mut State) -> Result<&mut CallInfo, JsError> {
    match &mut state.info {
        StateInfo::Call(call) => Ok(call),
        _ => Err(JsError::host_fault("call frame without call info")),
    }
}

/// The function literal a closure was created from
fn function_literal(kind: &NodeKind) -> Result<&Function, JsError> {
    match kind {
        NodeKind::FunctionDeclaration(f) | NodeKind::FunctionExpression(f) => Ok(f),
        _ => Err(JsError::host_fault("closure does not point at a function")),
    }
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Function objects
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a closure over `scope` for the function literal at `node`
    pub fn create_closure(
        &mut self,
        node: NodeRef,
        scope: ScopeId,
        owner: Option<Owner>,
    ) -> Result<ObjectId, JsError> {
        let program = self.heap.program(node.program)?;
        let literal = function_literal(program.kind(node.node)?)?;
        let name = literal.name.clone().unwrap_or_else(|| JsString::from(""));
        let arity = literal.params.len() as u32;

        let function_proto = self.builtin_object("Function.prototype")?;
        let mut func = JsObject::new(ObjectClass::Function, Some(function_proto), owner);
        func.function = Some(JsFunction::Interpreted { func: node, scope });
        func.insert("length", Property::frozen(JsValue::from(arity)));
        func.insert("name", Property::frozen(JsValue::String(name)));
        let func = self.alloc(func);

        let proto = self.create_plain_object(owner)?;
        self.object_mut(proto)?
            .insert("constructor", Property::hidden(JsValue::Object(func)));
        self.object_mut(func)?.insert(
            "prototype",
            Property::with_flags(JsValue::Object(proto), true, false, false),
        );
        Ok(func)
    }

    /// Declare hoisted `var`s and function declarations in `scope`
    pub(crate) fn hoist(
        &mut self,
        hoisted: &Hoisted,
        program: ProgramId,
        scope: ScopeId,
    ) -> Result<(), JsError> {
        for name in &hoisted.vars {
            if !self.binds_locally(scope, name)? {
                self.declare_mutable(scope, name, JsValue::Undefined)?;
            }
        }
        let owner = self.scope_owner(scope)?;
        let prog = self.heap.program(program)?;
        for &node in &hoisted.functions {
            let name = function_literal(prog.kind(node)?)?
                .name
                .clone()
                .ok_or_else(|| JsError::host_fault("function declaration without a name"))?;
            let func = self.create_closure(NodeRef { program, node }, scope, owner)?;
            if self.binds_locally(scope, &name)? {
                let target = self
                    .resolve_binding(scope, &name)?
                    .ok_or_else(|| JsError::host_fault("hoisted binding vanished"))?;
                self.write_binding(target, &name, JsValue::Object(func))?;
            } else {
                self.declare_mutable(scope, &name, JsValue::Object(func))?;
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Call frames
    // ═══════════════════════════════════════════════════════════════════════

    /// Raise "ran too long" when the thread's current run exceeded its
    /// budget. The budget restarts so a handler gets a fresh slice.
    pub(crate) fn check_time_limit(&mut self, thread: ThreadId) -> Result<(), JsError> {
        let now = self.now();
        let thread = self.thread_mut(thread)?;
        if let Some(limit) = thread.time_limit {
            if now - thread.run_started > limit {
                thread.run_started = now;
                return Err(JsError::range_error("Thread ran too long"));
            }
        }
        Ok(())
    }

    /// Frame that converts `value` to a primitive via `valueOf`/`toString`
    pub(crate) fn to_primitive_frame(
        &self,
        value: JsValue,
        hint: super::operators::Hint,
        scope: ScopeId,
    ) -> Result<State, JsError> {
        let func = self
            .builtin("ToPrimitive")
            .ok_or_else(|| JsError::host_fault("ToPrimitive is not installed"))?;
        Ok(State::call(
            scope,
            CallInfo::new(func, JsValue::Undefined, vec![value, JsValue::from(hint.as_str())], false),
        ))
    }

    pub(super) fn step_call(&mut self, thread: ThreadId, state: &mut State) -> Result<Step, JsError> {
        let call = call_info(state)?;
        let phase = call.phase;
        match phase {
            CallPhase::Ready => {
                self.check_time_limit(thread)?;
                self.start_call(thread, state)
            }
            CallPhase::Running => {
                // Body fell off its end
                let value = match call.new_object {
                    Some(obj) if call.construct => JsValue::Object(obj),
                    _ => JsValue::Undefined,
                };
                Ok(Step::Done(value))
            }
            CallPhase::Returned => {
                let new_object = call.new_object.filter(|_| call.construct);
                let value = state.take_value();
                match new_object {
                    Some(obj) if !value.is_object() => Ok(Step::Done(JsValue::Object(obj))),
                    _ => Ok(Step::Done(value)),
                }
            }
            CallPhase::Reentered => {
                let resumed = state.take_value();
                self.invoke_native(thread, state, Some(resumed))
            }
            CallPhase::Rejected => Ok(Step::Unwind(super::state::Completion::throw(
                state.take_value(),
            ))),
            CallPhase::Blocked => Ok(Step::Suspend),
        }
    }

    fn start_call(&mut self, thread: ThreadId, state: &mut State) -> Result<Step, JsError> {
        loop {
            let call = call_info(state)?;
            let func_id = match &call.func {
                JsValue::Object(id) if self.object(*id)?.is_callable() => *id,
                other => {
                    return Err(JsError::type_error(format!(
                        "{} is not a function",
                        self.describe(other)
                    )));
                }
            };
            match self.function_of(func_id)? {
                Some(JsFunction::Bound { target, this, args }) => {
                    call.func = JsValue::Object(target);
                    if !call.construct {
                        call.this = this;
                    }
                    let rest = std::mem::take(&mut call.args);
                    call.args = args;
                    call.args.extend(rest);
                }
                Some(JsFunction::Interpreted { func, scope }) => {
                    return self.enter_function(state, func_id, func, scope);
                }
                Some(JsFunction::Native { .. }) => return self.invoke_native(thread, state, None),
                None => {
                    return Err(JsError::type_error("value is not a function"));
                }
            }
        }
    }

    fn enter_function(
        &mut self,
        state: &mut State,
        func_id: ObjectId,
        node: NodeRef,
        closure: ScopeId,
    ) -> Result<Step, JsError> {
        let program = self.heap.program(node.program)?;
        let literal = function_literal(program.kind(node.node)?)?;
        let caller_owner = self.scope_owner(state.scope)?;
        let owner = self.object(func_id)?.owner.or(caller_owner);

        let call = call_info(state)?;
        let construct = call.construct;
        let args = call.args.clone();
        let this = if construct {
            let proto = match self.lookup(func_id, "prototype")?.map(|p| p.value) {
                Some(JsValue::Object(proto)) => proto,
                _ => self.builtin_object("Object.prototype")?,
            };
            let obj = self.create_object(Some(proto), owner);
            call_info(state)?.new_object = Some(obj);
            JsValue::Object(obj)
        } else {
            call.this.clone()
        };

        let scope = self.new_scope(ScopeKind::Function, Some(closure), owner, Some(this))?;
        for (index, param) in literal.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            self.declare_mutable(scope, param, value)?;
        }
        if !self.binds_locally(scope, "arguments")? {
            let arguments = self.create_arguments(&args, owner)?;
            self.declare_immutable(scope, "arguments", JsValue::Object(arguments))?;
        }
        self.hoist(&literal.hoisted, node.program, scope)?;

        call_info(state)?.phase = CallPhase::Running;
        Ok(Step::Push(State::new(
            NodeRef {
                program: node.program,
                node: literal.body,
            },
            scope,
        )))
    }

    fn create_arguments(&mut self, args: &[JsValue], owner: Option<Owner>) -> Result<ObjectId, JsError> {
        let proto = self.builtin_object("Object.prototype")?;
        let mut arguments = JsObject::new(ObjectClass::Arguments, Some(proto), owner);
        for (index, value) in args.iter().enumerate() {
            arguments.insert(index.to_string(), Property::data(value.clone()));
        }
        arguments.insert("length", Property::hidden(JsValue::from(args.len() as u32)));
        Ok(self.alloc(arguments))
    }

    fn invoke_native(
        &mut self,
        thread: ThreadId,
        state: &mut State,
        resumed: Option<JsValue>,
    ) -> Result<Step, JsError> {
        let owner = self.scope_owner(state.scope)?;
        let caller_scope = state.scope;
        let call = call_info(state)?;
        let func_id = call
            .func
            .as_object()
            .ok_or_else(|| JsError::host_fault("native frame without a function"))?;
        let Some(JsFunction::Native { id }) = self.function_of(func_id)? else {
            return Err(JsError::host_fault("native frame calls a non-native"));
        };
        let (call_fn, construct_fn) = self.native_entry(&id).ok_or_else(|| {
            JsError::host_fault(format!("native '{}' is not registered", id))
        })?;
        let callee = if call.construct {
            construct_fn.ok_or_else(|| JsError::type_error(format!("{} is not a constructor", id)))?
        } else {
            call_fn
        };

        let mut native_call = NativeCall {
            func: func_id,
            this: call.this.clone(),
            args: call.args.clone(),
            owner,
            scope: caller_scope,
            thread,
            construct: call.construct,
            phase: call.native.phase,
            scratch: std::mem::take(&mut call.native.scratch),
            resumed,
        };
        let result = callee(self, &mut native_call);

        let early = self.early_settlements.remove(&thread);
        let result = result?;
        if early.is_some() && !matches!(result, NativeResult::Block) {
            return Err(JsError::host_fault(format!(
                "native '{}' settled its resolver without blocking",
                id
            )));
        }
        let call = call_info(state)?;
        call.native.phase = native_call.phase;
        call.native.scratch = native_call.scratch;
        match result {
            NativeResult::Value(value) => Ok(Step::Done(value)),
            NativeResult::Reenter(Continuation::Call { func, this, args }) => {
                call.phase = CallPhase::Reentered;
                Ok(Step::Push(State::call(
                    caller_scope,
                    CallInfo::new(func, this, args, false),
                )))
            }
            NativeResult::Reenter(Continuation::Eval { program }) => {
                call.phase = CallPhase::Reentered;
                let root = self.heap.program(program)?.root;
                let scope = self.new_scope(
                    ScopeKind::Eval,
                    Some(self.global_scope),
                    owner,
                    Some(JsValue::Undefined),
                )?;
                Ok(Step::Push(State::new(NodeRef { program, node: root }, scope)))
            }
            NativeResult::Block => {
                if let Some(outcome) = early {
                    let (phase, value) = match outcome {
                        Ok(value) => (CallPhase::Returned, value),
                        Err(reason) => (CallPhase::Rejected, reason),
                    };
                    call.phase = phase;
                    state.value = value;
                    return Ok(Step::Stay);
                }
                call.phase = CallPhase::Blocked;
                self.thread_mut(thread)?.status = ThreadStatus::Blocked;
                tracing::debug!(thread = %thread, native = %id, "thread blocked");
                Ok(Step::Suspend)
            }
            NativeResult::Sleep { until } => {
                call.phase = CallPhase::Returned;
                state.value = JsValue::Undefined;
                let queued = self.take_queue_position();
                let t = self.thread_mut(thread)?;
                t.status = ThreadStatus::Sleeping;
                t.run_at = until;
                t.queued = queued;
                tracing::debug!(thread = %thread, until, "thread sleeping");
                Ok(Step::Suspend)
            }
        }
    }

    /// `\n    at name (line:column)` for each interpreted frame, innermost
    /// first
    pub(crate) fn render_stack(&self, thread: ThreadId) -> String {
        let Some(thread) = self.threads.get(&thread) else {
            return String::new();
        };
        let mut out = String::new();
        for state in thread.stack.iter().rev() {
            let StateInfo::Call(call) = &state.info else {
                continue;
            };
            if call.phase != CallPhase::Running {
                continue;
            }
            let Some(func_id) = call.func.as_object() else {
                continue;
            };
            let Ok(func) = self.object(func_id) else {
                continue;
            };
            let name = match func.get_own_value("name") {
                JsValue::String(s) if !s.is_empty() => s.to_string(),
                _ => "<anonymous>".to_string(),
            };
            let location = match &func.function {
                Some(JsFunction::Interpreted { func, .. }) => self
                    .heap
                    .program(func.program)
                    .ok()
                    .and_then(|p| p.node(func.node).ok().map(|n| n.span))
                    .map(|span| format!(" ({}:{})", span.line, span.column))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            out.push_str(&format!("\n    at {}{}", name, location));
        }
        out
    }
}
