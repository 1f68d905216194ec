//! Snapshot encoder
//!
//! Walks the runtime breadth-first from the interpreter record. The first
//! time a heap item is referenced it gets the next record index and joins
//! the queue; its record is written when the queue reaches it.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde_json::{json, Map, Value};

use crate::ast::{NodeRef, ProgramId};
use crate::error::JsError;
use crate::interpreter::state::{Completion, Reference, State, StateInfo};
use crate::interpreter::thread::{Thread, ThreadId, ThreadOutcome};
use crate::interpreter::Interpreter;
use crate::value::{JsFunction, JsValue, ObjectId, Owner, ScopeId};

use super::{reference, FORMAT_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Item {
    Object(ObjectId),
    Scope(ScopeId),
    Program(ProgramId),
    Thread(ThreadId),
}

pub(super) struct Encoder<'a> {
    interp: &'a Interpreter,
    records: Vec<Value>,
    index: FxHashMap<Item, usize>,
    queue: VecDeque<(Item, usize)>,
}

impl<'a> Encoder<'a> {
    pub(super) fn new(interp: &'a Interpreter) -> Self {
        Self {
            interp,
            records: Vec::new(),
            index: FxHashMap::default(),
            queue: VecDeque::new(),
        }
    }

    pub(super) fn encode(mut self) -> Result<Vec<Value>, JsError> {
        // Reserve record 0 so everything it references numbers from 1
        self.records.push(Value::Null);
        let root = self.interpreter_record()?;
        if let Some(slot) = self.records.first_mut() {
            *slot = root;
        }
        while let Some((item, index)) = self.queue.pop_front() {
            let record = match item {
                Item::Object(id) => self.object_record(id)?,
                Item::Scope(id) => self.scope_record(id)?,
                Item::Program(id) => self.program_record(id)?,
                Item::Thread(id) => self.thread_record(id)?,
            };
            if let Some(slot) = self.records.get_mut(index) {
                *slot = record;
            }
        }
        Ok(self.records)
    }

    fn refer(&mut self, item: Item) -> Value {
        if let Some(index) = self.index.get(&item) {
            return reference(*index);
        }
        let index = self.records.len();
        self.records.push(Value::Null);
        self.index.insert(item, index);
        self.queue.push_back((item, index));
        reference(index)
    }

    // ═══════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════

    fn value(&mut self, value: &JsValue) -> Value {
        match value {
            JsValue::Undefined => json!({ "Value": "undefined" }),
            JsValue::Null => Value::Null,
            JsValue::Boolean(b) => Value::Bool(*b),
            JsValue::Number(n) => number(*n),
            JsValue::String(s) => Value::String(s.to_string()),
            JsValue::Object(id) => self.refer(Item::Object(*id)),
        }
    }

    fn values(&mut self, values: &[JsValue]) -> Value {
        Value::Array(values.iter().map(|v| self.value(v)).collect())
    }

    fn owner(&mut self, owner: Option<Owner>) -> Value {
        match owner {
            Some(Owner(id)) => self.refer(Item::Object(id)),
            None => Value::Null,
        }
    }

    fn object_ref(&mut self, id: Option<ObjectId>) -> Value {
        match id {
            Some(id) => self.refer(Item::Object(id)),
            None => Value::Null,
        }
    }

    fn scope_ref(&mut self, id: Option<ScopeId>) -> Value {
        match id {
            Some(id) => self.refer(Item::Scope(id)),
            None => Value::Null,
        }
    }

    fn node(&mut self, node: NodeRef) -> Value {
        json!({
            "program": self.refer(Item::Program(node.program)),
            "node": node.node.0,
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Records
    // ═══════════════════════════════════════════════════════════════

    fn interpreter_record(&mut self) -> Result<Value, JsError> {
        let interp = self.interp;
        let global_scope = self.refer(Item::Scope(interp.global_scope));
        let root_owner = self.owner(Some(interp.root_owner));
        let mut builtins = Map::new();
        for (name, value) in &interp.builtins {
            builtins.insert(name.to_string(), self.value(value));
        }
        let threads: Vec<Value> = interp
            .threads
            .keys()
            .map(|id| self.refer(Item::Thread(*id)))
            .collect();
        let resolvers: Vec<Value> = interp
            .pending_resolvers
            .iter()
            .map(|(id, thread)| json!([id, thread.0]))
            .collect();
        Ok(json!({
            "type": "Interpreter",
            "version": FORMAT_VERSION,
            "clock": interp.now(),
            "globalScope": global_scope,
            "builtins": builtins,
            "rootOwner": root_owner,
            "threads": threads,
            "nextThreadId": interp.next_thread_id,
            "nextQueued": interp.next_queued,
            "pendingResolvers": resolvers,
            "nextResolverId": interp.next_resolver_id,
            "status": interp.status.name(),
        }))
    }

    fn object_record(&mut self, id: ObjectId) -> Result<Value, JsError> {
        let interp = self.interp;
        let object = interp.heap.object(id)?;
        let mut record = Map::new();
        record.insert("type".into(), json!("Object"));
        record.insert("class".into(), json!(object.class.name()));
        record.insert("owner".into(), self.owner(object.owner));
        record.insert("proto".into(), self.object_ref(object.prototype));

        let mut props = Map::new();
        let mut non_writable = Vec::new();
        let mut non_enumerable = Vec::new();
        let mut non_configurable = Vec::new();
        for (key, prop) in &object.properties {
            props.insert(key.to_string(), self.value(&prop.value));
            if !prop.writable {
                non_writable.push(json!(key.as_str()));
            }
            if !prop.enumerable {
                non_enumerable.push(json!(key.as_str()));
            }
            if !prop.configurable {
                non_configurable.push(json!(key.as_str()));
            }
        }
        if !props.is_empty() {
            record.insert("props".into(), Value::Object(props));
        }
        for (field, keys) in [
            ("nonWritable", non_writable),
            ("nonEnumerable", non_enumerable),
            ("nonConfigurable", non_configurable),
        ] {
            if !keys.is_empty() {
                record.insert(field.into(), Value::Array(keys));
            }
        }
        if !object.extensible {
            record.insert("isExtensible".into(), Value::Bool(false));
        }

        if let Some(function) = &object.function {
            let function = match function {
                JsFunction::Interpreted { func, scope } => json!({
                    "kind": "user",
                    "program": self.refer(Item::Program(func.program)),
                    "node": func.node.0,
                    "scope": self.refer(Item::Scope(*scope)),
                }),
                JsFunction::Bound { target, this, args } => json!({
                    "kind": "bound",
                    "target": self.refer(Item::Object(*target)),
                    "this": self.value(this),
                    "args": self.values(args),
                }),
                JsFunction::Native { id } => json!({
                    "kind": "native",
                    "id": id.as_str(),
                }),
            };
            record.insert("function".into(), function);
        }
        Ok(Value::Object(record))
    }

    fn scope_record(&mut self, id: ScopeId) -> Result<Value, JsError> {
        let interp = self.interp;
        let scope = interp.heap.scope(id)?;
        let mut bindings = Map::new();
        let mut immutable = Vec::new();
        for (name, binding) in &scope.bindings {
            bindings.insert(name.to_string(), self.value(&binding.value));
            if !binding.mutable {
                immutable.push(json!(name.as_str()));
            }
        }
        Ok(json!({
            "type": "Scope",
            "kind": scope.kind.name(),
            "owner": self.owner(scope.owner),
            "outer": self.scope_ref(scope.outer),
            "this": self.value(&scope.this_value),
            "bindings": bindings,
            "immutable": immutable,
        }))
    }

    fn program_record(&mut self, id: ProgramId) -> Result<Value, JsError> {
        let program = self.interp.heap.program(id)?;
        Ok(json!({
            "type": "Program",
            "program": serde_json::to_value(&*program)?,
        }))
    }

    fn thread_record(&mut self, id: ThreadId) -> Result<Value, JsError> {
        let interp = self.interp;
        let thread: &Thread = interp
            .threads
            .get(&id)
            .ok_or_else(|| JsError::snapshot(format!("no thread {}", id)))?;
        let stack: Vec<Value> = thread.stack.iter().map(|state| self.state(state)).collect();
        let outcome = match &thread.outcome {
            None => Value::Null,
            Some(ThreadOutcome::Completed(value)) => {
                json!({ "kind": "completed", "value": self.value(value) })
            }
            Some(ThreadOutcome::Threw(value)) => {
                json!({ "kind": "threw", "value": self.value(value) })
            }
            Some(ThreadOutcome::Killed) => json!({ "kind": "killed" }),
        };
        Ok(json!({
            "type": "Thread",
            "id": thread.id.0,
            "status": thread.status.name(),
            "runAt": number(thread.run_at),
            "queued": thread.queued,
            "timeLimit": thread.time_limit.map(number),
            "keepOutcome": thread.keep_outcome,
            "outcome": outcome,
            "stack": stack,
        }))
    }

    fn state(&mut self, state: &State) -> Value {
        let node = match state.node {
            Some(node) => self.node(node),
            None => Value::Null,
        };
        let reference = match &state.reference {
            None => Value::Null,
            Some(Reference::Binding { scope, name }) => json!({
                "kind": "binding",
                "scope": self.scope_ref(*scope),
                "name": name.as_str(),
            }),
            Some(Reference::Property { base, key }) => json!({
                "kind": "property",
                "base": self.value(base),
                "key": key.as_str(),
            }),
        };
        let labels: Vec<&str> = state.labels.iter().map(|l| l.as_str()).collect();
        json!({
            "node": node,
            "scope": self.refer(Item::Scope(state.scope)),
            "step": state.step,
            "wantRef": state.want_ref,
            "value": self.value(&state.value),
            "ref": reference,
            "labels": labels,
            "isLoop": state.is_loop,
            "isSwitch": state.is_switch,
            "info": self.info(&state.info),
        })
    }

    fn info(&mut self, info: &StateInfo) -> Value {
        match info {
            StateInfo::None => json!({ "kind": "none" }),
            StateInfo::Operands(values) => json!({
                "kind": "operands",
                "values": self.values(values),
            }),
            StateInfo::Call(call) => json!({
                "kind": "call",
                "func": self.value(&call.func),
                "this": self.value(&call.this),
                "args": self.values(&call.args),
                "phase": call.phase.name(),
                "construct": call.construct,
                "nativePhase": call.native.phase,
                "scratch": self.values(&call.native.scratch),
                "newObject": self.object_ref(call.new_object),
            }),
            StateInfo::Try { phase, completion } => json!({
                "kind": "try",
                "phase": phase.name(),
                "completion": completion.as_ref().map(|c| self.completion(c)),
            }),
            StateInfo::Switch {
                discriminant,
                case,
                statement,
                matched,
            } => json!({
                "kind": "switch",
                "discriminant": self.value(discriminant),
                "case": case,
                "statement": statement,
                "matched": matched,
            }),
            StateInfo::ForIn {
                keys,
                index,
                object,
            } => {
                let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
                json!({
                    "kind": "forIn",
                    "keys": keys,
                    "index": index,
                    "object": self.value(object),
                })
            }
            StateInfo::Object(id) => json!({
                "kind": "object",
                "object": self.refer(Item::Object(*id)),
            }),
            StateInfo::Program { completion } => json!({
                "kind": "program",
                "completion": self.value(completion),
            }),
        }
    }

    fn completion(&mut self, completion: &Completion) -> Value {
        json!({
            "kind": completion.kind.name(),
            "value": self.value(&completion.value),
            "label": completion.label.as_ref().map(|l| l.as_str()),
        })
    }
}

/// Finite numbers other than -0 are plain JSON numbers
fn number(n: f64) -> Value {
    let tag = if n.is_nan() {
        "NaN"
    } else if n == f64::INFINITY {
        "Infinity"
    } else if n == f64::NEG_INFINITY {
        "-Infinity"
    } else if n == 0.0 && n.is_sign_negative() {
        "-0"
    } else {
        return serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    };
    json!({ "Number": tag })
}
