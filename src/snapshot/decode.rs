//! Snapshot decoder
//!
//! Decoding runs in two passes over the records. The first allocates an
//! empty slot for every object and scope (and loads every program) so that
//! references can be resolved in any order; the second fills the slots in.
//! Everything is built into a fresh [`Heap`], so a failed restore leaves
//! the interpreter untouched.

use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::ast::{NodeId, NodeRef, Program, ProgramId};
use crate::error::JsError;
use crate::gc::Heap;
use crate::interpreter::scheduler::RunStatus;
use crate::interpreter::scope::{Scope, ScopeKind};
use crate::interpreter::state::{
    CallInfo, CallPhase, Completion, CompletionKind, NativeFrame, Reference, State, StateInfo,
    TryPhase,
};
use crate::interpreter::thread::{Thread, ThreadId, ThreadOutcome, ThreadStatus};
use crate::interpreter::Interpreter;
use crate::value::{
    JsFunction, JsObject, JsString, JsValue, ObjectClass, ObjectId, Owner, Property, PropertyMap,
    ScopeId,
};

use super::{as_reference, FORMAT_VERSION};

/// What a record index was allocated as in the first pass
#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Object(ObjectId),
    Scope(ScopeId),
    Program(ProgramId),
    Thread,
}

/// A decoded runtime, ready to replace the interpreter's
pub(super) struct Image {
    heap: Heap,
    clock: f64,
    global_scope: ScopeId,
    root_owner: Owner,
    builtins: PropertyMap<JsValue>,
    pub(super) threads: BTreeMap<ThreadId, Thread>,
    next_thread_id: u64,
    next_queued: u64,
    pending_resolvers: BTreeMap<u64, ThreadId>,
    next_resolver_id: u64,
    status: RunStatus,
}

impl Image {
    pub(super) fn install(self, interp: &mut Interpreter) {
        interp.heap = self.heap;
        interp.host_values = interp.heap.create_guard();
        interp.global_scope = self.global_scope;
        interp.root_owner = self.root_owner;
        interp.builtins = self.builtins;
        interp.threads = self.threads;
        interp.next_thread_id = self.next_thread_id;
        interp.current_thread = None;
        interp.last_stepped = None;
        interp.early_settlements.clear();
        interp.next_queued = self.next_queued;
        interp.pending_resolvers = self.pending_resolvers;
        interp.next_resolver_id = self.next_resolver_id;
        interp.status = self.status;
        interp.set_clock(self.clock);
    }
}

pub(super) struct Decoder<'a> {
    interp: &'a Interpreter,
    records: &'a [Value],
    slots: Vec<Slot>,
    heap: Heap,
}

impl<'a> Decoder<'a> {
    pub(super) fn new(interp: &'a Interpreter, snapshot: &'a Value) -> Result<Self, JsError> {
        let records = snapshot
            .as_array()
            .ok_or_else(|| JsError::snapshot("snapshot must be an array of records"))?;
        let root = records
            .first()
            .ok_or_else(|| JsError::snapshot("snapshot has no interpreter record"))?;
        if tag(root)? != "Interpreter" {
            return Err(JsError::snapshot("record 0 is not the interpreter"));
        }
        let version = field(root, "version")?.as_u64();
        if version != Some(FORMAT_VERSION) {
            return Err(JsError::snapshot(format!(
                "unsupported snapshot version {:?}, expected {}",
                version, FORMAT_VERSION
            )));
        }
        Ok(Self {
            interp,
            records,
            slots: Vec::with_capacity(records.len()),
            heap: Heap::new(interp.config.gc_threshold),
        })
    }

    pub(super) fn decode(mut self) -> Result<Image, JsError> {
        self.allocate()?;
        let records = self.records;
        for (index, record) in records.iter().enumerate() {
            match self.slots.get(index).copied() {
                Some(Slot::Object(id)) => {
                    let object = self.object(record)?;
                    *self.heap.object_mut(id)? = object;
                }
                Some(Slot::Scope(id)) => {
                    let scope = self.scope(record)?;
                    *self.heap.scope_mut(id)? = scope;
                }
                _ => {}
            }
        }
        self.interpreter()
    }

    /// First pass: an empty slot per object and scope, programs loaded whole
    fn allocate(&mut self) -> Result<(), JsError> {
        let records = self.records;
        for (index, record) in records.iter().enumerate() {
            let slot = match tag(record)? {
                "Interpreter" if index == 0 => Slot::Root,
                "Object" => Slot::Object(
                    self.heap
                        .alloc_object(JsObject::new(ObjectClass::Object, None, None)),
                ),
                "Scope" => Slot::Scope(self.heap.alloc_scope(Scope::new(
                    ScopeKind::Global,
                    None,
                    None,
                    JsValue::Undefined,
                ))),
                "Program" => {
                    let program: Program = serde_json::from_value(field(record, "program")?.clone())?;
                    Slot::Program(self.heap.add_program(Rc::new(program)))
                }
                "Thread" => Slot::Thread,
                other => {
                    return Err(JsError::snapshot(format!(
                        "unknown record type '{}' at {}",
                        other, index
                    )));
                }
            };
            self.slots.push(slot);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // References and values
    // ═══════════════════════════════════════════════════════════════

    fn slot(&self, value: &Value) -> Result<(usize, Slot), JsError> {
        let index = as_reference(value)
            .ok_or_else(|| JsError::snapshot(format!("expected a reference, found {}", value)))?;
        let slot = self
            .slots
            .get(index)
            .copied()
            .ok_or_else(|| JsError::snapshot(format!("dangling reference #{}", index)))?;
        Ok((index, slot))
    }

    fn object_ref(&self, value: &Value) -> Result<ObjectId, JsError> {
        match self.slot(value)? {
            (_, Slot::Object(id)) => Ok(id),
            (index, _) => Err(JsError::snapshot(format!("record {} is not an object", index))),
        }
    }

    fn scope_ref(&self, value: &Value) -> Result<ScopeId, JsError> {
        match self.slot(value)? {
            (_, Slot::Scope(id)) => Ok(id),
            (index, _) => Err(JsError::snapshot(format!("record {} is not a scope", index))),
        }
    }

    fn program_ref(&self, value: &Value) -> Result<ProgramId, JsError> {
        match self.slot(value)? {
            (_, Slot::Program(id)) => Ok(id),
            (index, _) => Err(JsError::snapshot(format!("record {} is not a program", index))),
        }
    }

    /// `{"program": ref, "node": n}`, checked against the loaded program
    fn node_ref(&self, value: &Value) -> Result<NodeRef, JsError> {
        let program = self.program_ref(field(value, "program")?)?;
        let node = NodeId(u32_field(value, "node")?);
        if self.heap.program(program)?.node(node).is_err() {
            return Err(JsError::snapshot(format!(
                "node {} out of range in program #{}",
                node.0, program.0
            )));
        }
        Ok(NodeRef { program, node })
    }

    fn optional_object(&self, value: &Value) -> Result<Option<ObjectId>, JsError> {
        if value.is_null() {
            Ok(None)
        } else {
            self.object_ref(value).map(Some)
        }
    }

    fn optional_scope(&self, value: &Value) -> Result<Option<ScopeId>, JsError> {
        if value.is_null() {
            Ok(None)
        } else {
            self.scope_ref(value).map(Some)
        }
    }

    fn owner(&self, value: &Value) -> Result<Option<Owner>, JsError> {
        Ok(self.optional_object(value)?.map(Owner))
    }

    fn value(&self, value: &Value) -> Result<JsValue, JsError> {
        Ok(match value {
            Value::Null => JsValue::Null,
            Value::Bool(b) => JsValue::Boolean(*b),
            Value::Number(_) => JsValue::Number(number(value)?),
            Value::String(s) => JsValue::from(s.as_str()),
            Value::Object(map) if map.contains_key("Number") => JsValue::Number(number(value)?),
            Value::Object(map) if map.get("Value").and_then(Value::as_str) == Some("undefined") => {
                JsValue::Undefined
            }
            Value::Object(_) => JsValue::Object(self.object_ref(value)?),
            Value::Array(_) => {
                return Err(JsError::snapshot(format!("unexpected array value {}", value)));
            }
        })
    }

    fn values(&self, value: &Value) -> Result<Vec<JsValue>, JsError> {
        array(value)?.iter().map(|v| self.value(v)).collect()
    }

    // ═══════════════════════════════════════════════════════════════
    // Records
    // ═══════════════════════════════════════════════════════════════

    fn object(&self, record: &Value) -> Result<JsObject, JsError> {
        let class_name = string(field(record, "class")?)?;
        let class = ObjectClass::from_name(&class_name)
            .ok_or_else(|| JsError::snapshot(format!("unknown object class '{}'", class_name)))?;
        let mut object = JsObject::new(
            class,
            self.optional_object(field(record, "proto")?)?,
            self.owner(field(record, "owner")?)?,
        );
        object.extensible = record
            .get("isExtensible")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let flagged = |name: &str| -> Result<FxHashSet<JsString>, JsError> {
            match record.get(name) {
                Some(keys) => array(keys)?.iter().map(string).collect(),
                None => Ok(FxHashSet::default()),
            }
        };
        let non_writable = flagged("nonWritable")?;
        let non_enumerable = flagged("nonEnumerable")?;
        let non_configurable = flagged("nonConfigurable")?;
        if let Some(props) = record.get("props") {
            for (key, value) in map(props)? {
                let key = JsString::from(key.as_str());
                let prop = Property::with_flags(
                    self.value(value)?,
                    !non_writable.contains(&key),
                    !non_enumerable.contains(&key),
                    !non_configurable.contains(&key),
                );
                object.insert(key, prop);
            }
        }

        if let Some(function) = record.get("function") {
            object.function = Some(self.function(function)?);
        }
        Ok(object)
    }

    fn function(&self, function: &Value) -> Result<JsFunction, JsError> {
        let kind = string(field(function, "kind")?)?;
        Ok(match kind.as_str() {
            "user" => JsFunction::Interpreted {
                func: self.node_ref(function)?,
                scope: self.scope_ref(field(function, "scope")?)?,
            },
            "bound" => JsFunction::Bound {
                target: self.object_ref(field(function, "target")?)?,
                this: self.value(field(function, "this")?)?,
                args: self.values(field(function, "args")?)?,
            },
            "native" => {
                let id = string(field(function, "id")?)?;
                if !self.interp.is_native_registered(&id) {
                    return Err(JsError::snapshot(format!("unknown native '{}'", id)));
                }
                JsFunction::Native { id }
            }
            other => {
                return Err(JsError::snapshot(format!("unknown function kind '{}'", other)));
            }
        })
    }

    fn scope(&self, record: &Value) -> Result<Scope, JsError> {
        let kind_name = string(field(record, "kind")?)?;
        let kind = ScopeKind::from_name(&kind_name)
            .ok_or_else(|| JsError::snapshot(format!("unknown scope kind '{}'", kind_name)))?;
        let mut scope = Scope::new(
            kind,
            self.owner(field(record, "owner")?)?,
            self.optional_scope(field(record, "outer")?)?,
            self.value(field(record, "this")?)?,
        );
        let immutable: FxHashSet<JsString> = array(field(record, "immutable")?)?
            .iter()
            .map(string)
            .collect::<Result<_, _>>()?;
        for (name, value) in map(field(record, "bindings")?)? {
            let name = JsString::from(name.as_str());
            let mutable = !immutable.contains(&name);
            scope.declare(name, self.value(value)?, mutable);
        }
        Ok(scope)
    }

    fn interpreter(self) -> Result<Image, JsError> {
        let root = self
            .records
            .first()
            .ok_or_else(|| JsError::snapshot("snapshot has no interpreter record"))?;

        let mut builtins = PropertyMap::default();
        for (name, value) in map(field(root, "builtins")?)? {
            builtins.insert(JsString::from(name.as_str()), self.value(value)?);
        }

        let mut threads = BTreeMap::new();
        for reference in array(field(root, "threads")?)? {
            let (index, slot) = self.slot(reference)?;
            let record = match (slot, self.records.get(index)) {
                (Slot::Thread, Some(record)) => record,
                _ => return Err(JsError::snapshot(format!("record {} is not a thread", index))),
            };
            let thread = self.thread(record)?;
            threads.insert(thread.id, thread);
        }

        let next_thread_id = u64_value(field(root, "nextThreadId")?)?;
        let next_resolver_id = u64_value(field(root, "nextResolverId")?)?;
        let mut pending_resolvers = BTreeMap::new();
        for entry in array(field(root, "pendingResolvers")?)? {
            let [id, thread] = array(entry)?.as_slice() else {
                return Err(JsError::snapshot("malformed pending resolver"));
            };
            let (id, thread) = (u64_value(id)?, u64_value(thread)?);
            // A resolver may outlive its killed thread, never precede it
            if thread >= next_thread_id || id >= next_resolver_id {
                return Err(JsError::snapshot(format!(
                    "resolver {} for thread {} was never issued",
                    id, thread
                )));
            }
            pending_resolvers.insert(id, ThreadId(thread));
        }

        let status_name = string(field(root, "status")?)?;
        let status = RunStatus::from_name(&status_name)
            .ok_or_else(|| JsError::snapshot(format!("unknown run status '{}'", status_name)))?;

        Ok(Image {
            clock: number(field(root, "clock")?)?,
            global_scope: self.scope_ref(field(root, "globalScope")?)?,
            root_owner: Owner(self.object_ref(field(root, "rootOwner")?)?),
            builtins,
            threads,
            next_thread_id,
            next_queued: u64_value(field(root, "nextQueued")?)?,
            pending_resolvers,
            next_resolver_id,
            status,
            heap: self.heap,
        })
    }

    fn thread(&self, record: &Value) -> Result<Thread, JsError> {
        let id = ThreadId(u64_value(field(record, "id")?)?);
        let status_name = string(field(record, "status")?)?;
        let status = ThreadStatus::from_name(&status_name)
            .ok_or_else(|| JsError::snapshot(format!("unknown thread status '{}'", status_name)))?;
        let time_limit = match field(record, "timeLimit")? {
            Value::Null => None,
            limit => Some(number(limit)?),
        };
        let run_at = number(field(record, "runAt")?)?;

        let mut thread = Thread::new(id, run_at, time_limit);
        thread.status = status;
        thread.queued = u64_value(field(record, "queued")?)?;
        thread.keep_outcome = bool_field(record, "keepOutcome")?;
        thread.outcome = match field(record, "outcome")? {
            Value::Null => None,
            outcome => Some(self.outcome(outcome)?),
        };
        thread.stack = array(field(record, "stack")?)?
            .iter()
            .map(|state| self.state(state))
            .collect::<Result<_, _>>()?;
        Ok(thread)
    }

    fn outcome(&self, outcome: &Value) -> Result<ThreadOutcome, JsError> {
        let kind = string(field(outcome, "kind")?)?;
        Ok(match kind.as_str() {
            "completed" => ThreadOutcome::Completed(self.value(field(outcome, "value")?)?),
            "threw" => ThreadOutcome::Threw(self.value(field(outcome, "value")?)?),
            "killed" => ThreadOutcome::Killed,
            other => return Err(JsError::snapshot(format!("unknown outcome '{}'", other))),
        })
    }

    fn state(&self, record: &Value) -> Result<State, JsError> {
        let scope = self.scope_ref(field(record, "scope")?)?;
        let mut state = match field(record, "node")? {
            Value::Null => State::call(
                scope,
                CallInfo::new(JsValue::Undefined, JsValue::Undefined, Vec::new(), false),
            ),
            node => State::new(self.node_ref(node)?, scope),
        };
        state.step = u32_field(record, "step")?;
        state.want_ref = bool_field(record, "wantRef")?;
        state.value = self.value(field(record, "value")?)?;
        state.reference = match field(record, "ref")? {
            Value::Null => None,
            reference => Some(self.reference(reference)?),
        };
        state.labels = array(field(record, "labels")?)?
            .iter()
            .map(string)
            .collect::<Result<_, _>>()?;
        state.is_loop = bool_field(record, "isLoop")?;
        state.is_switch = bool_field(record, "isSwitch")?;
        state.info = self.info(field(record, "info")?)?;
        Ok(state)
    }

    fn reference(&self, reference: &Value) -> Result<Reference, JsError> {
        let kind = string(field(reference, "kind")?)?;
        Ok(match kind.as_str() {
            "binding" => Reference::Binding {
                scope: self.optional_scope(field(reference, "scope")?)?,
                name: string(field(reference, "name")?)?,
            },
            "property" => Reference::Property {
                base: self.value(field(reference, "base")?)?,
                key: string(field(reference, "key")?)?,
            },
            other => return Err(JsError::snapshot(format!("unknown reference kind '{}'", other))),
        })
    }

    fn info(&self, info: &Value) -> Result<StateInfo, JsError> {
        let kind = string(field(info, "kind")?)?;
        Ok(match kind.as_str() {
            "none" => StateInfo::None,
            "operands" => StateInfo::Operands(self.values(field(info, "values")?)?),
            "call" => {
                let phase_name = string(field(info, "phase")?)?;
                let phase = CallPhase::from_name(&phase_name)
                    .ok_or_else(|| JsError::snapshot(format!("unknown call phase '{}'", phase_name)))?;
                StateInfo::Call(Box::new(CallInfo {
                    func: self.value(field(info, "func")?)?,
                    this: self.value(field(info, "this")?)?,
                    args: self.values(field(info, "args")?)?,
                    phase,
                    construct: bool_field(info, "construct")?,
                    native: NativeFrame {
                        phase: u32_field(info, "nativePhase")?,
                        scratch: self.values(field(info, "scratch")?)?,
                    },
                    new_object: self.optional_object(field(info, "newObject")?)?,
                }))
            }
            "try" => {
                let phase_name = string(field(info, "phase")?)?;
                let phase = TryPhase::from_name(&phase_name)
                    .ok_or_else(|| JsError::snapshot(format!("unknown try phase '{}'", phase_name)))?;
                let completion = match field(info, "completion")? {
                    Value::Null => None,
                    completion => Some(self.completion(completion)?),
                };
                StateInfo::Try { phase, completion }
            }
            "switch" => StateInfo::Switch {
                discriminant: self.value(field(info, "discriminant")?)?,
                case: usize_field(info, "case")?,
                statement: usize_field(info, "statement")?,
                matched: bool_field(info, "matched")?,
            },
            "forIn" => StateInfo::ForIn {
                keys: array(field(info, "keys")?)?
                    .iter()
                    .map(string)
                    .collect::<Result<_, _>>()?,
                index: usize_field(info, "index")?,
                object: self.value(field(info, "object")?)?,
            },
            "object" => StateInfo::Object(self.object_ref(field(info, "object")?)?),
            "program" => StateInfo::Program {
                completion: self.value(field(info, "completion")?)?,
            },
            other => return Err(JsError::snapshot(format!("unknown state info '{}'", other))),
        })
    }

    fn completion(&self, completion: &Value) -> Result<Completion, JsError> {
        let kind_name = string(field(completion, "kind")?)?;
        let kind = CompletionKind::from_name(&kind_name)
            .ok_or_else(|| JsError::snapshot(format!("unknown completion '{}'", kind_name)))?;
        let label = match field(completion, "label")? {
            Value::Null => None,
            label => Some(string(label)?),
        };
        Ok(Completion {
            kind,
            value: self.value(field(completion, "value")?)?,
            label,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Field access
// ═══════════════════════════════════════════════════════════════════════════

fn field<'v>(record: &'v Value, name: &str) -> Result<&'v Value, JsError> {
    record
        .get(name)
        .ok_or_else(|| JsError::snapshot(format!("record is missing '{}'", name)))
}

fn tag(record: &Value) -> Result<&str, JsError> {
    field(record, "type")?
        .as_str()
        .ok_or_else(|| JsError::snapshot("record type must be a string"))
}

fn array(value: &Value) -> Result<&Vec<Value>, JsError> {
    value
        .as_array()
        .ok_or_else(|| JsError::snapshot(format!("expected an array, found {}", value)))
}

fn map(value: &Value) -> Result<&Map<String, Value>, JsError> {
    value
        .as_object()
        .ok_or_else(|| JsError::snapshot(format!("expected an object, found {}", value)))
}

fn string(value: &Value) -> Result<JsString, JsError> {
    value
        .as_str()
        .map(JsString::from)
        .ok_or_else(|| JsError::snapshot(format!("expected a string, found {}", value)))
}

fn u64_value(value: &Value) -> Result<u64, JsError> {
    value
        .as_u64()
        .ok_or_else(|| JsError::snapshot(format!("expected an integer, found {}", value)))
}

fn u32_field(record: &Value, name: &str) -> Result<u32, JsError> {
    let n = u64_value(field(record, name)?)?;
    u32::try_from(n).map_err(|_| JsError::snapshot(format!("'{}' out of range", name)))
}

fn usize_field(record: &Value, name: &str) -> Result<usize, JsError> {
    let n = u64_value(field(record, name)?)?;
    usize::try_from(n).map_err(|_| JsError::snapshot(format!("'{}' out of range", name)))
}

fn bool_field(record: &Value, name: &str) -> Result<bool, JsError> {
    field(record, name)?
        .as_bool()
        .ok_or_else(|| JsError::snapshot(format!("'{}' must be a boolean", name)))
}

/// A plain JSON number or a `{"Number": tag}` special value
fn number(value: &Value) -> Result<f64, JsError> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    match value.get("Number").and_then(Value::as_str) {
        Some("NaN") => Ok(f64::NAN),
        Some("Infinity") => Ok(f64::INFINITY),
        Some("-Infinity") => Ok(f64::NEG_INFINITY),
        Some("-0") => Ok(-0.0),
        _ => Err(JsError::snapshot(format!("expected a number, found {}", value))),
    }
}
