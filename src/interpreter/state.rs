//! Execution states
//!
//! A [`State`] records how far evaluation of one syntax node has got. A
//! thread's stack of states is its complete continuation: nothing about a
//! running program lives on the Rust call stack between steps.

use crate::ast::NodeRef;
use crate::gc::{Marker, Traceable};
use crate::value::{JsString, JsValue, ObjectId, ScopeId};

/// What a state evaluates to when its parent asked for a reference
#[derive(Debug, Clone)]
pub enum Reference {
    /// An environment reference. `scope` is `None` for an unresolvable name.
    Binding { scope: Option<ScopeId>, name: JsString },
    Property { base: JsValue, key: JsString },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Normal,
    Break,
    Continue,
    Return,
    Throw,
}

impl CompletionKind {
    pub fn name(self) -> &'static str {
        match self {
            CompletionKind::Normal => "normal",
            CompletionKind::Break => "break",
            CompletionKind::Continue => "continue",
            CompletionKind::Return => "return",
            CompletionKind::Throw => "throw",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "normal" => CompletionKind::Normal,
            "break" => CompletionKind::Break,
            "continue" => CompletionKind::Continue,
            "return" => CompletionKind::Return,
            "throw" => CompletionKind::Throw,
            _ => return None,
        })
    }
}

/// The outcome of evaluating a construct abruptly
#[derive(Debug, Clone)]
pub struct Completion {
    pub kind: CompletionKind,
    pub value: JsValue,
    pub label: Option<JsString>,
}

impl Completion {
    pub fn throw(value: JsValue) -> Self {
        Self {
            kind: CompletionKind::Throw,
            value,
            label: None,
        }
    }

    pub fn ret(value: JsValue) -> Self {
        Self {
            kind: CompletionKind::Return,
            value,
            label: None,
        }
    }

    pub fn jump(kind: CompletionKind, label: Option<JsString>) -> Self {
        Self {
            kind,
            value: JsValue::Undefined,
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPhase {
    Block,
    Handler,
    Finalizer,
}

impl TryPhase {
    pub fn name(self) -> &'static str {
        match self {
            TryPhase::Block => "block",
            TryPhase::Handler => "handler",
            TryPhase::Finalizer => "finalizer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "block" => TryPhase::Block,
            "handler" => TryPhase::Handler,
            "finalizer" => TryPhase::Finalizer,
            _ => return None,
        })
    }
}

/// Progress of a call frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Callee and arguments known, nothing run yet
    Ready,
    /// Interpreted body is executing
    Running,
    /// Finished; `State::value` holds the result
    Returned,
    /// A native asked for a child evaluation and waits for its value
    Reentered,
    /// Parked on a resolver
    Blocked,
    /// Resolver rejected; `State::value` holds the reason
    Rejected,
}

impl CallPhase {
    pub fn name(self) -> &'static str {
        match self {
            CallPhase::Ready => "ready",
            CallPhase::Running => "running",
            CallPhase::Returned => "returned",
            CallPhase::Reentered => "reentered",
            CallPhase::Blocked => "blocked",
            CallPhase::Rejected => "rejected",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ready" => CallPhase::Ready,
            "running" => CallPhase::Running,
            "returned" => CallPhase::Returned,
            "reentered" => CallPhase::Reentered,
            "blocked" => CallPhase::Blocked,
            "rejected" => CallPhase::Rejected,
            _ => return None,
        })
    }
}

/// Resumable progress of a native function across re-entries
#[derive(Debug, Clone, Default)]
pub struct NativeFrame {
    pub phase: u32,
    pub scratch: Vec<JsValue>,
}

#[derive(Debug, Clone)]
pub struct CallInfo {
    pub func: JsValue,
    pub this: JsValue,
    pub args: Vec<JsValue>,
    pub phase: CallPhase,
    pub construct: bool,
    pub native: NativeFrame,
    /// The object under construction for `new` on an interpreted function
    pub new_object: Option<ObjectId>,
}

impl CallInfo {
    pub fn new(func: JsValue, this: JsValue, args: Vec<JsValue>, construct: bool) -> Self {
        Self {
            func,
            this,
            args,
            phase: CallPhase::Ready,
            construct,
            native: NativeFrame::default(),
            new_object: None,
        }
    }
}

/// Per-node-type resumable data beyond the step counter
#[derive(Debug, Clone, Default)]
pub enum StateInfo {
    #[default]
    None,
    /// Values evaluated so far (operands, arguments, array elements)
    Operands(Vec<JsValue>),
    Call(Box<CallInfo>),
    Try {
        phase: TryPhase,
        /// Completion to resume once the finalizer is done
        completion: Option<Completion>,
    },
    Switch {
        discriminant: JsValue,
        /// Case being tested or executed
        case: usize,
        /// Statement within the case being executed
        statement: usize,
        matched: bool,
    },
    ForIn {
        keys: Vec<JsString>,
        index: usize,
        object: JsValue,
    },
    Object(ObjectId),
    Program {
        completion: JsValue,
    },
}

/// One frame of in-progress evaluation
#[derive(Debug, Clone)]
pub struct State {
    /// `None` for call frames, which evaluate no syntax
    pub node: Option<NodeRef>,
    pub scope: ScopeId,
    pub step: u32,
    pub want_ref: bool,
    /// Value of the most recently finished child
    pub value: JsValue,
    /// Reference produced by the most recently finished child
    pub reference: Option<Reference>,
    pub labels: Vec<JsString>,
    pub is_loop: bool,
    pub is_switch: bool,
    pub info: StateInfo,
}

impl State {
    pub fn new(node: NodeRef, scope: ScopeId) -> Self {
        Self {
            node: Some(node),
            scope,
            step: 0,
            want_ref: false,
            value: JsValue::Undefined,
            reference: None,
            labels: Vec::new(),
            is_loop: false,
            is_switch: false,
            info: StateInfo::None,
        }
    }

    pub fn call(scope: ScopeId, info: CallInfo) -> Self {
        Self {
            node: None,
            scope,
            step: 0,
            want_ref: false,
            value: JsValue::Undefined,
            reference: None,
            labels: Vec::new(),
            is_loop: false,
            is_switch: false,
            info: StateInfo::Call(Box::new(info)),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self.info, StateInfo::Call(_))
    }

    pub fn push_operand(&mut self, value: JsValue) {
        match &mut self.info {
            StateInfo::Operands(values) => values.push(value),
            _ => self.info = StateInfo::Operands(vec![value]),
        }
    }

    pub fn operand(&self, index: usize) -> JsValue {
        match &self.info {
            StateInfo::Operands(values) => values.get(index).cloned().unwrap_or_default(),
            _ => JsValue::Undefined,
        }
    }

    pub fn set_operand(&mut self, index: usize, value: JsValue) {
        if let StateInfo::Operands(values) = &mut self.info {
            if let Some(slot) = values.get_mut(index) {
                *slot = value;
            }
        }
    }

    pub fn operand_count(&self) -> usize {
        match &self.info {
            StateInfo::Operands(values) => values.len(),
            _ => 0,
        }
    }

    pub fn take_operands(&mut self) -> Vec<JsValue> {
        match std::mem::take(&mut self.info) {
            StateInfo::Operands(values) => values,
            other => {
                self.info = other;
                Vec::new()
            }
        }
    }

    /// Move the most recent child value out
    pub fn take_value(&mut self) -> JsValue {
        std::mem::take(&mut self.value)
    }
}

/// What the dispatcher asks the step loop to do with the current state
#[derive(Debug)]
pub enum Step {
    /// Keep the state and evaluate a child on top of it
    Push(State),
    /// Keep the state and step it again
    Stay,
    /// Pop the state, handing a value to the parent
    Done(JsValue),
    /// Pop the state, handing a reference to the parent
    Ref(Reference),
    /// Pop the state and unwind with an abrupt completion
    Unwind(Completion),
    /// Keep the state; the thread stopped being runnable
    Suspend,
}

impl Traceable for Reference {
    fn trace(&self, marker: &mut Marker) {
        match self {
            Reference::Binding { scope, .. } => {
                if let Some(scope) = scope {
                    marker.scope(*scope);
                }
            }
            Reference::Property { base, .. } => marker.value(base),
        }
    }
}

impl Traceable for Completion {
    fn trace(&self, marker: &mut Marker) {
        marker.value(&self.value);
    }
}

impl Traceable for State {
    fn trace(&self, marker: &mut Marker) {
        if let Some(node) = self.node {
            marker.node(node);
        }
        marker.scope(self.scope);
        marker.value(&self.value);
        if let Some(reference) = &self.reference {
            reference.trace(marker);
        }
        match &self.info {
            StateInfo::None => {}
            StateInfo::Operands(values) => marker.values(values),
            StateInfo::Call(call) => {
                marker.value(&call.func);
                marker.value(&call.this);
                marker.values(&call.args);
                marker.values(&call.native.scratch);
                if let Some(obj) = call.new_object {
                    marker.object(obj);
                }
            }
            StateInfo::Try { completion, .. } => {
                if let Some(c) = completion {
                    c.trace(marker);
                }
            }
            StateInfo::Switch { discriminant, .. } => marker.value(discriminant),
            StateInfo::ForIn { object, .. } => marker.value(object),
            StateInfo::Object(obj) => marker.object(*obj),
            StateInfo::Program { completion } => marker.value(completion),
        }
    }
}
