//! Expression steps
//!
//! Operands are collected in `StateInfo::Operands`, one child per step. Any
//! conversion that can run interpreted code (ToPrimitive calling `valueOf` or
//! `toString`) is a pushed call frame, never a nested Rust call, so a thread
//! can be suspended in the middle of `a + b`.

use crate::ast::{BinaryOp, Literal, MemberProperty, NodeId, NodeKind, NodeRef, Program, UnaryOp, UpdateOp};
use crate::error::JsError;
use crate::number::to_int32;
use crate::value::{JsString, JsValue, Property, ScopeId};

use super::operators::{apply_binary, conversion_hint, to_js_string, to_number, Hint};
use super::scope::ScopeKind;
use super::state::{CallInfo, Reference, State, StateInfo, Step};
use super::step::{push, push_ref};
use super::thread::ThreadId;
use super::Interpreter;

/// Step of a call or `new` expression once the call frame has been pushed
const CALLED: u32 = u32::MAX;

/// Result of combining two operands
enum Combined {
    Value(JsValue),
    Convert(State),
}

impl Interpreter {
    pub(super) fn step_expression(
        &mut self,
        _thread: ThreadId,
        state: &mut State,
        here: NodeRef,
        program: &Program,
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        match program.kind(here.node)? {
            NodeKind::Identifier { name } => {
                if state.want_ref {
                    return Ok(Step::Ref(Reference::Binding {
                        scope: self.resolve_binding(scope, name)?,
                        name: name.clone(),
                    }));
                }
                Ok(Step::Done(self.get_binding(scope, name)?))
            }
            NodeKind::Literal { value } => Ok(Step::Done(match value {
                Literal::Null => JsValue::Null,
                Literal::Boolean(b) => JsValue::Boolean(*b),
                Literal::Number(n) => JsValue::Number(*n),
                Literal::String(s) => JsValue::String(s.clone()),
            })),
            NodeKind::ThisExpression => Ok(Step::Done(self.scope_this(scope)?)),

            NodeKind::ArrayExpression { elements } => self.step_array(state, here, elements),
            NodeKind::ObjectExpression { properties } => {
                let object = match state.info {
                    StateInfo::Object(object) => object,
                    _ => {
                        let owner = self.scope_owner(scope)?;
                        let object = self.create_plain_object(owner)?;
                        state.info = StateInfo::Object(object);
                        object
                    }
                };
                if let Some(init) = (state.step as usize).checked_sub(1).and_then(|i| properties.get(i)) {
                    let value = state.take_value();
                    self.object_mut(object)?
                        .insert(init.key.clone(), Property::data(value));
                }
                match properties.get(state.step as usize) {
                    Some(init) => {
                        state.step += 1;
                        Ok(push(here, init.value, scope))
                    }
                    None => Ok(Step::Done(JsValue::Object(object))),
                }
            }
            NodeKind::FunctionExpression(function) => {
                let owner = self.scope_owner(scope)?;
                match &function.name {
                    Some(name) => {
                        let name_scope =
                            self.new_scope(ScopeKind::FunctionExpressionName, Some(scope), owner, None)?;
                        let func = self.create_closure(here, name_scope, owner)?;
                        self.declare_immutable(name_scope, name, JsValue::Object(func))?;
                        Ok(Step::Done(JsValue::Object(func)))
                    }
                    None => Ok(Step::Done(JsValue::Object(self.create_closure(here, scope, owner)?))),
                }
            }

            NodeKind::UnaryExpression { operator, argument } => {
                self.step_unary(state, here, program, *operator, *argument)
            }
            NodeKind::UpdateExpression {
                operator,
                prefix,
                argument,
            } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push_ref(here, *argument, scope))
                }
                1 => {
                    let reference = state
                        .reference
                        .clone()
                        .ok_or_else(|| JsError::host_fault("update target produced no reference"))?;
                    let old = self.get_value(&reference, scope)?;
                    state.step = 2;
                    if old.is_object() {
                        return Ok(Step::Push(self.to_primitive_frame(old, Hint::Number, scope)?));
                    }
                    state.value = old;
                    Ok(Step::Stay)
                }
                _ => {
                    let old = to_number(&state.take_value());
                    let new = match operator {
                        UpdateOp::Increment => old + 1.0,
                        UpdateOp::Decrement => old - 1.0,
                    };
                    let reference = state
                        .reference
                        .take()
                        .ok_or_else(|| JsError::host_fault("update target produced no reference"))?;
                    self.put_value(&reference, JsValue::Number(new), scope)?;
                    Ok(Step::Done(JsValue::Number(if *prefix { new } else { old })))
                }
            },

            NodeKind::BinaryExpression {
                operator,
                left,
                right,
            } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push(here, *left, scope))
                }
                1 => {
                    let left = state.take_value();
                    state.push_operand(left);
                    state.step = 2;
                    Ok(push(here, *right, scope))
                }
                _ => {
                    if state.step == 2 {
                        let right = state.take_value();
                        state.push_operand(right);
                        state.step = 3;
                    }
                    match self.combine(*operator, state)? {
                        Combined::Value(value) => Ok(Step::Done(value)),
                        Combined::Convert(frame) => Ok(Step::Push(frame)),
                    }
                }
            },
            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push(here, *left, scope))
                }
                1 => {
                    let value = state.take_value();
                    let short_circuit = match operator {
                        crate::ast::LogicalOp::And => !value.to_boolean(),
                        crate::ast::LogicalOp::Or => value.to_boolean(),
                    };
                    if short_circuit {
                        return Ok(Step::Done(value));
                    }
                    state.step = 2;
                    Ok(push(here, *right, scope))
                }
                _ => Ok(Step::Done(state.take_value())),
            },
            NodeKind::AssignmentExpression {
                operator,
                target,
                value,
            } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push_ref(here, *target, scope))
                }
                1 => {
                    if operator.binary_op().is_some() {
                        let reference = state
                            .reference
                            .as_ref()
                            .ok_or_else(|| JsError::host_fault("assignment target produced no reference"))?;
                        let old = self.get_value(reference, scope)?;
                        state.push_operand(old);
                    }
                    state.step = 2;
                    Ok(push(here, *value, scope))
                }
                _ => {
                    let result = match operator.binary_op() {
                        None => state.take_value(),
                        Some(op) => {
                            if state.step == 2 {
                                let right = state.take_value();
                                state.push_operand(right);
                                state.step = 3;
                            }
                            match self.combine(op, state)? {
                                Combined::Value(value) => value,
                                Combined::Convert(frame) => return Ok(Step::Push(frame)),
                            }
                        }
                    };
                    let reference = state
                        .reference
                        .take()
                        .ok_or_else(|| JsError::host_fault("assignment target produced no reference"))?;
                    self.put_value(&reference, result.clone(), scope)?;
                    Ok(Step::Done(result))
                }
            },
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push(here, *test, scope))
                }
                1 => {
                    state.step = 2;
                    if state.take_value().to_boolean() {
                        Ok(push(here, *consequent, scope))
                    } else {
                        Ok(push(here, *alternate, scope))
                    }
                }
                _ => Ok(Step::Done(state.take_value())),
            },
            NodeKind::SequenceExpression { expressions } => match expressions.get(state.step as usize) {
                Some(&node) => {
                    state.step += 1;
                    Ok(push(here, node, scope))
                }
                None => Ok(Step::Done(state.take_value())),
            },

            NodeKind::MemberExpression { object, property } => match state.step {
                0 => {
                    state.step = 1;
                    Ok(push(here, *object, scope))
                }
                1 => {
                    let base = state.take_value();
                    match property {
                        MemberProperty::Named(name) => self.finish_member(state, base, name.clone()),
                        MemberProperty::Computed(key) => {
                            state.push_operand(base);
                            state.step = 2;
                            Ok(push(here, *key, scope))
                        }
                    }
                }
                2 => {
                    let key = state.take_value();
                    if key.is_object() {
                        state.step = 3;
                        return Ok(Step::Push(self.to_primitive_frame(key, Hint::String, scope)?));
                    }
                    let base = state.operand(0);
                    self.finish_member(state, base, to_js_string(&key))
                }
                _ => {
                    let key = to_js_string(&state.take_value());
                    let base = state.operand(0);
                    self.finish_member(state, base, key)
                }
            },

            NodeKind::CallExpression { callee, arguments } => {
                self.step_call_expression(state, here, program, *callee, arguments, false)
            }
            NodeKind::NewExpression { callee, arguments } => {
                self.step_call_expression(state, here, program, *callee, arguments, true)
            }

            other => Err(JsError::host_fault(format!(
                "no step for node {:?}",
                std::mem::discriminant(other)
            ))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // References
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn get_value(&self, reference: &Reference, scope: ScopeId) -> Result<JsValue, JsError> {
        match reference {
            Reference::Binding {
                scope: Some(found),
                name,
            } => self.read_binding(*found, name),
            Reference::Binding { scope: None, name } => Err(JsError::reference_error(name)),
            Reference::Property { base, key } => self.get(base, key, self.scope_owner(scope)?),
        }
    }

    pub(crate) fn put_value(
        &mut self,
        reference: &Reference,
        value: JsValue,
        scope: ScopeId,
    ) -> Result<(), JsError> {
        match reference {
            Reference::Binding {
                scope: Some(found),
                name,
            } => self.write_binding(*found, name, value),
            Reference::Binding { scope: None, name } => Err(JsError::reference_error(name)),
            Reference::Property { base, key } => {
                let actor = self.scope_owner(scope)?;
                self.put(base, key, value, actor)
            }
        }
    }

    fn finish_member(&mut self, state: &State, base: JsValue, key: JsString) -> Result<Step, JsError> {
        if state.want_ref {
            return Ok(Step::Ref(Reference::Property { base, key }));
        }
        let actor = self.scope_owner(state.scope)?;
        Ok(Step::Done(self.get(&base, &key, actor)?))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════

    /// Finish a binary operation on operands `[left, right]`. Steps 3 to 5
    /// convert objects to primitives where the operator calls for it.
    fn combine(&mut self, op: BinaryOp, state: &mut State) -> Result<Combined, JsError> {
        let scope = state.scope;
        match state.step {
            3 => {
                let (left, right) = (state.operand(0), state.operand(1));
                if let Some(hint) = conversion_hint(op, &left, &right, true) {
                    state.step = 4;
                    return Ok(Combined::Convert(self.to_primitive_frame(left, hint, scope)?));
                }
            }
            4 => {
                let left = state.take_value();
                state.set_operand(0, left);
            }
            _ => {
                let right = state.take_value();
                state.set_operand(1, right);
                let operands = state.take_operands();
                return self.apply_operator(op, operands, scope).map(Combined::Value);
            }
        }
        let (left, right) = (state.operand(0), state.operand(1));
        if let Some(hint) = conversion_hint(op, &right, &left, false) {
            state.step = 5;
            return Ok(Combined::Convert(self.to_primitive_frame(right, hint, scope)?));
        }
        let operands = state.take_operands();
        self.apply_operator(op, operands, scope).map(Combined::Value)
    }

    fn apply_operator(&self, op: BinaryOp, operands: Vec<JsValue>, scope: ScopeId) -> Result<JsValue, JsError> {
        let mut operands = operands.into_iter();
        let left = operands.next().unwrap_or_default();
        let right = operands.next().unwrap_or_default();
        match op {
            BinaryOp::In => {
                let key = to_js_string(&left);
                let Some(object) = right.as_object() else {
                    return Err(JsError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        self.describe(&right)
                    )));
                };
                Ok(JsValue::Boolean(self.has_property(object, &key, self.scope_owner(scope)?)?))
            }
            BinaryOp::Instanceof => Ok(JsValue::Boolean(self.instance_of(
                &left,
                &right,
                self.scope_owner(scope)?,
            )?)),
            _ => apply_binary(op, &left, &right),
        }
    }

    fn step_unary(
        &mut self,
        state: &mut State,
        here: NodeRef,
        program: &Program,
        operator: UnaryOp,
        argument: NodeId,
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        if state.step == 0 {
            state.step = 1;
            let is_reference = program.kind(argument)?.is_reference();
            return match operator {
                UnaryOp::Typeof if is_reference => Ok(push_ref(here, argument, scope)),
                UnaryOp::Delete => match program.kind(argument)? {
                    NodeKind::MemberExpression { .. } => Ok(push_ref(here, argument, scope)),
                    NodeKind::Identifier { .. } => Ok(Step::Done(JsValue::Boolean(false))),
                    _ => Ok(push(here, argument, scope)),
                },
                _ => Ok(push(here, argument, scope)),
            };
        }

        match operator {
            UnaryOp::Typeof => {
                let value = match state.reference.take() {
                    Some(Reference::Binding { scope: None, .. }) => {
                        return Ok(Step::Done(JsValue::from("undefined")));
                    }
                    Some(reference) => self.get_value(&reference, scope)?,
                    None => state.take_value(),
                };
                Ok(Step::Done(JsValue::from(self.type_of(&value))))
            }
            UnaryOp::Delete => match state.reference.take() {
                Some(Reference::Property { base, key }) => match base {
                    JsValue::Object(object) => {
                        let actor = self.scope_owner(scope)?;
                        Ok(Step::Done(JsValue::Boolean(self.delete_property(object, &key, actor)?)))
                    }
                    JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                        "Cannot convert undefined or null to object for delete of '{}'",
                        key
                    ))),
                    _ => Ok(Step::Done(JsValue::Boolean(true))),
                },
                _ => Ok(Step::Done(JsValue::Boolean(true))),
            },
            UnaryOp::Void => Ok(Step::Done(JsValue::Undefined)),
            UnaryOp::Not => Ok(Step::Done(JsValue::Boolean(!state.take_value().to_boolean()))),
            UnaryOp::Minus | UnaryOp::Plus | UnaryOp::BitNot => {
                let value = state.take_value();
                if state.step == 1 && value.is_object() {
                    state.step = 2;
                    return Ok(Step::Push(self.to_primitive_frame(value, Hint::Number, scope)?));
                }
                let n = to_number(&value);
                Ok(Step::Done(match operator {
                    UnaryOp::Minus => JsValue::Number(-n),
                    UnaryOp::BitNot => JsValue::from(!to_int32(n)),
                    _ => JsValue::Number(n),
                }))
            }
        }
    }

    fn step_array(
        &mut self,
        state: &mut State,
        here: NodeRef,
        elements: &[Option<NodeId>],
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        let array = match state.info {
            StateInfo::Object(array) => array,
            _ => {
                let owner = self.scope_owner(scope)?;
                let array = self.create_array(Vec::new(), owner)?;
                state.info = StateInfo::Object(array);
                array
            }
        };
        let index = state.step as usize;
        if let Some(Some(_)) = index.checked_sub(1).and_then(|i| elements.get(i)) {
            let value = state.take_value();
            self.object_mut(array)?
                .insert((index - 1).to_string(), Property::data(value));
        }
        // Holes leave the index absent
        let mut next = index;
        while let Some(None) = elements.get(next) {
            next += 1;
        }
        match elements.get(next) {
            Some(Some(node)) => {
                state.step = next as u32 + 1;
                Ok(push(here, *node, scope))
            }
            _ => {
                let len = elements.len() as u32;
                self.object_mut(array)?.insert(
                    "length",
                    Property::with_flags(JsValue::from(len), true, false, false),
                );
                Ok(Step::Done(JsValue::Object(array)))
            }
        }
    }

    fn step_call_expression(
        &mut self,
        state: &mut State,
        here: NodeRef,
        program: &Program,
        callee: NodeId,
        arguments: &[NodeId],
        construct: bool,
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        match state.step {
            CALLED => return Ok(Step::Done(state.take_value())),
            0 => {
                state.step = 1;
                return match program.kind(callee)? {
                    NodeKind::MemberExpression { .. } if !construct => Ok(push_ref(here, callee, scope)),
                    _ => Ok(push(here, callee, scope)),
                };
            }
            1 => {
                let (func, this) = match state.reference.take() {
                    Some(reference @ Reference::Property { .. }) => {
                        let func = self.get_value(&reference, scope)?;
                        let Reference::Property { base, .. } = reference else {
                            return Err(JsError::host_fault("member callee lost its base"));
                        };
                        (func, base)
                    }
                    Some(reference) => (self.get_value(&reference, scope)?, JsValue::Undefined),
                    None => (state.take_value(), JsValue::Undefined),
                };
                state.push_operand(func);
                state.push_operand(this);
                state.step = 2;
            }
            _ => {}
        }

        let index = state.step as usize - 2;
        if index > 0 {
            let value = state.take_value();
            state.push_operand(value);
        }
        if let Some(&argument) = arguments.get(index) {
            state.step += 1;
            return Ok(push(here, argument, scope));
        }

        let mut operands = state.take_operands().into_iter();
        let func = operands.next().unwrap_or_default();
        let this = operands.next().unwrap_or_default();
        let args: Vec<JsValue> = operands.collect();
        if !self.is_callable(&func) {
            let what = if construct { "a constructor" } else { "a function" };
            return Err(JsError::type_error(format!(
                "{} is not {}",
                program.text(callee),
                what
            )));
        }
        state.step = CALLED;
        Ok(Step::Push(State::call(scope, CallInfo::new(func, this, args, construct))))
    }
}
