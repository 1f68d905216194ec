//! Statement steps
//!
//! [`Interpreter::dispatch`] advances one state by one step. Each node type
//! keeps its progress in `state.step` (and `state.info` where a counter is not
//! enough); a step either finishes the state or pushes one child and returns.

use crate::ast::{NodeId, NodeKind, NodeRef, Program, SwitchCase};
use crate::error::JsError;
use crate::value::{JsValue, ScopeId};

use super::scope::ScopeKind;
use super::state::{Completion, CompletionKind, State, StateInfo, Step, TryPhase};
use super::thread::ThreadId;
use super::Interpreter;

/// Evaluate `node` of the same program in `scope`
pub(super) fn push(here: NodeRef, node: NodeId, scope: ScopeId) -> Step {
    Step::Push(State::new(
        NodeRef {
            program: here.program,
            node,
        },
        scope,
    ))
}

/// Evaluate `node` for a reference rather than a value
pub(super) fn push_ref(here: NodeRef, node: NodeId, scope: ScopeId) -> Step {
    let mut child = State::new(
        NodeRef {
            program: here.program,
            node,
        },
        scope,
    );
    child.want_ref = true;
    Step::Push(child)
}

/// Push the next element of a statement list, or finish
fn next_in_list(state: &mut State, here: NodeRef, list: &[NodeId], done: JsValue) -> Step {
    match list.get(state.step as usize) {
        Some(&node) => {
            state.step += 1;
            push(here, node, state.scope)
        }
        None => Step::Done(done),
    }
}

impl Interpreter {
    pub(super) fn dispatch(&mut self, thread: ThreadId, state: &mut State) -> Result<Step, JsError> {
        let Some(here) = state.node else {
            return self.step_call(thread, state);
        };
        let program = self.heap.program(here.program)?;
        let scope = state.scope;
        match program.kind(here.node)? {
            NodeKind::Program { body, hoisted } => {
                if state.step == 0 {
                    self.hoist(hoisted, here.program, scope)?;
                    state.info = StateInfo::Program {
                        completion: JsValue::Undefined,
                    };
                    state.step = 1;
                    return Ok(Step::Stay);
                }
                match body.get(state.step as usize - 1) {
                    Some(&node) => {
                        state.step += 1;
                        Ok(push(here, node, scope))
                    }
                    None => match std::mem::take(&mut state.info) {
                        StateInfo::Program { completion } => Ok(Step::Done(completion)),
                        _ => Ok(Step::Done(JsValue::Undefined)),
                    },
                }
            }

            NodeKind::ExpressionStatement { expression } => {
                if state.step == 0 {
                    state.step = 1;
                    return Ok(push(here, *expression, scope));
                }
                let value = state.take_value();
                self.record_completion(thread, &value)?;
                Ok(Step::Done(value))
            }

            NodeKind::BlockStatement { body } => Ok(next_in_list(state, here, body, JsValue::Undefined)),
            NodeKind::VariableDeclaration { declarations } => {
                Ok(next_in_list(state, here, declarations, JsValue::Undefined))
            }
            NodeKind::VariableDeclarator { name, init } => match (state.step, init) {
                (0, Some(init)) => {
                    state.step = 1;
                    Ok(push(here, *init, scope))
                }
                (0, None) => Ok(Step::Done(JsValue::Undefined)),
                _ => {
                    let value = state.take_value();
                    self.set_binding(scope, name, value)?;
                    Ok(Step::Done(JsValue::Undefined))
                }
            },
            NodeKind::EmptyStatement | NodeKind::DebuggerStatement | NodeKind::FunctionDeclaration(_) => {
                Ok(Step::Done(JsValue::Undefined))
            }

            NodeKind::IfStatement {
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
                    } else if let Some(alternate) = alternate {
                        Ok(push(here, *alternate, scope))
                    } else {
                        Ok(Step::Done(JsValue::Undefined))
                    }
                }
                _ => Ok(Step::Done(JsValue::Undefined)),
            },

            NodeKind::LabeledStatement { label, body } => {
                if state.step > 0 {
                    return Ok(Step::Done(JsValue::Undefined));
                }
                state.step = 1;
                let mut child = State::new(
                    NodeRef {
                        program: here.program,
                        node: *body,
                    },
                    scope,
                );
                child.labels = state.labels.clone();
                child.labels.push(label.clone());
                Ok(Step::Push(child))
            }

            NodeKind::BreakStatement { label } => Ok(Step::Unwind(Completion::jump(
                CompletionKind::Break,
                label.clone(),
            ))),
            NodeKind::ContinueStatement { label } => Ok(Step::Unwind(Completion::jump(
                CompletionKind::Continue,
                label.clone(),
            ))),
            NodeKind::ReturnStatement { argument } => match (state.step, argument) {
                (0, Some(argument)) => {
                    state.step = 1;
                    Ok(push(here, *argument, scope))
                }
                _ => Ok(Step::Unwind(Completion::ret(state.take_value()))),
            },
            NodeKind::ThrowStatement { argument } => {
                if state.step == 0 {
                    state.step = 1;
                    return Ok(push(here, *argument, scope));
                }
                Ok(Step::Unwind(Completion::throw(state.take_value())))
            }

            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            } => self.step_try(state, here, *block, handler.as_ref(), *finalizer),
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            } => Ok(step_switch(state, here, *discriminant, cases)),

            NodeKind::WhileStatement { test, body } => match state.step {
                0 => {
                    state.is_loop = true;
                    self.check_time_limit(thread)?;
                    state.step = 1;
                    Ok(push(here, *test, scope))
                }
                _ => {
                    if !state.take_value().to_boolean() {
                        return Ok(Step::Done(JsValue::Undefined));
                    }
                    state.step = 0;
                    Ok(push(here, *body, scope))
                }
            },
            NodeKind::DoWhileStatement { body, test } => match state.step {
                0 => {
                    state.is_loop = true;
                    state.step = 1;
                    Ok(push(here, *body, scope))
                }
                1 => {
                    self.check_time_limit(thread)?;
                    state.step = 2;
                    Ok(push(here, *test, scope))
                }
                _ => {
                    if !state.take_value().to_boolean() {
                        return Ok(Step::Done(JsValue::Undefined));
                    }
                    state.step = 1;
                    Ok(push(here, *body, scope))
                }
            },
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            } => match state.step {
                0 => {
                    state.is_loop = true;
                    state.step = 1;
                    match init {
                        Some(init) => Ok(push(here, *init, scope)),
                        None => Ok(Step::Stay),
                    }
                }
                1 => {
                    self.check_time_limit(thread)?;
                    state.step = 2;
                    match test {
                        Some(test) => Ok(push(here, *test, scope)),
                        None => {
                            state.value = JsValue::Boolean(true);
                            Ok(Step::Stay)
                        }
                    }
                }
                2 => {
                    if !state.take_value().to_boolean() {
                        return Ok(Step::Done(JsValue::Undefined));
                    }
                    state.step = 3;
                    Ok(push(here, *body, scope))
                }
                _ => {
                    state.step = 1;
                    match update {
                        Some(update) => Ok(push(here, *update, scope)),
                        None => Ok(Step::Stay),
                    }
                }
            },
            NodeKind::ForInStatement { left, right, body } => {
                self.step_for_in(thread, state, here, &program, *left, *right, *body)
            }

            _ => self.step_expression(thread, state, here, &program),
        }
    }

    /// Store an expression statement's value as the completion value of the
    /// nearest enclosing program
    fn record_completion(&mut self, thread: ThreadId, value: &JsValue) -> Result<(), JsError> {
        for state in self.thread_mut(thread)?.stack.iter_mut().rev() {
            match &mut state.info {
                StateInfo::Program { completion } => {
                    *completion = value.clone();
                    break;
                }
                StateInfo::Call(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn step_try(
        &mut self,
        state: &mut State,
        here: NodeRef,
        block: NodeId,
        handler: Option<&crate::ast::CatchClause>,
        finalizer: Option<NodeId>,
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        match state.step {
            0 => {
                state.info = StateInfo::Try {
                    phase: TryPhase::Block,
                    completion: None,
                };
                state.step = 1;
                Ok(push(here, block, scope))
            }
            // Block or handler completed normally
            1 => match finalizer {
                Some(finalizer) => {
                    state.info = StateInfo::Try {
                        phase: TryPhase::Finalizer,
                        completion: None,
                    };
                    state.step = 3;
                    Ok(push(here, finalizer, scope))
                }
                None => Ok(Step::Done(JsValue::Undefined)),
            },
            // Caught a throw
            2 => {
                let handler =
                    handler.ok_or_else(|| JsError::host_fault("catch entered without a handler"))?;
                let owner = self.scope_owner(scope)?;
                let catch_scope = self.new_scope(ScopeKind::Catch, Some(scope), owner, None)?;
                self.declare_mutable(catch_scope, &handler.param, state.take_value())?;
                let completion = match std::mem::take(&mut state.info) {
                    StateInfo::Try { completion, .. } => completion,
                    _ => None,
                };
                state.info = StateInfo::Try {
                    phase: TryPhase::Handler,
                    completion,
                };
                state.step = 1;
                Ok(push(here, handler.body, catch_scope))
            }
            // Finalizer done: resume whatever was interrupted
            3 => match std::mem::take(&mut state.info) {
                StateInfo::Try {
                    completion: Some(completion),
                    ..
                } => Ok(Step::Unwind(completion)),
                _ => Ok(Step::Done(JsValue::Undefined)),
            },
            // Abrupt completion saved; run the finalizer
            _ => {
                let finalizer =
                    finalizer.ok_or_else(|| JsError::host_fault("finally entered without a finalizer"))?;
                if let StateInfo::Try { phase, .. } = &mut state.info {
                    *phase = TryPhase::Finalizer;
                }
                state.step = 3;
                Ok(push(here, finalizer, scope))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_for_in(
        &mut self,
        thread: ThreadId,
        state: &mut State,
        here: NodeRef,
        program: &Program,
        left: NodeId,
        right: NodeId,
        body: NodeId,
    ) -> Result<Step, JsError> {
        let scope = state.scope;
        match state.step {
            0 => {
                state.is_loop = true;
                state.step = 1;
                Ok(push(here, right, scope))
            }
            1 => {
                let object = state.take_value();
                let actor = self.scope_owner(scope)?;
                let keys = if object.is_null_or_undefined() {
                    Vec::new()
                } else {
                    self.for_in_keys(&object, actor)?
                };
                state.info = StateInfo::ForIn {
                    keys,
                    index: 0,
                    object,
                };
                state.step = 2;
                Ok(Step::Stay)
            }
            // Next key
            2 => {
                self.check_time_limit(thread)?;
                let actor = self.scope_owner(scope)?;
                let key = loop {
                    let StateInfo::ForIn {
                        keys,
                        index,
                        object,
                    } = &mut state.info
                    else {
                        return Err(JsError::host_fault("for-in state without keys"));
                    };
                    let Some(key) = keys.get(*index).cloned() else {
                        return Ok(Step::Done(JsValue::Undefined));
                    };
                    *index += 1;
                    // Keys deleted during iteration are skipped
                    let present = match object {
                        JsValue::Object(id) => self.has_property(*id, &key, actor)?,
                        _ => true,
                    };
                    if present {
                        break key;
                    }
                };
                let name = match program.kind(left)? {
                    NodeKind::VariableDeclaration { declarations } => {
                        let declarator = declarations
                            .first()
                            .ok_or_else(|| JsError::host_fault("empty for-in declaration"))?;
                        match program.kind(*declarator)? {
                            NodeKind::VariableDeclarator { name, .. } => Some(name.clone()),
                            _ => None,
                        }
                    }
                    NodeKind::Identifier { name } => Some(name.clone()),
                    _ => None,
                };
                match name {
                    Some(name) => {
                        self.set_binding(scope, &name, JsValue::from(key))?;
                        state.step = 2;
                        Ok(push(here, body, scope))
                    }
                    None => {
                        state.value = JsValue::from(key);
                        state.step = 3;
                        Ok(push_ref(here, left, scope))
                    }
                }
            }
            // Assign the key through a member reference
            _ => {
                let key = state.take_value();
                let reference = state
                    .reference
                    .take()
                    .ok_or_else(|| JsError::host_fault("for-in target produced no reference"))?;
                self.put_value(&reference, key, scope)?;
                state.step = 2;
                Ok(push(here, body, scope))
            }
        }
    }
}

fn step_switch(state: &mut State, here: NodeRef, discriminant: NodeId, cases: &[SwitchCase]) -> Step {
    let scope = state.scope;
    if state.step == 0 {
        state.is_switch = true;
        state.step = 1;
        return push(here, discriminant, scope);
    }
    if state.step == 1 {
        state.info = StateInfo::Switch {
            discriminant: state.take_value(),
            case: 0,
            statement: 0,
            matched: false,
        };
        state.step = 2;
    }
    let tested = if state.step == 3 {
        Some(state.take_value())
    } else {
        None
    };
    let StateInfo::Switch {
        discriminant,
        case,
        statement,
        matched,
    } = &mut state.info
    else {
        return Step::Done(JsValue::Undefined);
    };

    if let Some(tested) = tested {
        if tested.strict_equals(discriminant) {
            *matched = true;
            *statement = 0;
            state.step = 4;
        } else {
            *case += 1;
            state.step = 2;
        }
    }

    if state.step == 2 {
        // Next case with a test; `default` is only taken when none match
        let next = cases
            .iter()
            .enumerate()
            .skip(*case)
            .find_map(|(index, c)| c.test.map(|test| (index, test)));
        match next {
            Some((index, test)) => {
                *case = index;
                state.step = 3;
                return push(here, test, scope);
            }
            None => match cases.iter().position(|c| c.test.is_none()) {
                Some(index) => {
                    *case = index;
                    *statement = 0;
                    *matched = true;
                    state.step = 4;
                }
                None => return Step::Done(JsValue::Undefined),
            },
        }
    }

    // Execute from the matched case, falling through
    loop {
        let Some(current) = cases.get(*case) else {
            return Step::Done(JsValue::Undefined);
        };
        if let Some(&node) = current.consequent.get(*statement) {
            *statement += 1;
            return push(here, node, scope);
        }
        *case += 1;
        *statement = 0;
    }
}
