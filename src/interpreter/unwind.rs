//! Abrupt completions
//!
//! `break`, `continue`, `return` and `throw` pop states until one of them
//! claims the completion: a loop or label for jumps, a running call frame for
//! `return`, a `try` for throws and for anything passing through a `finally`.

use crate::ast::NodeKind;
use crate::error::JsError;
use crate::value::JsString;

use super::state::{CallPhase, Completion, CompletionKind, State, StateInfo, TryPhase};
use super::thread::{ThreadId, ThreadOutcome};
use super::Interpreter;

/// Whether a `break`/`continue` with `label` targets `state`
fn is_jump_target(state: &State, kind: CompletionKind, label: Option<&JsString>) -> bool {
    match (kind, label) {
        (CompletionKind::Break, None) => state.is_loop || state.is_switch,
        (CompletionKind::Continue, None) => state.is_loop,
        (CompletionKind::Break, Some(label)) => state.labels.contains(label),
        (CompletionKind::Continue, Some(label)) => state.is_loop && state.labels.contains(label),
        _ => false,
    }
}

impl Interpreter {
    pub(super) fn unwind(&mut self, thread: ThreadId, completion: Completion) -> Result<(), JsError> {
        loop {
            let Some(mut state) = self.thread_mut(thread)?.stack.pop() else {
                return self.unwind_past_base(thread, completion);
            };

            if let StateInfo::Try { phase, .. } = &state.info {
                let phase = *phase;
                let (has_handler, has_finalizer) = self.try_clauses(&state)?;
                if phase == TryPhase::Block && has_handler && completion.kind == CompletionKind::Throw {
                    state.step = 2;
                    state.value = completion.value;
                    self.thread_mut(thread)?.stack.push(state);
                    return Ok(());
                }
                if phase != TryPhase::Finalizer && has_finalizer {
                    state.info = StateInfo::Try {
                        phase,
                        completion: Some(completion),
                    };
                    state.step = 4;
                    self.thread_mut(thread)?.stack.push(state);
                    return Ok(());
                }
                continue;
            }

            match completion.kind {
                CompletionKind::Return => {
                    if let StateInfo::Call(call) = &mut state.info {
                        if call.phase == CallPhase::Running {
                            call.phase = CallPhase::Returned;
                            state.value = completion.value;
                            self.thread_mut(thread)?.stack.push(state);
                            return Ok(());
                        }
                    }
                }
                CompletionKind::Break => {
                    if is_jump_target(&state, completion.kind, completion.label.as_ref()) {
                        return Ok(());
                    }
                }
                CompletionKind::Continue => {
                    if is_jump_target(&state, completion.kind, completion.label.as_ref()) {
                        self.thread_mut(thread)?.stack.push(state);
                        return Ok(());
                    }
                }
                CompletionKind::Throw | CompletionKind::Normal => {}
            }
        }
    }

    /// Whether the `try` statement behind `state` has a `catch` and a
    /// `finally`
    fn try_clauses(&self, state: &State) -> Result<(bool, bool), JsError> {
        let node = state
            .node
            .ok_or_else(|| JsError::host_fault("try state without a node"))?;
        let program = self.heap.program(node.program)?;
        match program.kind(node.node)? {
            NodeKind::TryStatement {
                handler, finalizer, ..
            } => Ok((handler.is_some(), finalizer.is_some())),
            _ => Err(JsError::host_fault("try state on a non-try node")),
        }
    }

    fn unwind_past_base(&mut self, thread: ThreadId, completion: Completion) -> Result<(), JsError> {
        match completion.kind {
            CompletionKind::Throw => self.finish_thread(thread, ThreadOutcome::Threw(completion.value)),
            kind => self.fault(
                thread,
                JsError::host_fault(format!("'{}' escaped the thread", kind.name())),
            ),
        }
    }
}
