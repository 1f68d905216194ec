//! Thread, timer and permission built-ins
//!
//! These are the interpreted side of the scheduler: timers are threads that
//! start asleep, `suspend` parks the caller, and `setPerms` switches the
//! Owner a scope acts as.

use crate::error::JsError;
use crate::interpreter::native::{native, NativeCall, NativeResult};
use crate::interpreter::operators::to_number;
use crate::interpreter::permission::Access;
use crate::interpreter::thread::ThreadId;
use crate::interpreter::Interpreter;
use crate::value::{JsValue, Owner};

use super::{builtin, object_arg};

pub fn init_thread(interp: &mut Interpreter) -> Result<(), JsError> {
    interp.define_global_native("setTimeout", 2, builtin(set_timeout))?;
    interp.define_global_native("clearTimeout", 1, builtin(clear_timeout))?;
    interp.define_global_native("suspend", 1, native(suspend))?;
    interp.define_global_native("perms", 0, builtin(perms))?;
    interp.define_global_native("setPerms", 1, builtin(set_perms))?;

    let thread = interp.create_namespace("Thread")?;
    interp.register_method(thread, "Thread", "current", thread_current, 0)?;
    interp.register_method(thread, "Thread", "kill", thread_kill, 1)?;
    interp.register_method(thread, "Thread", "setTimeLimit", thread_set_time_limit, 1)?;
    interp.register_method(thread, "Thread", "getTimeLimit", thread_get_time_limit, 0)?;
    Ok(())
}

fn thread_id_arg(call: &NativeCall, index: usize) -> Option<ThreadId> {
    let n = to_number(&call.arg(index));
    (n.is_finite() && n >= 0.0 && n.fract() == 0.0).then_some(ThreadId(n as u64))
}

/// Non-negative milliseconds; anything else counts as zero
fn millis_arg(call: &NativeCall, index: usize) -> f64 {
    let n = to_number(&call.arg(index));
    if n.is_finite() && n > 0.0 { n } else { 0.0 }
}

/// `setTimeout(fn, ms, ...args)`: a new thread that sleeps `ms` and then
/// calls `fn` with the caller's Owner. Returns the thread id.
fn set_timeout(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let owner = call.actor()?;
    let func = call.arg(0);
    let delay = millis_arg(call, 1);
    let args = call.args.iter().skip(2).cloned().collect();
    let id = interp.spawn_call_as(func, JsValue::Undefined, args, delay, owner, false)?;
    tracing::debug!(thread = %call.thread, timer = %id, delay, "timer scheduled");
    Ok(JsValue::Number(id.0 as f64))
}

fn clear_timeout(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    if let Some(id) = thread_id_arg(call, 0) {
        interp.kill_thread(id);
    }
    Ok(JsValue::Undefined)
}

/// `suspend(ms?)`: let other threads run, resuming after `ms`
fn suspend(interp: &mut Interpreter, call: &mut NativeCall) -> Result<NativeResult, JsError> {
    let until = interp.now() + millis_arg(call, 0);
    Ok(NativeResult::Sleep { until })
}

fn thread_current(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(call.thread.0 as f64))
}

fn thread_kill(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let killed = match thread_id_arg(call, 0) {
        Some(id) => interp.kill_thread(id),
        None => false,
    };
    Ok(JsValue::Boolean(killed))
}

/// `Thread.setTimeLimit(ms)` for the calling thread; `undefined` or a
/// non-finite value removes the limit
fn thread_set_time_limit(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let limit = match call.arg(0) {
        JsValue::Undefined | JsValue::Null => None,
        other => {
            let n = to_number(&other);
            if n.is_nan() || n < 0.0 {
                return Err(JsError::range_error("Invalid time limit"));
            }
            n.is_finite().then_some(n)
        }
    };
    interp.set_time_limit(call.thread, limit)?;
    Ok(JsValue::Undefined)
}

/// `null` when the calling thread has no limit
fn thread_get_time_limit(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(interp
        .time_limit(call.thread)
        .map(JsValue::Number)
        .unwrap_or(JsValue::Null))
}

fn perms(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(call
        .owner
        .map(|owner| JsValue::Object(owner.0))
        .unwrap_or(JsValue::Null))
}

/// `setPerms(owner)`: the calling scope acts as `owner` from now on
fn set_perms(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let target = Owner(object_arg(call, 0, "setPerms")?);
    interp.authorize_owner(call.owner, Some(target), Access::Become)?;
    interp.set_scope_owner(call.scope, target)?;
    tracing::debug!(thread = %call.thread, owner = target.0 .0, "owner changed");
    Ok(JsValue::Undefined)
}
