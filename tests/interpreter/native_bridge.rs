//! Native bridge tests: blocking with resolvers, re-entry, sleeping, host faults

#![allow(clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;

use super::{create_test_runtime, s};
use snapjs::{
    done, native, reenter_call, Interpreter, JsError, JsValue, NativeResult, Resolver, RunResult,
    ThreadOutcome, ThreadStatus,
};

type Parked = Rc<RefCell<Vec<Resolver>>>;

/// Install `waitFor()`, which blocks the calling thread and hands its
/// resolver to the test
fn install_wait_for(interp: &mut Interpreter) -> Parked {
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let sink = parked.clone();
    interp
        .define_global_native(
            "waitFor",
            0,
            native(move |interp, call| {
                sink.borrow_mut().push(interp.block_thread(call.thread));
                Ok(NativeResult::Block)
            }),
        )
        .expect("waitFor should install");
    parked
}

fn take_resolver(parked: &Parked) -> Resolver {
    parked.borrow_mut().pop().expect("a thread should be parked")
}

#[test]
fn test_block_then_resolve_resumes_with_value() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let thread = interp.spawn("var v = waitFor(); v + 1").expect("spawn");

    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Blocked));
    assert_eq!(interp.pending_resolvers().len(), 1);

    let resolver = take_resolver(&parked);
    assert!(interp.resolve(resolver, JsValue::Number(41.0)).is_ok());
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Ready));
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(JsValue::Number(42.0)))
    );
    assert!(interp.pending_resolvers().is_empty());
}

#[test]
fn test_reject_throws_into_thread() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let thread = interp
        .spawn("var r; try { waitFor(); r = 'resolved'; } catch (e) { r = 'caught ' + e; } r")
        .expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));

    assert!(interp.reject(take_resolver(&parked), s("network down")).is_ok());
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("caught network down")))
    );
}

#[test]
fn test_double_settlement_is_host_fault() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let thread = interp.spawn("waitFor()").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));

    let resolver = take_resolver(&parked);
    let (id, owner) = (resolver.id(), resolver.thread());
    assert_eq!(owner, thread);
    assert!(interp.resolve(resolver, JsValue::Undefined).is_ok());

    let again = interp.resolve(Resolver::from_raw(id, owner), JsValue::Undefined);
    assert!(matches!(again, Err(JsError::HostFault(_))));
    let reject = interp.reject(Resolver::from_raw(id, owner), JsValue::Undefined);
    assert!(matches!(reject, Err(JsError::HostFault(_))));
}

#[test]
fn test_reject_then_resolve_is_host_fault() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let thread = interp.spawn("try { waitFor(); } catch (e) {}").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));

    let resolver = take_resolver(&parked);
    let id = resolver.id();
    assert!(interp.reject(resolver, s("no")).is_ok());
    let late = interp.resolve(Resolver::from_raw(id, thread), s("yes"));
    assert!(matches!(late, Err(e) if e.is_host_fault()));
}

#[test]
fn test_resolving_a_killed_thread_is_ignored() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let thread = interp.spawn("waitFor(); 'unreachable'").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));
    assert!(interp.kill_thread(thread));
    assert!(interp.resolve(take_resolver(&parked), JsValue::Null).is_ok());
    assert_eq!(interp.thread_result(thread), Some(&ThreadOutcome::Killed));
}

#[test]
fn test_other_threads_run_while_one_is_blocked() {
    let mut interp = create_test_runtime();
    let parked = install_wait_for(&mut interp);
    let blocked = interp.spawn("waitFor()").expect("spawn");
    let free = interp.spawn("'free'").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::BlockedForever)));
    assert_eq!(
        interp.thread_result(free),
        Some(&ThreadOutcome::Completed(s("free")))
    );
    assert_eq!(interp.thread_status(blocked), Some(ThreadStatus::Blocked));
    assert!(!parked.borrow().is_empty());
}

#[test]
fn test_reentrant_native_calls_back_into_script() {
    let mut interp = create_test_runtime();
    // applyTwice(f, x) = f(f(x)), evaluated by the interpreter in two trips
    let apply_twice = native(|_interp, call| {
        let func = call.arg(0);
        match call.phase {
            0 => {
                call.phase = 1;
                reenter_call(func, JsValue::Undefined, vec![call.arg(1)])
            }
            1 => {
                call.phase = 2;
                let first = call.take_resumed();
                reenter_call(func, JsValue::Undefined, vec![first])
            }
            _ => done(call.take_resumed()),
        }
    });
    interp
        .define_global_native("applyTwice", 2, apply_twice)
        .expect("install");
    assert_eq!(
        interp.eval("applyTwice(function (n) { return n * 3; }, 2)").ok(),
        Some(JsValue::Number(18.0))
    );
}

#[test]
fn test_reentry_propagates_throws_to_the_caller() {
    let mut interp = create_test_runtime();
    let call_it = native(|_interp, call| match call.resumed.take() {
        Some(value) => done(value),
        None => reenter_call(call.arg(0), JsValue::Undefined, Vec::new()),
    });
    interp.define_global_native("callIt", 1, call_it).expect("install");
    let source = r#"
        var r;
        try { callIt(function () { throw 'inner'; }); } catch (e) { r = 'caught ' + e; }
        r
    "#;
    assert_eq!(interp.eval(source).ok(), Some(s("caught inner")));
}

#[test]
fn test_sleep_result_parks_thread_until_time() {
    let mut interp = create_test_runtime();
    let nap = native(|interp, _call| {
        Ok(NativeResult::Sleep {
            until: interp.now() + 75.0,
        })
    });
    interp.define_global_native("nap", 0, nap).expect("install");
    let thread = interp.spawn("nap(); 'rested'").expect("spawn");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 75.0));
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Sleeping));
    interp.wait_until(75.0);
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("rested")))
    );
}

#[test]
fn test_native_user_errors_are_catchable() {
    let mut interp = create_test_runtime();
    let picky = native(|_interp, call| match call.arg(0) {
        JsValue::Number(n) => done(n * 2.0),
        _ => Err(JsError::type_error("picky wants a number")),
    });
    interp.define_global_native("picky", 1, picky).expect("install");
    assert_eq!(
        interp
            .eval("var r; try { picky('x'); } catch (e) { r = e instanceof TypeError && e.message; } r")
            .ok(),
        Some(s("picky wants a number"))
    );
    assert_eq!(interp.eval("picky(4)").ok(), Some(JsValue::Number(8.0)));
}

#[test]
fn test_host_fault_kills_thread_and_bypasses_catch() {
    let mut interp = create_test_runtime();
    let broken = native(|_interp, _call| Err(JsError::host_fault("invariant broken")));
    interp.define_global_native("broken", 0, broken).expect("install");
    let thread = interp
        .spawn("var caught = false; try { broken(); } catch (e) { caught = true; }")
        .expect("spawn");
    let result = interp.run_to_quiescence();
    assert!(matches!(result, Err(JsError::HostFault(_))));
    assert_eq!(interp.thread_result(thread), Some(&ThreadOutcome::Killed));
    assert_eq!(interp.global_get("caught"), Some(JsValue::Boolean(false)));
}

#[test]
fn test_native_sees_this_args_and_construct_flag() {
    let mut interp = create_test_runtime();
    let inspect = native(|_interp, call| {
        done(format!(
            "{}:{}:{}",
            call.args.len(),
            call.construct,
            matches!(call.this, JsValue::Object(_))
        ))
    });
    interp.define_global_native("inspect", 0, inspect).expect("install");
    assert_eq!(interp.eval("inspect(1, 2)").ok(), Some(s("2:false:false")));
    assert_eq!(interp.eval("var o = {p: inspect}; o.p()").ok(), Some(s("0:false:true")));
}

#[test]
fn test_registered_native_ids_are_listed() {
    let mut interp = create_test_runtime();
    let ids = interp.native_ids();
    assert!(ids.iter().any(|id| &**id == "Object.create"));
    assert!(ids.iter().any(|id| &**id == "setTimeout"));
    assert!(!interp.is_native_registered("custom.hello"));
    interp.register_native("custom.hello", 0, native(|_, _| done("hello")), None);
    assert!(interp.is_native_registered("custom.hello"));
    let func = interp
        .create_native_function("custom.hello", "hello")
        .expect("function");
    assert!(interp.global_set("hello", JsValue::Object(func)).is_ok());
    assert_eq!(interp.eval("hello()").ok(), Some(s("hello")));
}

#[test]
fn test_settling_before_blocking_delivers_immediately() {
    let mut interp = create_test_runtime();
    let settle_now = native(|interp, call| {
        let resolver = interp.block_thread(call.thread);
        match call.arg(0) {
            JsValue::Boolean(true) => interp.reject(resolver, s("refused"))?,
            value => interp.resolve(resolver, value)?,
        }
        Ok(NativeResult::Block)
    });
    assert!(interp.define_global_native("settleNow", 1, settle_now).is_ok());
    let source = r#"
        var r = [settleNow('ok')];
        try { settleNow(true); } catch (e) { r.push('caught ' + e); }
        r.join()
    "#;
    assert_eq!(interp.eval(source).ok(), Some(s("ok,caught refused")));
    assert!(interp.pending_resolvers().is_empty());
}

#[test]
fn test_settling_without_blocking_is_host_fault() {
    let mut interp = create_test_runtime();
    let confused = native(|interp, call| {
        let resolver = interp.block_thread(call.thread);
        interp.resolve(resolver, JsValue::Number(1.0))?;
        done(2)
    });
    assert!(interp.define_global_native("confused", 0, confused).is_ok());
    let result = interp.eval("try { confused(); } catch (e) { 'swallowed'; }");
    assert!(
        matches!(&result, Err(e) if e.is_host_fault() && e.to_string().contains("without blocking")),
        "unexpected result: {:?}",
        result
    );
}
