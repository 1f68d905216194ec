//! Time limit tests, driven by a clock that ticks on every reading

#![allow(clippy::expect_used, clippy::panic)]

use std::cell::RefCell;
use std::rc::Rc;

use super::{create_runtime_with, s};
use snapjs::platform::ManualTimeProvider;
use snapjs::{
    native, Interpreter, InterpreterConfig, JsError, JsValue, NativeResult, Resolver, RunResult,
    ThreadId, ThreadOutcome, ThreadStatus,
};

/// Every clock reading moves time forward a tenth of a millisecond, so
/// busy loops burn through their budget without sleeping the test
fn ticking_runtime(config: InterpreterConfig) -> Interpreter {
    let (mut interp, _clock) = create_runtime_with(config);
    interp.set_time_provider(Box::new(ManualTimeProvider::ticking(0.1)));
    interp
}

fn limited_runtime() -> Interpreter {
    ticking_runtime(InterpreterConfig::default().with_time_limit(5.0))
}

#[test]
fn test_busy_loop_exceeds_time_limit() {
    let mut interp = limited_runtime();
    let result = interp.eval("for (var i = 0; i < 10000; i++) {} 'finished'");
    assert!(
        matches!(&result, Err(JsError::Thrown { message, .. }) if message == "RangeError: Thread ran too long"),
        "unexpected result: {:?}",
        result
    );
}

#[test]
fn test_suspending_restarts_the_budget() {
    let mut interp = limited_runtime();
    let result = interp.eval("for (var i = 0; i < 10000; i++) { suspend(); } 'finished'");
    assert_eq!(result.ok(), Some(s("finished")));
}

#[test]
fn test_time_limit_error_is_catchable() {
    let mut interp = limited_runtime();
    let source = r#"
        var r;
        try {
            while (true) {}
        } catch (e) {
            r = (e instanceof RangeError) + ':' + e.message;
        }
        r
    "#;
    assert_eq!(interp.eval(source).ok(), Some(s("true:Thread ran too long")));
}

#[test]
fn test_runaway_recursion_is_also_limited() {
    let mut interp = limited_runtime();
    let result = interp.eval("function spin(n) { return n > 1e9 ? n : spin(n + 1) + 0; } spin(0)");
    assert!(matches!(&result, Err(JsError::Thrown { message, .. }) if message.starts_with("RangeError")));
}

#[test]
fn test_unlimited_by_default() {
    let mut interp = ticking_runtime(InterpreterConfig::default());
    assert_eq!(interp.eval("Thread.getTimeLimit()").ok(), Some(JsValue::Null));
    assert_eq!(
        interp.eval("for (var i = 0; i < 2000; i++) {} i").ok(),
        Some(JsValue::Number(2000.0))
    );
}

#[test]
fn test_config_default_applies_to_new_threads() {
    let mut interp = limited_runtime();
    assert_eq!(interp.eval("Thread.getTimeLimit()").ok(), Some(JsValue::Number(5.0)));
    let thread = interp.spawn("1").expect("spawn");
    assert_eq!(interp.time_limit(thread), Some(5.0));
}

#[test]
fn test_script_sets_its_own_limit() {
    let mut interp = ticking_runtime(InterpreterConfig::default());
    let source = r#"
        Thread.setTimeLimit(250);
        var seen = Thread.getTimeLimit();
        var r;
        try { while (true) {} } catch (e) { r = e.message; }
        Thread.setTimeLimit(undefined);
        [seen, r, Thread.getTimeLimit()].join()
    "#;
    assert_eq!(interp.eval(source).ok(), Some(s("250,Thread ran too long,")));
}

#[test]
fn test_negative_limit_is_range_error() {
    let mut interp = ticking_runtime(InterpreterConfig::default());
    let result = interp.eval("Thread.setTimeLimit(-1)");
    assert!(matches!(&result, Err(e) if e.to_string().contains("RangeError: Invalid time limit")));
}

#[test]
fn test_host_sets_limit_per_thread() {
    let mut interp = ticking_runtime(InterpreterConfig::default());
    let slow = interp.spawn("while (true) {}").expect("spawn");
    let quick = interp.spawn("'quick'").expect("spawn");
    assert!(interp.set_time_limit(slow, Some(2.0)).is_ok());
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert!(matches!(interp.thread_result(slow), Some(ThreadOutcome::Threw(_))));
    assert_eq!(
        interp.thread_result(quick),
        Some(&ThreadOutcome::Completed(s("quick")))
    );
}

/// Step a thread by hand, moving the manual clock forward `gap` ms whenever
/// nothing is runnable
fn step_to_completion(interp: &mut Interpreter, clock: &ManualTimeProvider, thread: ThreadId, gap: f64) {
    for _ in 0..10_000 {
        match interp.step_once() {
            Ok(true) => {}
            Ok(false) if interp.thread_status(thread) == Some(ThreadStatus::Zombie) => return,
            Ok(false) => clock.advance(gap),
            Err(err) => panic!("step failed: {}", err),
        }
    }
    panic!("thread {} never finished", thread);
}

#[test]
fn test_time_asleep_is_not_charged_when_stepping() {
    let (mut interp, clock) = create_runtime_with(InterpreterConfig::default().with_time_limit(5.0));
    let thread = interp
        .spawn("for (var i = 0; i < 3; i++) { suspend(10); } 'finished'")
        .expect("spawn");
    step_to_completion(&mut interp, &clock, thread, 10.0);
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("finished")))
    );
}

#[test]
fn test_time_before_first_step_is_not_charged() {
    let (mut interp, clock) = create_runtime_with(InterpreterConfig::default().with_time_limit(5.0));
    let thread = interp.spawn("var n = 0; n + 1").expect("spawn");
    clock.advance(100.0);
    step_to_completion(&mut interp, &clock, thread, 1.0);
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(JsValue::Number(1.0)))
    );
}

#[test]
fn test_time_blocked_is_not_charged_when_stepping() {
    let (mut interp, clock) = create_runtime_with(InterpreterConfig::default().with_time_limit(5.0));
    let parked: Rc<RefCell<Vec<Resolver>>> = Rc::default();
    let sink = parked.clone();
    let wait = native(move |interp, call| {
        sink.borrow_mut().push(interp.block_thread(call.thread));
        Ok(NativeResult::Block)
    });
    assert!(interp.define_global_native("wait", 0, wait).is_ok());
    let thread = interp
        .spawn("var got = wait(); for (var i = 0; i < 3; i++) {} got")
        .expect("spawn");

    while let Ok(true) = interp.step_once() {}
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Blocked));
    clock.advance(1_000.0);
    let resolver = parked.borrow_mut().pop().expect("thread should have blocked");
    assert!(interp.resolve(resolver, s("late")).is_ok());

    step_to_completion(&mut interp, &clock, thread, 1.0);
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("late")))
    );
}
