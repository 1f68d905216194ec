//! Scheduler tests: ordering, timers, sleeping, pause/stop, killing threads

#![allow(clippy::expect_used)]

use super::{create_console_runtime, create_test_runtime, s};
use snapjs::platform::ManualTimeProvider;
use snapjs::{Interpreter, JsError, JsValue, RunResult, RunStatus, ThreadOutcome, ThreadStatus};

/// Drive the scheduler until nothing is left, advancing the manual clock
/// over sleeps
fn run_all(interp: &mut Interpreter) -> Result<RunResult, JsError> {
    loop {
        match interp.run_to_quiescence()? {
            RunResult::MoreWorkAt(at) => interp.wait_until(at),
            other => return Ok(other),
        }
    }
}

fn global(interp: &Interpreter, name: &str) -> JsValue {
    interp.global_get(name).expect("global should exist")
}

#[test]
fn test_most_overdue_thread_runs_first() {
    let mut interp = create_test_runtime();
    assert!(interp
        .eval("var log = []; var record = function (tag) { log.push(tag); };")
        .is_ok());
    let record = global(&interp, "record");
    for (tag, delay) in [("t3", 30.0), ("t1", 10.0), ("t2", 20.0)] {
        let spawned = interp.spawn_call(record.clone(), JsValue::Undefined, vec![s(tag)], delay);
        assert!(spawned.is_ok());
    }
    // All three are overdue by the time the scheduler looks
    interp.wait_until(100.0);
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(interp.eval("log.join()").ok(), Some(s("t1,t2,t3")));
}

#[test]
fn test_ties_break_on_thread_id() {
    let mut interp = create_test_runtime();
    let source = r#"
        var log = [];
        setTimeout(function () { log.push('a'); }, 0);
        setTimeout(function () { log.push('b'); }, 0);
        setTimeout(function () { log.push('c'); }, 0);
    "#;
    assert!(interp.eval(source).is_ok());
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(interp.eval("log.join('')").ok(), Some(s("abc")));
}

#[test]
fn test_timers_fire_in_delay_order_with_arguments() {
    let mut interp = create_test_runtime();
    let source = r#"
        var log = [];
        function note(tag) { log.push(tag); }
        setTimeout(note, 50, 'late');
        setTimeout(note, 5, 'early');
        setTimeout(note, 20, 'middle');
    "#;
    assert!(interp.eval(source).is_ok());
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 5.0));
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(interp.eval("log.join()").ok(), Some(s("early,middle,late")));
}

#[test]
fn test_clear_timeout_kills_pending_timer() {
    let mut interp = create_test_runtime();
    let source = r#"
        var fired = false;
        var id = setTimeout(function () { fired = true; }, 10);
        clearTimeout(id);
    "#;
    assert!(interp.eval(source).is_ok());
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(global(&interp, "fired"), JsValue::Boolean(false));
}

#[test]
fn test_suspend_interleaves_threads() {
    let mut interp = create_test_runtime();
    let worker = |name: &str| {
        format!(
            "(function () {{ for (var i = 0; i < 3; i++) {{ log.push('{}' + i); suspend(); }} }})()",
            name
        )
    };
    assert!(interp.eval("var log = [];").is_ok());
    assert!(interp.spawn(&worker("a")).is_ok());
    assert!(interp.spawn(&worker("b")).is_ok());
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(interp.eval("log.join()").ok(), Some(s("a0,b0,a1,b1,a2,b2")));
}

#[test]
fn test_sleeping_thread_reports_wake_time() {
    let mut interp = create_test_runtime();
    let thread = interp.spawn("suspend(250); 'awake'").expect("spawn should succeed");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 250.0));
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Sleeping));
    interp.wait_until(250.0);
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        interp.thread_result(thread),
        Some(&ThreadOutcome::Completed(s("awake")))
    );
}

#[test]
fn test_swapped_clock_starts_at_zero() {
    let mut interp = Interpreter::new().expect("interpreter should start");
    let clock = ManualTimeProvider::new();
    interp.set_time_provider(Box::new(clock.clone()));
    assert_eq!(interp.now(), 0.0);
    assert!(interp.spawn("suspend(40)").is_ok());
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(at)) if at == 40.0));
    clock.advance(15.0);
    assert_eq!(interp.now(), 15.0);
}

#[test]
fn test_step_once_advances_one_step() {
    let mut interp = create_test_runtime();
    assert!(interp.spawn("var a = 1; var b = 2;").is_ok());
    let mut steps = 0;
    while let Ok(true) = interp.step_once() {
        steps += 1;
        assert!(steps < 1_000, "thread never finished");
    }
    assert!(steps > 2);
    assert_eq!(global(&interp, "b"), JsValue::Number(2.0));
}

#[test]
fn test_pause_and_resume() {
    let mut interp = create_test_runtime();
    assert!(interp.spawn("var done = true;").is_ok());
    interp.pause();
    assert_eq!(interp.status(), RunStatus::Paused);
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Paused)));
    assert!(matches!(interp.step_once(), Ok(false)));
    assert_eq!(interp.global_get("done"), None);

    interp.resume();
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(global(&interp, "done"), JsValue::Boolean(true));
}

#[test]
fn test_stop_kills_everything() {
    let mut interp = create_test_runtime();
    let sleeper = interp.spawn("suspend(1000); 'never'").expect("spawn should succeed");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(_))));
    interp.stop();
    assert_eq!(interp.status(), RunStatus::Stopped);
    assert_eq!(interp.thread_result(sleeper), Some(&ThreadOutcome::Killed));
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
}

#[test]
fn test_killed_thread_skips_finally() {
    let (mut interp, console) = create_console_runtime();
    let thread = interp.spawn("try { suspend(100); } finally { console.log('finally ran'); }").expect("spawn should succeed");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::MoreWorkAt(_))));
    assert!(interp.kill_thread(thread));
    assert!(!interp.kill_thread(thread));
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(interp.thread_status(thread), Some(ThreadStatus::Zombie));
    assert!(console.messages().is_empty());
}

#[test]
fn test_thread_kill_from_script() {
    let mut interp = create_test_runtime();
    let source = r#"
        var ran = false;
        var timer = setTimeout(function () { ran = true; }, 10);
        var first = Thread.kill(timer);
        var second = Thread.kill(timer);
        [first, second].join()
    "#;
    assert_eq!(interp.eval(source).ok(), Some(s("true,false")));
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(global(&interp, "ran"), JsValue::Boolean(false));
}

#[test]
fn test_thread_current_matches_spawned_id() {
    let mut interp = create_test_runtime();
    let thread = interp.spawn("Thread.current()").expect("spawn should succeed");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert_eq!(
        interp.take_thread_result(thread),
        Some(ThreadOutcome::Completed(JsValue::Number(thread.0 as f64)))
    );
    assert_eq!(interp.thread_status(thread), None);
}

#[test]
fn test_uncaught_throw_only_kills_its_thread() {
    let (mut interp, console) = create_console_runtime();
    let bad = interp.spawn("throw new Error('boom')").expect("spawn should succeed");
    let good = interp.spawn("'fine'").expect("spawn should succeed");
    assert!(matches!(interp.run_to_quiescence(), Ok(RunResult::Done)));
    assert!(matches!(interp.thread_result(bad), Some(ThreadOutcome::Threw(_))));
    assert_eq!(
        interp.thread_result(good),
        Some(&ThreadOutcome::Completed(s("fine")))
    );
    let messages = console.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages.iter().all(|m| m.starts_with("Uncaught Error: boom")));
}

#[test]
fn test_timer_throw_does_not_stop_other_timers() {
    let (mut interp, console) = create_console_runtime();
    let source = r#"
        var log = [];
        setTimeout(function () { throw new TypeError('first fails'); }, 1);
        setTimeout(function () { log.push('second ran'); }, 2);
    "#;
    assert!(interp.eval(source).is_ok());
    assert!(matches!(run_all(&mut interp), Ok(RunResult::Done)));
    assert_eq!(interp.eval("log.join()").ok(), Some(s("second ran")));
    assert!(console.output().contains("Uncaught TypeError: first fails"));
}
