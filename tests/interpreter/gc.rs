//! Garbage collection tests: what survives a collection and what the host
//! has to pin itself

#![allow(clippy::expect_used)]

use super::{create_test_runtime, s};
use snapjs::{Interpreter, JsValue};

fn marker(interp: &Interpreter, value: &JsValue) -> JsValue {
    interp
        .get(value, "marker", Some(interp.root_owner()))
        .expect("property read should succeed")
}

/// Allocate enough garbage that freed slots get handed out again
fn churn(interp: &mut Interpreter) {
    let source = "for (var i = 0; i < 50; i++) { var tmp = {marker: 'other' + i}; } 'done'";
    assert_eq!(interp.eval(source).ok(), Some(s("done")));
    interp.collect_garbage();
}

#[test]
fn test_eval_result_survives_later_collections() {
    let mut interp = create_test_runtime();
    let held = interp.eval("({marker: 'mine'})").expect("eval should succeed");
    churn(&mut interp);
    assert_eq!(marker(&interp, &held), s("mine"));
}

#[test]
fn test_released_results_are_collected() {
    let mut interp = create_test_runtime();
    interp.collect_garbage();
    let baseline = interp.gc_stats().live_objects;

    let held = interp.eval("({marker: 'mine'})").expect("eval should succeed");
    interp.collect_garbage();
    assert!(interp.gc_stats().live_objects > baseline);

    interp.release_host_values();
    interp.collect_garbage();
    assert!(interp.gc_stats().live_objects <= baseline);
    assert!(held.is_object());
}

#[test]
fn test_guard_pins_values_read_from_globals() {
    let mut interp = create_test_runtime();
    assert!(interp.eval("var slot = {marker: 'pinned'};").is_ok());
    let held = interp.global_get("slot").expect("global should exist");
    let guard = interp.create_guard();
    assert!(guard.guard(&held));

    // The script drops its own reference; only the guard keeps it alive
    assert!(interp.eval("slot = null;").is_ok());
    interp.release_host_values();
    churn(&mut interp);
    assert_eq!(marker(&interp, &held), s("pinned"));
    assert_eq!(guard.len(), 1);
}

#[test]
fn test_objects_reachable_from_globals_survive() {
    let mut interp = create_test_runtime();
    assert!(interp
        .eval("var tree = {left: {marker: 'l'}, right: {marker: 'r'}}; tree.left.up = tree;")
        .is_ok());
    churn(&mut interp);
    let check = "tree.left.marker + tree.right.marker + (tree.left.up === tree)";
    assert_eq!(interp.eval(check).ok(), Some(s("lrtrue")));
}
