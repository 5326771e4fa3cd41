// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

fn synced(initial: Value) -> StateMirror {
    let mut mirror = StateMirror::new();
    mirror.mark_synchronized(&initial);
    mirror
}

fn tree(mirror: &StateMirror) -> Value {
    Value::Object(mirror.tree().unwrap().clone())
}

fn path(p: &str) -> Vec<String> {
    parse_path(&json!(p)).unwrap()
}

fn robots() -> Value {
    json!({
        "session": {"device": {"id": "dev-1"}},
        "robots": {
            "Bob": {"name": "Bob", "model": {"type": "ERGO"}, "control": "dev-2"},
            "Ann": {"name": "Ann", "model": {"type": "DREAM"}, "control": "dev-1"},
            "Cal": {"name": "Cal", "model": {"type": "ERGO"}},
        }
    })
}

#[test]
fn new_mirror_is_empty_and_unsynchronized() {
    let mirror = StateMirror::new();
    assert!(!mirror.is_synchronized());
    assert!(mirror.tree().is_none());
}

#[test]
fn mark_synchronized_seeds_tree() {
    let mirror = synced(json!({"server": {"version": "5.0"}}));
    assert!(mirror.is_synchronized());
    assert_eq!(tree(&mirror), json!({"server": {"version": "5.0"}}));
}

#[test]
fn mark_synchronized_with_null_data_gives_empty_tree() {
    let mirror = synced(Value::Null);
    assert!(mirror.is_synchronized());
    assert_eq!(tree(&mirror), json!({}));
}

#[test]
fn update_before_sync_is_dropped() {
    let mut mirror = StateMirror::new();
    assert!(!mirror.apply_update(&json!({"a": 1})));
    mirror.mark_synchronized(&json!({"b": 2}));
    assert_eq!(tree(&mirror), json!({"b": 2}));
}

#[test]
fn delete_before_sync_is_dropped() {
    let mut mirror = StateMirror::new();
    assert!(!mirror.apply_delete(&path("a")));
    assert!(mirror.tree().is_none());
}

#[test]
fn update_deep_merges() {
    let mut mirror = synced(json!({}));
    assert!(mirror.apply_update(&json!({"a": {"x": 1}})));
    assert!(mirror.apply_update(&json!({"a": {"y": 2}})));
    assert_eq!(tree(&mirror), json!({"a": {"x": 1, "y": 2}}));
}

#[test]
fn update_overwrites_scalars() {
    let mut mirror = synced(json!({"a": {"x": 1, "y": "keep"}}));
    mirror.apply_update(&json!({"a": {"x": 5}}));
    assert_eq!(tree(&mirror), json!({"a": {"x": 5, "y": "keep"}}));
}

#[test]
fn update_replaces_arrays_wholesale() {
    let mut mirror = synced(json!({"servos": [1, 2, 3], "other": true}));
    mirror.apply_update(&json!({"servos": [9]}));
    assert_eq!(tree(&mirror), json!({"servos": [9], "other": true}));
}

#[test]
fn update_null_overwrites() {
    let mut mirror = synced(json!({"a": {"x": 1}}));
    mirror.apply_update(&json!({"a": null}));
    assert_eq!(tree(&mirror), json!({"a": null}));
}

#[test]
fn update_object_replaces_scalar() {
    let mut mirror = synced(json!({"a": 1}));
    mirror.apply_update(&json!({"a": {"b": 2}}));
    assert_eq!(tree(&mirror), json!({"a": {"b": 2}}));
}

#[test]
fn non_object_update_is_ignored() {
    let mut mirror = synced(json!({"a": 1}));
    assert!(!mirror.apply_update(&json!([1, 2])));
    assert!(!mirror.apply_update(&json!("text")));
    assert_eq!(tree(&mirror), json!({"a": 1}));
}

#[test]
fn delete_removes_leaf_and_keeps_siblings() {
    let mut mirror = synced(json!({"a": {"x": 1, "y": 2}}));
    assert!(mirror.apply_delete(&path("a.x")));
    assert_eq!(tree(&mirror), json!({"a": {"y": 2}}));
}

#[test]
fn delete_removes_top_level_key() {
    let mut mirror = synced(json!({"a": 1, "b": 2}));
    assert!(mirror.apply_delete(&path("a")));
    assert_eq!(tree(&mirror), json!({"b": 2}));
}

#[test]
fn delete_missing_path_is_noop() {
    let mut mirror = synced(json!({"a": {"x": 1}}));
    assert!(!mirror.apply_delete(&path("a.z")));
    assert!(!mirror.apply_delete(&path("q.r.s")));
    assert!(!mirror.apply_delete(&path("a.x.deeper")));
    assert_eq!(tree(&mirror), json!({"a": {"x": 1}}));
}

#[test]
fn delete_array_element_leaves_null() {
    let mut mirror = synced(json!({"list": [{"id": 1}, {"id": 2}]}));
    assert!(mirror.apply_delete(&path("list[0]")));
    assert_eq!(tree(&mirror), json!({"list": [null, {"id": 2}]}));
}

#[test]
fn delete_inside_array_element() {
    let mut mirror = synced(json!({"list": [{"id": 1, "tag": "x"}]}));
    assert!(mirror.apply_delete(&path("list[0].tag")));
    assert_eq!(tree(&mirror), json!({"list": [{"id": 1}]}));
}

#[test]
fn apply_dispatches_patch_kinds() {
    let mut mirror = synced(json!({}));
    assert!(mirror.apply(&Patch::Update(json!({"a": {"b": 1}}))));
    assert!(mirror.apply(&Patch::Delete(vec!["a".into(), "b".into()])));
    assert_eq!(tree(&mirror), json!({"a": {}}));
}

#[test]
fn reset_clears_everything() {
    let mut mirror = synced(json!({"a": 1}));
    mirror.reset();
    assert!(!mirror.is_synchronized());
    assert!(mirror.tree().is_none());
    mirror.mark_synchronized(&json!({}));
    assert_eq!(tree(&mirror), json!({}));
}

#[parameterized(
    dotted = { json!("robots.Bob.control"), &["robots", "Bob", "control"] },
    single = { json!("robots"), &["robots"] },
    brackets = { json!("a[0].b"), &["a", "0", "b"] },
    trailing_bracket = { json!("a.b[12]"), &["a", "b", "12"] },
    quoted_bracket = { json!("a[\"b.c\"]"), &["a", "b.c"] },
    segment_list = { json!(["robots", "Bob"]), &["robots", "Bob"] },
    numeric_segment = { json!(["list", 3]), &["list", "3"] },
)]
fn parse_valid_paths(input: Value, expected: &[&str]) {
    assert_eq!(parse_path(&input).unwrap(), expected);
}

#[parameterized(
    empty = { json!("") },
    double_dot = { json!("a..b") },
    leading_dot = { json!(".a") },
    trailing_dot = { json!("a.") },
    unclosed = { json!("a[0") },
    empty_bracket = { json!("a[]") },
    empty_list = { json!([]) },
    bad_segment = { json!(["a", {"b": 1}]) },
    number = { json!(5) },
    null = { Value::Null },
)]
fn parse_invalid_paths(input: Value) {
    assert!(matches!(parse_path(&input), Err(Error::InvalidPath(_))));
}

#[test]
fn patch_from_envelopes() {
    let update = Envelope::update(json!({"a": 1}));
    assert_eq!(
        Patch::from_envelope(&update).unwrap(),
        Some(Patch::Update(json!({"a": 1})))
    );

    let delete = Envelope::delete("robots.Bob");
    assert_eq!(
        Patch::from_envelope(&delete).unwrap(),
        Some(Patch::Delete(vec!["robots".into(), "Bob".into()]))
    );

    let close = Envelope::close(1000, "bye");
    assert_eq!(Patch::from_envelope(&close).unwrap(), None);
}

#[test]
fn patch_from_delete_without_path_fails() {
    let mut delete = Envelope::delete("a");
    delete.data = json!({});
    assert!(matches!(
        Patch::from_envelope(&delete),
        Err(Error::InvalidPath(_))
    ));
}

#[test]
fn get_walks_objects_and_arrays() {
    let mirror = synced(json!({"a": {"list": [10, {"b": true}]}}));
    assert_eq!(mirror.get(&["a", "list", "1", "b"]), Some(&json!(true)));
    assert_eq!(mirror.get(&["a", "list", "7"]), None);
    assert_eq!(mirror.get(&[]), None);
}

#[test]
fn robot_lookup() {
    let mirror = synced(robots());
    assert_eq!(mirror.robot("Bob").unwrap()["model"]["type"], "ERGO");
    assert!(mirror.robot("Zed").is_none());
}

#[test]
fn robot_names_all_and_filtered() {
    let mirror = synced(robots());
    let mut all = mirror.robot_names(None);
    all.sort();
    assert_eq!(all, vec!["Ann", "Bob", "Cal"]);

    let mut ergo = mirror.robot_names(Some("ERGO"));
    ergo.sort();
    assert_eq!(ergo, vec!["Bob", "Cal"]);

    assert!(mirror.robot_names(Some("MINI")).is_empty());
}

#[test]
fn robot_names_without_registry() {
    let mirror = synced(json!({}));
    assert!(mirror.robot_names(None).is_empty());
}

#[parameterized(
    controlled_by_us = { "Ann", Some(true) },
    controlled_by_other = { "Bob", Some(false) },
    uncontrolled = { "Cal", Some(false) },
    unknown = { "Zed", None },
)]
fn has_control(name: &str, expected: Option<bool>) {
    let mirror = synced(robots());
    assert_eq!(mirror.has_control(name), expected);
}

#[test]
fn has_control_requires_device_identity() {
    let mirror = synced(json!({"robots": {"Bob": {"control": null}}}));
    assert_eq!(mirror.has_control("Bob"), Some(false));
}

#[test]
fn control_follows_updates() {
    let mut mirror = synced(robots());
    assert_eq!(mirror.has_control("Bob"), Some(false));
    mirror.apply_update(&json!({"robots": {"Bob": {"control": "dev-1"}}}));
    assert_eq!(mirror.has_control("Bob"), Some(true));
    assert_eq!(mirror.robot("Bob").unwrap()["model"]["type"], "ERGO");
}
