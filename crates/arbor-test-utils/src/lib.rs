//! Testing utilities for the Arbor workspace
//!
//! Shared fixtures, identity assertions, proptest strategies and tracing
//! setup.

#![allow(missing_docs)]

use arbor_value::{Fingerprint, NodeKey, Value, ValuePath};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// `{a: 1, b: {ba: 1, bb: 2}, c: {ca: 1, cb: 2}}`
pub fn scenario_a() -> Value {
    Value::from(json!({"a": 1, "b": {"ba": 1, "bb": 2}, "c": {"ca": 1, "cb": 2}}))
}

/// `[1, {a: 1, b: {c: 2}}, {a: 1, b: 2}]`
pub fn scenario_c() -> Value {
    Value::from(json!([1, {"a": 1, "b": {"c": 2}}, {"a": 1, "b": 2}]))
}

/// A wide tree with nested maps and sequences
pub fn catalog() -> Value {
    Value::from(json!({
        "name": "catalog",
        "tags": ["a", "b", "c"],
        "items": [
            {"id": 1, "price": 10, "meta": {"color": "red"}},
            {"id": 2, "price": 20, "meta": {"color": "blue"}},
            {"id": 3, "price": 30, "meta": {"color": "green"}}
        ],
        "settings": {"currency": "EUR", "limits": {"max": 100, "min": 1}}
    }))
}

/// Route `tracing` output from the library into the test harness
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parse a JSON Pointer, panicking on malformed input
#[track_caller]
pub fn path(pointer: &str) -> ValuePath {
    pointer
        .parse()
        .unwrap_or_else(|err| panic!("bad pointer {pointer:?}: {err}"))
}

/// Node at `pointer`, panicking when absent
#[track_caller]
pub fn at<'a>(value: &'a Value, pointer: &str) -> &'a Value {
    value
        .get_path(&path(pointer))
        .unwrap_or_else(|| panic!("nothing at {pointer}"))
}

/// Assert both trees hold the very same node at `pointer`
#[track_caller]
pub fn assert_shared(left: &Value, right: &Value, pointer: &str) {
    assert!(
        at(left, pointer).same(at(right, pointer)),
        "expected a shared node at {pointer:?}"
    );
}

/// Assert the trees hold different nodes at `pointer`
#[track_caller]
pub fn assert_fresh(left: &Value, right: &Value, pointer: &str) {
    assert!(
        !at(left, pointer).same(at(right, pointer)),
        "expected a rebuilt node at {pointer:?}"
    );
}

/// Assert equal contents with map keys in the same order
///
/// `Value`'s `==` ignores key order, so replayed patches are checked here.
#[track_caller]
pub fn assert_ordered_eq(left: &Value, right: &Value) {
    assert!(
        Fingerprint::of(left) == Fingerprint::of(right),
        "trees differ in content or key order\n left: {left:?}\nright: {right:?}"
    );
}

/// Content and node identity of a whole tree, for before/after comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fingerprint: Fingerprint,
    pub nodes: Vec<(ValuePath, NodeKey)>,
}

impl Snapshot {
    pub fn take(value: &Value) -> Self {
        let mut nodes = Vec::new();
        collect_nodes(value, &mut ValuePath::root(), &mut nodes);
        Self {
            fingerprint: Fingerprint::of(value),
            nodes,
        }
    }
}

fn collect_nodes(value: &Value, path: &mut ValuePath, out: &mut Vec<(ValuePath, NodeKey)>) {
    let Some(key) = value.node_key() else { return };
    out.push((path.clone(), key));
    for prop in value.props() {
        if let Some(child) = value.get(&prop) {
            path.push(prop);
            collect_nodes(child, path, out);
            path.pop();
        }
    }
}

/// Paths of every leaf in a tree, in document order
pub fn leaf_paths(value: &Value) -> Vec<ValuePath> {
    let mut out = Vec::new();
    walk(value, &mut ValuePath::root(), &mut |path, node| {
        if node.is_leaf() {
            out.push(path.clone());
        }
    });
    out
}

/// Paths of every container in a tree, root included
pub fn container_paths(value: &Value) -> Vec<ValuePath> {
    let mut out = Vec::new();
    walk(value, &mut ValuePath::root(), &mut |path, node| {
        if node.is_container() {
            out.push(path.clone());
        }
    });
    out
}

fn walk(value: &Value, path: &mut ValuePath, visit: &mut dyn FnMut(&ValuePath, &Value)) {
    visit(path, value);
    for prop in value.props() {
        if let Some(child) = value.get(&prop) {
            path.push(prop);
            walk(child, path, visit);
            path.pop();
        }
    }
}

pub mod strategies {
    //! Proptest strategies for value trees

    use arbor_value::Value;
    use proptest::prelude::*;

    pub fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::null()),
            any::<bool>().prop_map(Value::from),
            (-1000i64..1000).prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
        ]
    }

    /// Any tree, leaves included
    pub fn tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(4, 64, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::seq),
                prop::collection::vec(("[a-z]{1,3}", inner), 0..6).prop_map(Value::map),
            ]
        })
    }

    /// Trees whose root is a map or a sequence
    pub fn container() -> impl Strategy<Value = Value> {
        prop_oneof![
            prop::collection::vec(tree(), 1..6).prop_map(Value::seq),
            prop::collection::vec(("[a-z]{1,3}", tree()), 1..6).prop_map(Value::map),
        ]
    }
}
