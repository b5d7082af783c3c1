//! Change detection over the original tree
//!
//! A node is changed when it got a copy, or when any of its original
//! children is changed. A node that was never drafted is unchanged without
//! looking at its contents, so siblings the routine never visited cost
//! nothing.
//!
//! The walk keeps its own stack, so read-only traversals of any depth are
//! answered without recursion.

use crate::registry::Registries;
use arbor_value::Value;
use std::collections::HashSet;

/// Whether `base` or anything reachable from it was written
pub(crate) fn has_changed(registries: &Registries, base: &Value) -> bool {
    let mut pending = vec![base];
    let mut seen = HashSet::new();
    while let Some(node) = pending.pop() {
        let Some(id) = registries.lookup(node) else {
            continue;
        };
        if registries.has_copy(id) {
            return true;
        }
        // shared subtrees are walked once
        if !seen.insert(id) {
            continue;
        }
        match node {
            Value::Map(m) => pending.extend(m.values()),
            Value::Seq(items) => pending.extend(items.iter()),
            Value::Leaf(_) => {}
        }
    }
    false
}
