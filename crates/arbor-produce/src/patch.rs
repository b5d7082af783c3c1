//! Patches describing what a producer call changed
//!
//! Provides [`Patch`], a JSON Patch shaped record of one change, generated by
//! comparing the origin with the result of a call.

use crate::draft::{Draft, DraftValue};
use crate::error::ProduceError;
use crate::registry::{DraftId, Registries};
use arbor_value::{Mapping, NodeKey, Prop, Value, ValueKind, ValuePath};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Patch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Property added; inserts on sequences
    Add,
    /// Property removed
    Remove,
    /// Property now holds a different node or leaf
    Replace,
}

/// One change at one path
///
/// # Invariants
/// - `value` is present for `Add` and `Replace`, absent for `Remove`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    op: PatchOp,
    path: ValuePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl Patch {
    /// Add `value` at `path`
    #[inline]
    #[must_use]
    pub fn add(path: ValuePath, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path,
            value: Some(value),
        }
    }

    /// Remove whatever is at `path`
    #[inline]
    #[must_use]
    pub fn remove(path: ValuePath) -> Self {
        Self {
            op: PatchOp::Remove,
            path,
            value: None,
        }
    }

    /// Replace whatever is at `path` with `value`
    #[inline]
    #[must_use]
    pub fn replace(path: ValuePath, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path,
            value: Some(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn op(&self) -> PatchOp {
        self.op
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &ValuePath {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn required_value(&self) -> Result<Value, ProduceError> {
        self.value
            .clone()
            .ok_or_else(|| ProduceError::patch_conflict(&self.path, "missing value"))
    }
}

/// Pairs of (original node, node rebuilt from it) of one call
pub(crate) struct Rebuilt {
    pairs: HashSet<(NodeKey, NodeKey)>,
}

impl Rebuilt {
    pub(crate) fn collect(registries: &Registries, memo: &HashMap<DraftId, Value>) -> Self {
        let pairs = memo
            .iter()
            .filter_map(|(id, value)| {
                let base = registries.base(*id).to_value();
                if base.same(value) {
                    return None;
                }
                Some((base.node_key()?, value.node_key()?))
            })
            .collect();
        Self { pairs }
    }

    fn contains(&self, original: &Value, rebuilt: &Value) -> bool {
        match (original.node_key(), rebuilt.node_key()) {
            (Some(a), Some(b)) => self.pairs.contains(&(a, b)),
            _ => false,
        }
    }

    /// Patches turning `origin` into `result`
    pub(crate) fn forward(&self, origin: &Value, result: &Value) -> Vec<Patch> {
        let mut out = Vec::new();
        diff(
            origin,
            result,
            &mut ValuePath::root(),
            &mut out,
            &|from, to| self.contains(from, to),
        );
        out
    }

    /// Patches turning `result` back into `origin`
    pub(crate) fn inverse(&self, origin: &Value, result: &Value) -> Vec<Patch> {
        let mut out = Vec::new();
        diff(
            result,
            origin,
            &mut ValuePath::root(),
            &mut out,
            &|from, to| self.contains(to, from),
        );
        out
    }
}

/// Compare `from` against `to`, descending only where `related` says `to`
/// was rebuilt from `from`
fn diff(
    from: &Value,
    to: &Value,
    path: &mut ValuePath,
    out: &mut Vec<Patch>,
    related: &dyn Fn(&Value, &Value) -> bool,
) {
    if from.same(to) {
        return;
    }
    if !related(from, to) {
        out.push(Patch::replace(path.clone(), to.clone()));
        return;
    }
    match (from, to) {
        (Value::Map(old), Value::Map(new)) => {
            // Replay appends added keys, so only a prefix of `new` that keeps
            // its relative order in `old` can stay in place.
            let kept = ordered_prefix(old, new);
            for (key, before) in old.iter() {
                path.push(key.as_str());
                match new.get_full(key) {
                    Some((at, _, after)) if at < kept => diff(before, after, path, out, related),
                    _ => out.push(Patch::remove(path.clone())),
                }
                path.pop();
            }
            for (key, after) in new.iter().skip(kept) {
                out.push(Patch::add(path.child(key.as_str()), after.clone()));
            }
        }
        (Value::Seq(old), Value::Seq(new)) => {
            let common = old.len().min(new.len());
            for index in 0..common {
                path.push(index);
                diff(&old[index], &new[index], path, out, related);
                path.pop();
            }
            for (index, after) in new.iter().enumerate().skip(common) {
                out.push(Patch::add(path.child(index), after.clone()));
            }
            for index in (common..old.len()).rev() {
                out.push(Patch::remove(path.child(index)));
            }
        }
        _ => out.push(Patch::replace(path.clone(), to.clone())),
    }
}

/// Length of the longest prefix of `new` whose keys all exist in `old` in
/// the same relative order
fn ordered_prefix(old: &Mapping, new: &Mapping) -> usize {
    let mut last = None;
    for (kept, key) in new.keys().enumerate() {
        match old.get_index_of(key) {
            Some(at) if last < Some(at) => last = Some(at),
            _ => return kept,
        }
    }
    new.len()
}

/// Apply one non-root patch inside a producer call
pub(crate) fn apply_one(root: Draft<'_>, patch: &Patch) -> Result<(), ProduceError> {
    let path = patch.path();
    let (Some(parent_path), Some(prop)) = (path.parent(), path.last()) else {
        return Err(ProduceError::patch_conflict(path, "root patch inside a batch"));
    };
    let parent = match root.at(&parent_path) {
        Some(DraftValue::Draft(parent)) => parent,
        Some(DraftValue::Value(_)) => {
            return Err(ProduceError::patch_conflict(path, "parent is a leaf"));
        }
        None => return Err(ProduceError::patch_conflict(path, "parent is missing")),
    };

    match patch.op() {
        PatchOp::Add if parent.kind() == ValueKind::Seq => {
            let index = match prop {
                Prop::Key(key) if key == "-" => parent.len(),
                other => other.as_index().ok_or_else(|| ProduceError::InvalidProp {
                    prop: other.clone(),
                    kind: ValueKind::Seq,
                })?,
            };
            parent.insert(index, patch.required_value()?)
        }
        PatchOp::Add => parent.set(prop, patch.required_value()?),
        PatchOp::Replace => {
            if !parent.has(prop) {
                return Err(ProduceError::patch_conflict(path, "nothing to replace"));
            }
            parent.set(prop, patch.required_value()?)
        }
        PatchOp::Remove => {
            if !parent.has(prop) {
                return Err(ProduceError::patch_conflict(path, "nothing to remove"));
            }
            parent.remove(prop);
            Ok(())
        }
    }
}

/// Outcome of a root-level patch, which swaps the whole value
pub(crate) fn apply_root(patch: &Patch) -> Result<Value, ProduceError> {
    match patch.op() {
        PatchOp::Add | PatchOp::Replace => patch.required_value(),
        PatchOp::Remove => Err(ProduceError::patch_conflict(
            patch.path(),
            "cannot remove the root",
        )),
    }
}
