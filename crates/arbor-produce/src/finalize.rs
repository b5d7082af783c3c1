//! Finalization: turning drafts and copies back into a plain tree
//!
//! Unchanged nodes come back by reference. A changed node is rebuilt from its
//! copy (materialized first when only a descendant was written) with every
//! child finalized in turn, so fresh nodes appear only along the paths that
//! lead to writes.

use crate::detect::has_changed;
use crate::error::ProduceError;
use crate::registry::{DraftId, Registries, Shallow, Slot};
use arbor_value::{Mapping, Prop, Value, ValuePath};
use std::collections::{HashMap, HashSet};

/// One finalization pass over a call's registries
pub(crate) struct Finalizer<'r> {
    registries: &'r mut Registries,
    limit: usize,
    materialize: bool,
    memo: HashMap<DraftId, Value>,
    active: HashSet<DraftId>,
    path: ValuePath,
    rebuilt: usize,
}

impl<'r> Finalizer<'r> {
    /// Finalizer for the end of a producer call
    pub(crate) fn new(registries: &'r mut Registries, limit: usize) -> Self {
        Self::with_mode(registries, limit, true)
    }

    /// Read-only variant used for mid-call snapshots; never creates copies
    pub(crate) fn snapshot(registries: &'r mut Registries, limit: usize) -> Self {
        Self::with_mode(registries, limit, false)
    }

    fn with_mode(registries: &'r mut Registries, limit: usize, materialize: bool) -> Self {
        Self {
            registries,
            limit,
            materialize,
            memo: HashMap::new(),
            active: HashSet::new(),
            path: ValuePath::root(),
            rebuilt: 0,
        }
    }

    /// Finalize a plain value
    pub(crate) fn finalize(&mut self, value: &Value) -> Result<Value, ProduceError> {
        match self.registries.lookup(value) {
            Some(id) => self.finalize_draft(id),
            None => Ok(value.clone()),
        }
    }

    /// Finalize the node behind a draft handle
    pub(crate) fn finalize_draft(&mut self, id: DraftId) -> Result<Value, ProduceError> {
        if let Some(done) = self.memo.get(&id) {
            return Ok(done.clone());
        }
        if self.active.contains(&id) {
            return Err(ProduceError::CycleDetected {
                path: self.path.clone(),
            });
        }

        let base = self.registries.base(id).to_value();
        if !has_changed(self.registries, &base) {
            self.memo.insert(id, base.clone());
            return Ok(base);
        }
        // only nodes that get rebuilt count against the limit
        if self.path.len() >= self.limit {
            return Err(ProduceError::DepthLimitExceeded { limit: self.limit });
        }

        if self.materialize {
            self.registries.copy_mut(id);
        }
        let source = self.registries.source(id);

        self.active.insert(id);
        let rebuilt = self.rebuild(&source);
        self.active.remove(&id);

        let value = rebuilt?;
        self.rebuilt += 1;
        self.memo.insert(id, value.clone());
        Ok(value)
    }

    fn rebuild(&mut self, source: &Shallow) -> Result<Value, ProduceError> {
        match source {
            Shallow::Map(entries) => {
                let mut out = Mapping::with_capacity(entries.len());
                for (key, slot) in entries {
                    self.path.push(key.as_str());
                    let child = self.finalize_slot(slot);
                    self.path.pop();
                    out.insert(key.clone(), child?);
                }
                Ok(Value::from(out))
            }
            Shallow::Seq(slots) => {
                let mut out = Vec::with_capacity(slots.len());
                for (index, slot) in slots.iter().enumerate() {
                    self.path.push(Prop::Index(index));
                    let child = self.finalize_slot(slot);
                    self.path.pop();
                    out.push(child?);
                }
                Ok(Value::from(out))
            }
        }
    }

    fn finalize_slot(&mut self, slot: &Slot) -> Result<Value, ProduceError> {
        match slot {
            Slot::Plain(value) => self.finalize(value),
            Slot::Draft(id) => self.finalize_draft(*id),
        }
    }

    /// Number of nodes built fresh so far
    pub(crate) fn rebuilt(&self) -> usize {
        self.rebuilt
    }

    /// Finalized value of every draft visited
    pub(crate) fn into_memo(self) -> HashMap<DraftId, Value> {
        self.memo
    }
}
