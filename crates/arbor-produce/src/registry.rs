//! Call-scoped identity registries
//!
//! Each container reached during one producer call is ingested once and gets
//! a dense [`DraftId`]. The draft registry maps node identity to that handle;
//! the copy store holds, per handle, the shallow copy created on first write.
//! Both are dropped with the call.

use crate::config::SequenceRemoval;
use crate::error::ProduceError;
use arbor_value::{Mapping, NodeKey, Prop, Sequence, Value, ValueKind};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle of a drafted base within one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DraftId(usize);

impl DraftId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A drafted container, kept alive for the whole call
#[derive(Debug, Clone)]
pub(crate) enum Base {
    Map(Arc<Mapping>),
    Seq(Arc<Sequence>),
}

impl Base {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(m) => Some(Self::Map(Arc::clone(m))),
            Value::Seq(s) => Some(Self::Seq(Arc::clone(s))),
            Value::Leaf(_) => None,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            Self::Map(m) => Value::Map(Arc::clone(m)),
            Self::Seq(s) => Value::Seq(Arc::clone(s)),
        }
    }

    pub(crate) fn kind(&self) -> ValueKind {
        match self {
            Self::Map(_) => ValueKind::Map,
            Self::Seq(_) => ValueKind::Seq,
        }
    }
}

/// Entry of a copy: an untouched value or a reference to another draft
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Plain(Value),
    Draft(DraftId),
}

/// Shallow clone of a base; children are shared, not copied
#[derive(Debug, Clone)]
pub(crate) enum Shallow {
    Map(IndexMap<String, Slot>),
    Seq(Vec<Slot>),
}

impl Shallow {
    fn of(base: &Base) -> Self {
        match base {
            Base::Map(m) => Self::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), Slot::Plain(v.clone())))
                    .collect(),
            ),
            Base::Seq(items) => Self::Seq(items.iter().cloned().map(Slot::Plain).collect()),
        }
    }
}

/// A read resolved through the draft factory
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Node(DraftId),
    Leaf(Value),
}

/// Draft registry and copy store of one producer call
#[derive(Debug, Default)]
pub(crate) struct Registries {
    drafts: HashMap<NodeKey, DraftId>,
    bases: Vec<Base>,
    copies: Vec<Option<Shallow>>,
    copies_created: usize,
}

impl Registries {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Handle of an already drafted container
    pub(crate) fn lookup(&self, value: &Value) -> Option<DraftId> {
        value.node_key().and_then(|key| self.drafts.get(&key).copied())
    }

    /// Draft factory: the handle for `value`, created on first request
    ///
    /// Leaves are never registered and yield `None`.
    pub(crate) fn draft_of(&mut self, value: &Value) -> Option<DraftId> {
        let key = value.node_key()?;
        if let Some(id) = self.drafts.get(&key) {
            return Some(*id);
        }
        let base = Base::from_value(value)?;
        let id = DraftId(self.bases.len());
        tracing::trace!(draft = id.0, kind = %base.kind(), "draft created");
        self.bases.push(base);
        self.copies.push(None);
        self.drafts.insert(key, id);
        Some(id)
    }

    /// Route a slot through the draft factory
    pub(crate) fn resolve(&mut self, slot: Slot) -> Resolved {
        match slot {
            Slot::Draft(id) => Resolved::Node(id),
            Slot::Plain(value) => match self.draft_of(&value) {
                Some(id) => Resolved::Node(id),
                None => Resolved::Leaf(value),
            },
        }
    }

    /// Whether two slots denote the same node, or equal leaves
    ///
    /// A plain container and a draft denote the same node when the draft was
    /// created over it. Nothing gets drafted by asking.
    pub(crate) fn denotes_same(&self, a: &Slot, b: &Slot) -> bool {
        match (a, b) {
            (Slot::Draft(x), Slot::Draft(y)) => x == y,
            (Slot::Plain(value), Slot::Draft(id)) | (Slot::Draft(id), Slot::Plain(value)) => {
                self.lookup(value) == Some(*id)
            }
            (Slot::Plain(x), Slot::Plain(y)) => x.same(y),
        }
    }

    pub(crate) fn base(&self, id: DraftId) -> &Base {
        &self.bases[id.0]
    }

    pub(crate) fn has_copy(&self, id: DraftId) -> bool {
        self.copies[id.0].is_some()
    }

    /// Obtain the copy for `id`, cloning it from the base on first use
    pub(crate) fn copy_mut(&mut self, id: DraftId) -> &mut Shallow {
        let bases = &self.bases;
        let created = &mut self.copies_created;
        self.copies[id.0].get_or_insert_with(|| {
            *created += 1;
            tracing::trace!(draft = id.0, "copy created");
            Shallow::of(&bases[id.0])
        })
    }

    /// Contents of the current source: the copy if present, else the base
    pub(crate) fn source(&self, id: DraftId) -> Shallow {
        match &self.copies[id.0] {
            Some(copy) => copy.clone(),
            None => Shallow::of(&self.bases[id.0]),
        }
    }

    /// Read `prop` from the current source
    pub(crate) fn source_get(&self, id: DraftId, prop: &Prop) -> Option<Slot> {
        match &self.copies[id.0] {
            Some(Shallow::Map(m)) => m.get(prop.to_key().as_ref()).cloned(),
            Some(Shallow::Seq(items)) => prop.as_index().and_then(|i| items.get(i)).cloned(),
            None => self.bases[id.0]
                .to_value()
                .get(prop)
                .cloned()
                .map(Slot::Plain),
        }
    }

    pub(crate) fn source_has(&self, id: DraftId, prop: &Prop) -> bool {
        match &self.copies[id.0] {
            Some(Shallow::Map(m)) => m.contains_key(prop.to_key().as_ref()),
            Some(Shallow::Seq(items)) => prop.as_index().is_some_and(|i| i < items.len()),
            None => self.bases[id.0].to_value().contains(prop),
        }
    }

    pub(crate) fn source_len(&self, id: DraftId) -> usize {
        match &self.copies[id.0] {
            Some(Shallow::Map(m)) => m.len(),
            Some(Shallow::Seq(items)) => items.len(),
            None => self.bases[id.0].to_value().len(),
        }
    }

    pub(crate) fn source_props(&self, id: DraftId) -> Vec<Prop> {
        match &self.copies[id.0] {
            Some(Shallow::Map(m)) => m.keys().map(|k| Prop::Key(k.clone())).collect(),
            Some(Shallow::Seq(items)) => (0..items.len()).map(Prop::Index).collect(),
            None => self.bases[id.0].to_value().props(),
        }
    }

    /// Write `slot` at `prop`, creating the copy on first touch
    ///
    /// Sequences accept any existing index or exactly their length, which
    /// appends. Validation happens before the copy is created.
    pub(crate) fn write(&mut self, id: DraftId, prop: &Prop, slot: Slot) -> Result<(), ProduceError> {
        match self.base(id).kind() {
            ValueKind::Seq => {
                let index = seq_index(prop)?;
                let len = self.source_len(id);
                if index > len {
                    return Err(ProduceError::IndexOutOfBounds { index, len });
                }
                if let Shallow::Seq(items) = self.copy_mut(id) {
                    if index == len {
                        items.push(slot);
                    } else {
                        items[index] = slot;
                    }
                }
            }
            _ => {
                let key = prop.to_key().into_owned();
                if let Shallow::Map(m) = self.copy_mut(id) {
                    m.insert(key, slot);
                }
            }
        }
        Ok(())
    }

    /// Insert into a sequence, shifting later elements right
    pub(crate) fn insert(&mut self, id: DraftId, index: usize, slot: Slot) -> Result<(), ProduceError> {
        let kind = self.base(id).kind();
        if kind != ValueKind::Seq {
            return Err(ProduceError::InvalidProp {
                prop: Prop::Index(index),
                kind,
            });
        }
        let len = self.source_len(id);
        if index > len {
            return Err(ProduceError::IndexOutOfBounds { index, len });
        }
        if let Shallow::Seq(items) = self.copy_mut(id) {
            items.insert(index, slot);
        }
        Ok(())
    }

    /// Delete `prop`; absent props leave the registries untouched
    pub(crate) fn delete(&mut self, id: DraftId, prop: &Prop, removal: SequenceRemoval) {
        if !self.source_has(id, prop) {
            return;
        }
        match self.copy_mut(id) {
            Shallow::Map(m) => {
                m.shift_remove(prop.to_key().as_ref());
            }
            Shallow::Seq(items) => {
                let Some(index) = prop.as_index() else { return };
                match removal {
                    SequenceRemoval::Shift => {
                        items.remove(index);
                    }
                    SequenceRemoval::Hole => items[index] = Slot::Plain(Value::null()),
                }
            }
        }
    }

    pub(crate) fn drafts_created(&self) -> usize {
        self.bases.len()
    }

    pub(crate) fn copies_created(&self) -> usize {
        self.copies_created
    }
}

fn seq_index(prop: &Prop) -> Result<usize, ProduceError> {
    prop.as_index().ok_or_else(|| ProduceError::InvalidProp {
        prop: prop.clone(),
        kind: ValueKind::Seq,
    })
}
