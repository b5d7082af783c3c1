//! Draft handles: the mutable view of a tree during one producer call
//!
//! A [`Draft`] stands for one container of the original tree (or one
//! attached during the call). Reads go to the copy when one exists and to the
//! original otherwise; the first effective write clones the container
//! shallowly and every later write lands in that clone. Nested reads hand out
//! further drafts, so the whole tree can be edited through the root handle.

use crate::config::ProducerConfig;
use crate::detect::has_changed;
use crate::error::ProduceError;
use crate::finalize::Finalizer;
use crate::registry::{DraftId, Registries, Resolved, Slot};
use arbor_value::{Leaf, Prop, Value, ValueKind, ValuePath};
use std::cell::{RefCell, RefMut};
use std::fmt::{self, Debug};

/// State owned by one producer call
pub(crate) struct Session {
    config: ProducerConfig,
    registries: RefCell<Registries>,
}

impl Session {
    pub(crate) fn new(config: ProducerConfig) -> Self {
        Self {
            config,
            registries: RefCell::new(Registries::new()),
        }
    }

    pub(crate) fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Draft the origin of the call
    pub(crate) fn root(&self, origin: &Value) -> Result<Draft<'_>, ProduceError> {
        match self.registries().draft_of(origin) {
            Some(id) => Ok(Draft { session: self, id }),
            None => Err(ProduceError::CannotDraftLeaf {
                kind: origin.kind(),
            }),
        }
    }

    pub(crate) fn into_registries(self) -> Registries {
        self.registries.into_inner()
    }

    fn registries(&self) -> RefMut<'_, Registries> {
        self.registries.borrow_mut()
    }
}

/// Mutable handle over a container for the duration of a producer call
///
/// Handles are cheap to copy and compare by identity: two handles obtained
/// for the same node in the same call are equal. The lifetime ties a handle
/// to its call, so it cannot be kept after the call returns.
#[derive(Clone, Copy)]
pub struct Draft<'s> {
    session: &'s Session,
    id: DraftId,
}

impl<'s> Draft<'s> {
    /// Kind of the drafted container, `Map` or `Seq`
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.session.registries().base(self.id).kind()
    }

    /// Read a property
    ///
    /// Containers come back as drafts, leaves as plain values. `None` when
    /// the property is absent.
    #[must_use]
    pub fn get(&self, prop: impl Into<Prop>) -> Option<DraftValue<'s>> {
        let prop = prop.into();
        let resolved = {
            let mut reg = self.session.registries();
            let slot = reg.source_get(self.id, &prop)?;
            reg.resolve(slot)
        };
        Some(self.wrap(resolved))
    }

    /// Read a property that holds a container
    #[must_use]
    pub fn child(&self, prop: impl Into<Prop>) -> Option<Draft<'s>> {
        self.get(prop).and_then(|value| value.as_draft())
    }

    /// Read a nested property; the empty path is this draft
    #[must_use]
    pub fn at(&self, path: &ValuePath) -> Option<DraftValue<'s>> {
        let mut current = DraftValue::Draft(*self);
        for prop in path {
            current = current.as_draft()?.get(prop)?;
        }
        Some(current)
    }

    /// Membership test against the current contents
    #[must_use]
    pub fn has(&self, prop: impl Into<Prop>) -> bool {
        self.session.registries().source_has(self.id, &prop.into())
    }

    /// Number of entries currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.session.registries().source_len(self.id)
    }

    /// Whether the container currently holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current keys or indices, in order
    #[must_use]
    pub fn props(&self) -> Vec<Prop> {
        self.session.registries().source_props(self.id)
    }

    /// Write a property
    ///
    /// Writing a value that already denotes what the property holds is a
    /// no-op and allocates nothing. On a sequence, writing index `len`
    /// appends.
    ///
    /// # Errors
    ///
    /// - [`ProduceError::ForeignDraft`] for a draft of another call
    /// - [`ProduceError::InvalidProp`] for a non-index key on a sequence
    /// - [`ProduceError::IndexOutOfBounds`] past the end of a sequence
    pub fn set<'o>(
        &self,
        prop: impl Into<Prop>,
        value: impl Into<DraftValue<'o>>,
    ) -> Result<(), ProduceError> {
        let prop = prop.into();
        let incoming = self.incoming(value.into())?;
        let mut reg = self.session.registries();
        if let Some(current) = reg.source_get(self.id, &prop) {
            if reg.denotes_same(&current, &incoming) {
                return Ok(());
            }
        }
        reg.write(self.id, &prop, incoming)
    }

    /// Delete a property
    ///
    /// Always succeeds. Deleting an absent property changes nothing. On a
    /// sequence the configured [`SequenceRemoval`](crate::SequenceRemoval)
    /// decides whether later elements shift.
    pub fn remove(&self, prop: impl Into<Prop>) {
        let removal = self.session.config().sequence_removal;
        self.session
            .registries()
            .delete(self.id, &prop.into(), removal);
    }

    /// Append to a sequence
    ///
    /// # Errors
    ///
    /// [`ProduceError::InvalidProp`] on a map, [`ProduceError::ForeignDraft`]
    /// for a draft of another call.
    pub fn push<'o>(&self, value: impl Into<DraftValue<'o>>) -> Result<(), ProduceError> {
        let len = self.len();
        self.insert(len, value)
    }

    /// Insert into a sequence, shifting later elements right
    ///
    /// # Errors
    ///
    /// [`ProduceError::InvalidProp`] on a map,
    /// [`ProduceError::IndexOutOfBounds`] when `index > len`,
    /// [`ProduceError::ForeignDraft`] for a draft of another call.
    pub fn insert<'o>(
        &self,
        index: usize,
        value: impl Into<DraftValue<'o>>,
    ) -> Result<(), ProduceError> {
        let incoming = self.incoming(value.into())?;
        self.session.registries().insert(self.id, index, incoming)
    }

    /// The container this draft was created over, as it was
    #[must_use]
    pub fn original(&self) -> Value {
        self.session.registries().base(self.id).to_value()
    }

    /// Draft-free snapshot of the current contents
    ///
    /// Unchanged parts are shared with the original. Taking a snapshot
    /// creates no copies.
    ///
    /// # Errors
    ///
    /// [`ProduceError::CycleDetected`] when a draft was placed inside its own
    /// subtree, [`ProduceError::DepthLimitExceeded`] past the configured depth.
    pub fn current(&self) -> Result<Value, ProduceError> {
        let limit = self.session.config().max_depth;
        let mut reg = self.session.registries();
        let snapshot = Finalizer::snapshot(&mut reg, limit).finalize_draft(self.id);
        snapshot
    }

    /// Whether this container or anything below it was written
    #[must_use]
    pub fn is_modified(&self) -> bool {
        let reg = self.session.registries();
        let base = reg.base(self.id).to_value();
        has_changed(&reg, &base)
    }

    /// Whether both handles stand for the same node of the same call
    #[must_use]
    pub fn same_as(&self, other: &Draft<'_>) -> bool {
        std::ptr::eq(self.session, other.session) && self.id == other.id
    }

    fn wrap(&self, resolved: Resolved) -> DraftValue<'s> {
        match resolved {
            Resolved::Node(id) => DraftValue::Draft(Draft {
                session: self.session,
                id,
            }),
            Resolved::Leaf(value) => DraftValue::Value(value),
        }
    }

    fn incoming(&self, value: DraftValue<'_>) -> Result<Slot, ProduceError> {
        match value {
            DraftValue::Draft(draft) if std::ptr::eq(draft.session, self.session) => {
                Ok(Slot::Draft(draft.id))
            }
            DraftValue::Draft(_) => Err(ProduceError::ForeignDraft),
            DraftValue::Value(value) => Ok(Slot::Plain(value)),
        }
    }
}

impl PartialEq for Draft<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Draft<'_> {}

impl Debug for Draft<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("id", &self.id.index())
            .field("kind", &self.kind())
            .finish()
    }
}

/// What a draft read yields, and what a draft write accepts
#[derive(Debug, Clone, PartialEq)]
pub enum DraftValue<'s> {
    /// A container of the current call
    Draft(Draft<'s>),
    /// A plain value; reads only produce leaves here
    Value(Value),
}

impl<'s> DraftValue<'s> {
    #[must_use]
    pub fn as_draft(&self) -> Option<Draft<'s>> {
        match self {
            Self::Draft(draft) => Some(*draft),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Draft(_) => None,
            Self::Value(value) => Some(value),
        }
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Plain value, snapshotting drafts through [`Draft::current`]
    ///
    /// # Errors
    ///
    /// Same as [`Draft::current`].
    pub fn to_value(&self) -> Result<Value, ProduceError> {
        match self {
            Self::Draft(draft) => draft.current(),
            Self::Value(value) => Ok(value.clone()),
        }
    }
}

impl<'s> From<Draft<'s>> for DraftValue<'s> {
    fn from(draft: Draft<'s>) -> Self {
        Self::Draft(draft)
    }
}

impl From<Value> for DraftValue<'_> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&Value> for DraftValue<'_> {
    fn from(value: &Value) -> Self {
        Self::Value(value.clone())
    }
}

macro_rules! draft_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DraftValue<'_> {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

draft_value_from!(Leaf, bool, i64, i32, f64, &str, String);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session::new(ProducerConfig::default())
    }

    #[test]
    fn leaf_origin_cannot_be_drafted() {
        let session = session();
        let err = session.root(&Value::from(3)).unwrap_err();
        assert!(matches!(
            err,
            ProduceError::CannotDraftLeaf {
                kind: ValueKind::Int
            }
        ));
    }

    #[test]
    fn nested_reads_are_idempotent() {
        let origin = Value::from(json!({"b": {"ba": 1}}));
        let session = session();
        let root = session.root(&origin).unwrap();

        let first = root.child("b").unwrap();
        let again = root.child("b").unwrap();
        assert_eq!(first, again);
        assert_eq!(first.get("ba").and_then(|v| v.as_i64()), Some(1));
        assert!(root.get("missing").is_none());
    }

    #[test]
    fn reads_do_not_copy() {
        let origin = Value::from(json!({"b": {"ba": 1}, "list": [1, 2]}));
        let session = session();
        let root = session.root(&origin).unwrap();
        let _ = root.at(&"/b/ba".parse().unwrap());
        let _ = root.props();
        assert!(!root.is_modified());
        assert_eq!(session.into_registries().copies_created(), 0);
    }

    #[test]
    fn redundant_writes_copy_nothing() {
        let origin = Value::from(json!({"a": 1, "b": {"ba": 1}}));
        let session = session();
        let root = session.root(&origin).unwrap();

        root.set("a", 1).unwrap();
        let b = root.get("b").unwrap();
        root.set("b", b).unwrap();
        root.set("b", origin.get(&Prop::from("b")).unwrap()).unwrap();
        assert!(!root.is_modified());
        assert_eq!(session.into_registries().copies_created(), 0);
    }

    #[test]
    fn writes_are_visible_to_later_reads() {
        let origin = Value::from(json!({"b": {"ba": 1}}));
        let session = session();
        let root = session.root(&origin).unwrap();
        let b = root.child("b").unwrap();

        b.set("ba", 2).unwrap();
        b.set("bb", "new").unwrap();
        assert_eq!(b.get("ba").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(b.get("bb").and_then(|v| v.as_str().map(str::to_owned)), Some("new".into()));
        assert!(b.is_modified());
        assert!(root.is_modified());
        assert_eq!(b.original(), Value::from(json!({"ba": 1})));
        assert_eq!(b.current().unwrap(), Value::from(json!({"ba": 2, "bb": "new"})));
    }

    #[test]
    fn sequence_operations() {
        let origin = Value::from(json!([1, 2]));
        let session = session();
        let root = session.root(&origin).unwrap();

        root.push(3).unwrap();
        root.insert(0, 0).unwrap();
        root.set(4_usize, 4).unwrap();
        assert!(matches!(
            root.set(9_usize, 9),
            Err(ProduceError::IndexOutOfBounds { index: 9, len: 5 })
        ));
        assert!(matches!(
            root.set("x", 1),
            Err(ProduceError::InvalidProp { .. })
        ));
        root.remove(0_usize);
        assert_eq!(root.current().unwrap(), Value::from(json!([1, 2, 3, 4])));
    }

    #[test]
    fn push_on_map_is_invalid() {
        let origin = Value::from(json!({}));
        let session = session();
        let root = session.root(&origin).unwrap();
        assert!(matches!(
            root.push(1),
            Err(ProduceError::InvalidProp {
                kind: ValueKind::Map,
                ..
            })
        ));
    }

    #[test]
    fn drafts_of_another_session_are_rejected() {
        let origin = Value::from(json!({"b": {}}));
        let outer = session();
        let inner = session();
        let outer_root = outer.root(&origin).unwrap();
        let inner_root = inner.root(&origin).unwrap();

        assert!(!outer_root.same_as(&inner_root));
        assert!(matches!(
            inner_root.set("x", outer_root),
            Err(ProduceError::ForeignDraft)
        ));
        assert!(!inner_root.is_modified());
    }

    #[test]
    fn draft_value_conversions() {
        assert_eq!(DraftValue::from(1).as_i64(), Some(1));
        assert_eq!(DraftValue::from("x").as_str(), Some("x"));
        assert!(!DraftValue::from(true).is_draft());
        assert_eq!(
            DraftValue::from(Leaf::Null).to_value().unwrap(),
            Value::null()
        );
    }
}
