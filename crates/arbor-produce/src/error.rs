//! Error types for producers
//!
//! Every failure of a producer call is a [`ProduceError`], except failures
//! raised by the caller's own mutation routine, which surface unchanged
//! through the routine's error type.

use arbor_value::{Prop, ValueKind, ValuePath};

/// Main producer error type
#[derive(Debug, thiserror::Error)]
pub enum ProduceError {
    /// A leaf was offered where a container is required
    #[error("cannot draft a leaf ({kind})")]
    CannotDraftLeaf { kind: ValueKind },

    /// A draft ended up inside its own subtree
    #[error("cycle detected at {path}")]
    CycleDetected { path: ValuePath },

    /// Nesting deeper than the configured limit
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// Property not addressable on this container
    #[error("property '{prop}' is not valid for a {kind}")]
    InvalidProp { prop: Prop, kind: ValueKind },

    /// Write past the end of a sequence
    #[error("index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A draft from a different producer call
    #[error("draft belongs to a different producer call")]
    ForeignDraft,

    /// Patch does not fit the tree it is applied to
    #[error("patch conflict at {path}: {reason}")]
    PatchConflict { path: ValuePath, reason: String },

    /// Mutation routine failed
    #[error("mutation routine failed: {0}")]
    MutationRoutineFailure(#[from] anyhow::Error),
}

impl ProduceError {
    /// Misuse of the draft API by the caller
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::CannotDraftLeaf { .. }
                | Self::InvalidProp { .. }
                | Self::IndexOutOfBounds { .. }
                | Self::ForeignDraft
                | Self::PatchConflict { .. }
        )
    }

    /// The shape of the produced tree cannot be finalized
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. } | Self::DepthLimitExceeded { .. }
        )
    }

    pub(crate) fn patch_conflict(path: &ValuePath, reason: impl Into<String>) -> Self {
        Self::PatchConflict {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}
