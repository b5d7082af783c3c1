//! Producer: the entry point that owns one mutation end to end
//!
//! A call drafts the origin, runs the mutation routine against the draft,
//! then finalizes. The result shares every subtree the routine did not
//! write through, and the origin is never touched.

use crate::config::{ProducerConfig, SequenceRemoval};
use crate::draft::{Draft, Session};
use crate::error::ProduceError;
use crate::finalize::Finalizer;
use crate::patch::{apply_one, apply_root, Patch, Rebuilt};
use crate::registry::{DraftId, Registries};
use arbor_value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Allocation counters of one producer call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceStats {
    /// Containers that got a draft handle
    pub drafts_created: usize,
    /// Containers that got a shallow copy, at write time or during finalization
    pub copies_created: usize,
    /// Nodes built fresh for the result
    pub nodes_rebuilt: usize,
}

/// Result of [`Producer::produce_with_patches`]
#[derive(Debug, Clone)]
pub struct Produced {
    /// The new tree
    pub value: Value,
    /// Patches turning the origin into `value`
    pub patches: Vec<Patch>,
    /// Patches turning `value` back into the origin
    pub inverse_patches: Vec<Patch>,
    /// Allocation counters
    pub stats: ProduceStats,
}

/// Copy-on-write producer
///
/// Holds only configuration; every call gets fresh registries, so one
/// producer can serve many calls, concurrently or not.
#[derive(Debug, Clone, Default)]
pub struct Producer {
    config: ProducerConfig,
}

impl Producer {
    /// Producer with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer with custom configuration
    #[inline]
    #[must_use]
    pub fn with_config(config: ProducerConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Run `mutate` against a draft of `origin` and return the new tree
    ///
    /// When the routine performs no effective write the result is `origin`
    /// itself (same node). A failing routine's error is returned unchanged
    /// and no partial result exists.
    ///
    /// # Errors
    ///
    /// - [`ProduceError::CannotDraftLeaf`] when `origin` is a leaf
    /// - [`ProduceError::CycleDetected`] when a draft ended up in its own subtree
    /// - [`ProduceError::DepthLimitExceeded`] past `max_depth`
    /// - whatever `mutate` returns
    pub fn produce<F, E>(&self, origin: &Value, mutate: F) -> Result<Value, E>
    where
        F: for<'s> FnOnce(Draft<'s>) -> Result<(), E>,
        E: From<ProduceError>,
    {
        self.run(origin, mutate, false).map(|produced| produced.value)
    }

    /// Like [`produce`](Self::produce), also describing the change as patches
    ///
    /// # Errors
    ///
    /// Same as [`produce`](Self::produce).
    pub fn produce_with_patches<F, E>(&self, origin: &Value, mutate: F) -> Result<Produced, E>
    where
        F: for<'s> FnOnce(Draft<'s>) -> Result<(), E>,
        E: From<ProduceError>,
    {
        self.run(origin, mutate, true)
    }

    /// Apply patches to `origin` in order
    ///
    /// Untouched subtrees stay shared with `origin`. A patch at the empty path
    /// swaps the whole value. Sequence removals always shift here, whatever
    /// the configured removal mode, so generated patches replay exactly.
    ///
    /// # Errors
    ///
    /// [`ProduceError::PatchConflict`] when a patch does not fit the tree.
    pub fn apply_patches(&self, origin: &Value, patches: &[Patch]) -> Result<Value, ProduceError> {
        let replay = Self::with_config(
            self.config
                .with_sequence_removal(SequenceRemoval::Shift),
        );
        let mut value = origin.clone();
        let mut rest = patches;
        while !rest.is_empty() {
            let split = rest
                .iter()
                .position(|patch| patch.path().is_empty())
                .unwrap_or(rest.len());
            let (batch, tail) = rest.split_at(split);
            if !batch.is_empty() {
                value = replay.produce(&value, |root| {
                    batch.iter().try_for_each(|patch| apply_one(root, patch))
                })?;
            }
            rest = match tail.split_first() {
                Some((whole, tail)) => {
                    value = apply_root(whole)?;
                    tail
                }
                None => tail,
            };
        }
        Ok(value)
    }

    fn run<F, E>(&self, origin: &Value, mutate: F, with_patches: bool) -> Result<Produced, E>
    where
        F: for<'s> FnOnce(Draft<'s>) -> Result<(), E>,
        E: From<ProduceError>,
    {
        let span = tracing::debug_span!("produce", kind = %origin.kind());
        let _enter = span.enter();

        let session = Session::new(self.config);
        let root = session.root(origin)?;
        if let Err(err) = mutate(root) {
            tracing::debug!("mutation routine failed, origin left untouched");
            return Err(err);
        }

        let mut registries = session.into_registries();
        let (value, nodes_rebuilt, memo) = self.finalize(&mut registries, origin)?;

        let (patches, inverse_patches) = if with_patches {
            let rebuilt = Rebuilt::collect(&registries, &memo);
            (
                rebuilt.forward(origin, &value),
                rebuilt.inverse(origin, &value),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let stats = ProduceStats {
            drafts_created: registries.drafts_created(),
            copies_created: registries.copies_created(),
            nodes_rebuilt,
        };
        tracing::debug!(
            drafts = stats.drafts_created,
            copies = stats.copies_created,
            rebuilt = stats.nodes_rebuilt,
            unchanged = value.same(origin),
            "produce finished"
        );

        Ok(Produced {
            value,
            patches,
            inverse_patches,
            stats,
        })
    }

    fn finalize(
        &self,
        registries: &mut Registries,
        origin: &Value,
    ) -> Result<(Value, usize, HashMap<DraftId, Value>), ProduceError> {
        let mut finalizer = Finalizer::new(registries, self.config.max_depth);
        let value = finalizer.finalize(origin)?;
        let rebuilt = finalizer.rebuilt();
        Ok((value, rebuilt, finalizer.into_memo()))
    }
}
