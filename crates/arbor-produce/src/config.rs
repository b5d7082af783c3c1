//! Producer configuration

use serde::{Deserialize, Serialize};

/// Default recursion limit for finalization and change detection
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// How removing an index from a sequence behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceRemoval {
    /// Later elements shift left
    #[default]
    Shift,
    /// The slot becomes null; length and positions are kept
    Hole,
}

/// Producer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Deepest nesting the finalizer and change detector will walk
    pub max_depth: usize,
    /// Removal behavior for sequences
    pub sequence_removal: SequenceRemoval,
}

impl ProducerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With recursion limit
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// With sequence removal behavior
    #[inline]
    #[must_use]
    pub fn with_sequence_removal(mut self, removal: SequenceRemoval) -> Self {
        self.sequence_removal = removal;
        self
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            sequence_removal: SequenceRemoval::Shift,
        }
    }
}
