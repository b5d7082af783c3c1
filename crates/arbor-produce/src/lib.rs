//! Arbor Produce - copy-on-write producers over persistent trees
//!
//! A producer hands a mutation routine a [`Draft`] of an immutable tree. The
//! routine reads and writes the draft as if it owned the tree; only the
//! containers it actually writes get copied, and the result shares every
//! untouched subtree with the original by reference.
//!
//! - Drafts are created lazily, once per container per call
//! - The first effective write to a container makes its shallow copy
//! - Finalization rebuilds only the path from the root to each write
//! - Patches and inverse patches describe the change for replay or undo
//!
//! # Example
//!
//! ```rust
//! use arbor_produce::produce;
//! use arbor_value::{Prop, Value};
//! use serde_json::json;
//!
//! let origin = Value::from(json!({"a": 1, "b": {"ba": 1}, "c": {"ca": 1}}));
//!
//! let result = produce(&origin, |root| {
//!     let b = root.child("b").expect("b is a map");
//!     b.set("ba", 2)
//! })?;
//!
//! let c = Prop::from("c");
//! assert!(result.get(&c).unwrap().same(origin.get(&c).unwrap()));
//! assert_eq!(result.get_path(&"/b/ba".parse()?), Some(&Value::from(2)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod draft;
pub mod error;
pub mod patch;
pub mod producer;

// Call internals
mod detect;
mod finalize;
mod registry;

// Re-exports for convenience
pub use config::{ProducerConfig, SequenceRemoval, DEFAULT_MAX_DEPTH};
pub use draft::{Draft, DraftValue};
pub use error::ProduceError;
pub use patch::{Patch, PatchOp};
pub use producer::{ProduceStats, Produced, Producer};

use arbor_value::Value;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing producers
    pub use crate::{
        apply_patches, produce, produce_with_patches, Draft, DraftValue, Patch, PatchOp,
        ProduceError, Producer, ProducerConfig,
    };
    pub use arbor_value::{Prop, Value, ValuePath};
}

/// Whether `value` can be drafted: maps and sequences are, everything else
/// is a leaf
#[inline]
#[must_use]
pub fn is_container(value: &Value) -> bool {
    value.is_container()
}

/// [`Producer::produce`] with default configuration
///
/// # Errors
///
/// See [`Producer::produce`].
pub fn produce<F, E>(origin: &Value, mutate: F) -> Result<Value, E>
where
    F: for<'s> FnOnce(Draft<'s>) -> Result<(), E>,
    E: From<ProduceError>,
{
    Producer::new().produce(origin, mutate)
}

/// [`Producer::produce_with_patches`] with default configuration
///
/// # Errors
///
/// See [`Producer::produce`].
pub fn produce_with_patches<F, E>(origin: &Value, mutate: F) -> Result<Produced, E>
where
    F: for<'s> FnOnce(Draft<'s>) -> Result<(), E>,
    E: From<ProduceError>,
{
    Producer::new().produce_with_patches(origin, mutate)
}

/// [`Producer::apply_patches`] with default configuration
///
/// # Errors
///
/// See [`Producer::apply_patches`].
pub fn apply_patches(origin: &Value, patches: &[Patch]) -> Result<Value, ProduceError> {
    Producer::new().apply_patches(origin, patches)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
