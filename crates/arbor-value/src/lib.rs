//! Arbor Value Model
//!
//! Persistent value trees whose containers are shared by reference.
//!
//! # Core Concepts
//!
//! - [`Value`]: a leaf, a map or a sequence; cloning is shallow
//! - [`Leaf`]: scalars and [`Opaque`] host values, never drafted
//! - [`Value::same`]: identity comparison, the cheap "did this change" check
//! - [`ValuePath`]: JSON Pointer addressing made of [`Prop`] steps
//! - [`Fingerprint`]: Blake3 digest of a tree's contents
//!
//! # Example
//!
//! ```rust
//! use arbor_value::{Fingerprint, Value};
//! use serde_json::json;
//!
//! let tree = Value::from(json!({"a": 1, "b": {"ba": 1}}));
//! let shared = tree.clone();
//!
//! assert!(tree.same(&shared));
//! assert_eq!(tree.get_path(&"/b/ba".parse().unwrap()), Some(&Value::from(1)));
//! assert_eq!(Fingerprint::of(&tree), Fingerprint::of(&shared));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod fingerprint;
mod path;
mod value;

pub use fingerprint::{Fingerprint, FingerprintError};
pub use path::{PathError, Prop, ValuePath};
pub use value::{Leaf, Mapping, NodeKey, Opaque, Sequence, Value, ValueError, ValueKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_and_value_integration() {
        let tree = Value::from(json!({"list": [{"name": "x"}]}));
        let path: ValuePath = "/list/0/name".parse().unwrap();
        assert_eq!(tree.get_path(&path).and_then(Value::as_str), Some("x"));

        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "/list/0");
        assert_eq!(tree.get_path(&parent).map(Value::kind), Some(ValueKind::Map));
    }

    #[test]
    fn fingerprint_ignores_sharing() {
        let child = Value::from(json!({"k": [1, 2, 3]}));
        let shared = Value::seq([child.clone(), child]);
        let copied = Value::from(json!([{"k": [1, 2, 3]}, {"k": [1, 2, 3]}]));
        assert_eq!(Fingerprint::of(&shared), Fingerprint::of(&copied));
    }
}
