//! Structural fingerprints of value trees
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest of a tree's shape and
//! contents. Two trees with equal contents have equal fingerprints whether or
//! not they share nodes.

use crate::value::{Leaf, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_OPAQUE: u8 = 5;
const TAG_MAP: u8 = 6;
const TAG_SEQ: u8 = 7;

/// A 32-byte structural hash (Blake3)
///
/// Opaque leaves contribute their type name and identity, so a fingerprint
/// of a tree holding opaque leaves is only stable within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create a fingerprint from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fingerprint of a whole tree
    #[must_use]
    pub fn of(value: &Value) -> Self {
        let mut hasher = blake3::Hasher::new();
        feed(&mut hasher, value);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create fingerprint from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| FingerprintError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

fn feed(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Leaf(Leaf::Null) => {
            hasher.update(&[TAG_NULL]);
        }
        Value::Leaf(Leaf::Bool(b)) => {
            hasher.update(&[TAG_BOOL, u8::from(*b)]);
        }
        Value::Leaf(Leaf::Int(i)) => {
            hasher.update(&[TAG_INT]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Leaf(Leaf::Float(x)) => {
            hasher.update(&[TAG_FLOAT]);
            hasher.update(&x.to_bits().to_le_bytes());
        }
        Value::Leaf(Leaf::Str(s)) => {
            hasher.update(&[TAG_STR]);
            feed_bytes(hasher, s.as_bytes());
        }
        Value::Leaf(Leaf::Opaque(o)) => {
            hasher.update(&[TAG_OPAQUE]);
            feed_bytes(hasher, o.type_name().as_bytes());
            hasher.update(&(o.addr() as u64).to_le_bytes());
        }
        Value::Map(m) => {
            hasher.update(&[TAG_MAP]);
            hasher.update(&(m.len() as u64).to_le_bytes());
            for (k, v) in m.iter() {
                feed_bytes(hasher, k.as_bytes());
                feed(hasher, v);
            }
        }
        Value::Seq(items) => {
            hasher.update(&[TAG_SEQ]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items.iter() {
                feed(hasher, item);
            }
        }
    }
}

// Length prefix keeps adjacent strings from running together.
fn feed_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FingerprintVisitor;

        impl serde::de::Visitor<'_> for FingerprintVisitor {
            type Value = Fingerprint;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a 32-byte fingerprint as hex string or bytes")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Fingerprint::from_slice(value).map_err(serde::de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(FingerprintVisitor)
        } else {
            deserializer.deserialize_bytes(FingerprintVisitor)
        }
    }
}

/// Errors that can occur when parsing fingerprints
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Invalid length
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
