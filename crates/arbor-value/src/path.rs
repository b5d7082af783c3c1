//! Paths for addressing nodes inside a value tree
//!
//! Provides [`Prop`], a single property step (map key or sequence index), and
//! [`ValuePath`], a hierarchical address made of props. The text form is an
//! RFC 6901 JSON Pointer.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A single property step: a map key or a sequence index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Prop {
    /// Sequence position
    Index(usize),
    /// Map key
    Key(String),
}

impl Prop {
    /// Index this prop denotes, if any
    ///
    /// A key spelled as a canonical decimal number (`"0"`, `"12"`, never
    /// `"01"`) also denotes an index.
    #[inline]
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(k) => parse_canonical_index(k),
        }
    }

    /// Key this prop denotes; indices are spelled in decimal
    #[inline]
    #[must_use]
    pub fn to_key(&self) -> Cow<'_, str> {
        match self {
            Self::Key(k) => Cow::Borrowed(k.as_str()),
            Self::Index(i) => Cow::Owned(i.to_string()),
        }
    }
}

impl Display for Prop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Prop {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Prop {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&String> for Prop {
    fn from(key: &String) -> Self {
        Self::Key(key.clone())
    }
}

impl From<usize> for Prop {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&Prop> for Prop {
    fn from(prop: &Prop) -> Self {
        prop.clone()
    }
}

fn parse_canonical_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Path within a value tree
///
/// Used to address nodes for reads, patches and error reports.
///
/// # Examples
/// - `[Key("b"), Key("ba")]` → `/b/ba`
/// - `[Index(1), Key("a")]` → `/1/a`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ValuePath(Vec<Prop>);

impl ValuePath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Prop>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<Prop>) -> Self {
        Self(vec![segment.into()])
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Prop] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Prop> {
        self.0.last()
    }

    /// Get first segment (if not root)
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&Prop> {
        self.0.first()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<Prop>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Push a segment in place
    #[inline]
    pub fn push(&mut self, segment: impl Into<Prop>) {
        self.0.push(segment.into());
    }

    /// Pop the last segment in place
    #[inline]
    pub fn pop(&mut self) -> Option<Prop> {
        self.0.pop()
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Prop> {
        self.0.iter()
    }
}

impl Display for ValuePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            f.write_str("/")?;
            match segment {
                Prop::Index(i) => write!(f, "{i}")?,
                Prop::Key(k) => f.write_str(&k.replace('~', "~0").replace('/', "~1"))?,
            }
        }
        Ok(())
    }
}

impl FromStr for ValuePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let rest = s.strip_prefix('/').ok_or_else(|| PathError::MissingLeadingSlash(s.to_string()))?;

        let segments = rest
            .split('/')
            .map(|raw| {
                let key = unescape(raw)?;
                Ok(match parse_canonical_index(&key) {
                    Some(index) => Prop::Index(index),
                    None => Prop::Key(key),
                })
            })
            .collect::<Result<_, PathError>>()?;

        Ok(Self(segments))
    }
}

fn unescape(raw: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PathError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

impl From<Vec<Prop>> for ValuePath {
    fn from(segments: Vec<Prop>) -> Self {
        Self(segments)
    }
}

impl From<&[Prop]> for ValuePath {
    fn from(segments: &[Prop]) -> Self {
        Self(segments.to_vec())
    }
}

impl<'a> IntoIterator for &'a ValuePath {
    type Item = &'a Prop;
    type IntoIter = std::slice::Iter<'a, Prop>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl serde::Serialize for ValuePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ValuePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let pointer = <String as serde::Deserialize>::deserialize(deserializer)?;
        pointer.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to value paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Non-empty pointer without a leading slash
    #[error("pointer '{0}' must be empty or start with '/'")]
    MissingLeadingSlash(String),

    /// `~` not followed by `0` or `1`
    #[error("invalid escape in segment '{0}'")]
    InvalidEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ValuePath {
        s.parse().unwrap()
    }

    #[test]
    fn prop_index_from_canonical_key() {
        assert_eq!(Prop::from("0").as_index(), Some(0));
        assert_eq!(Prop::from("42").as_index(), Some(42));
        assert_eq!(Prop::from("042").as_index(), None);
        assert_eq!(Prop::from("-1").as_index(), None);
        assert_eq!(Prop::from("").as_index(), None);
        assert_eq!(Prop::from(7_usize).as_index(), Some(7));
    }

    #[test]
    fn prop_to_key() {
        assert_eq!(Prop::from(3_usize).to_key(), "3");
        assert_eq!(Prop::from("ba").to_key(), "ba");
    }

    #[test]
    fn path_parent_and_child() {
        let p = ValuePath::root().child("b").child("ba");
        assert_eq!(p.len(), 2);
        assert_eq!(p.parent().unwrap(), ValuePath::single("b"));
        assert_eq!(p.last(), Some(&Prop::from("ba")));
        assert!(ValuePath::root().parent().is_none());
    }

    #[test]
    fn pointer_parses_indices_and_keys() {
        let p = path("/1/a");
        assert_eq!(p.segments(), &[Prop::Index(1), Prop::Key("a".into())]);
    }

    #[test]
    fn pointer_escapes() {
        let p = ValuePath::single("a/b~c");
        assert_eq!(p.to_string(), "/a~1b~0c");
        assert_eq!(path("/a~1b~0c"), p);
    }

    #[test]
    fn pointer_root_and_empty_key() {
        assert!(path("").is_empty());
        assert_eq!(path("/"), ValuePath::single(""));
    }

    #[test]
    fn pointer_errors() {
        assert!(matches!("a/b".parse::<ValuePath>(), Err(PathError::MissingLeadingSlash(_))));
        assert!(matches!("/a~2".parse::<ValuePath>(), Err(PathError::InvalidEscape(_))));
    }

    #[test]
    fn path_serde_uses_pointer() {
        let p = path("/b/0/x");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"/b/0/x\"");
        let back: ValuePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
