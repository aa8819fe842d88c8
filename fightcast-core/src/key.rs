//! Query key types and construction.
//!
//! - [`QueryKey`] - The complete query key with prefix, version, and parts
//! - [`KeyPart`] - A single key-value component of a query key
//!
//! ## Key Structure
//!
//! Query keys have three components:
//!
//! 1. **Prefix** - The key class, used to select per-class cache policy
//! 2. **Version** - Numeric version for invalidating every key of a class at once
//! 3. **Parts** - Ordered list of key-value pairs naming the query and its input
//!
//! Two keys are equal iff all three components are structurally equal.
//!
//! ## Format
//!
//! `{prefix}:v{version}:key1=value1&key2`
//!
//! - Prefix is omitted if empty
//! - Version is omitted if zero
//!
//! ```
//! use fightcast_core::{QueryKey, KeyPart};
//!
//! let key = QueryKey::new("predictor", 0, vec![KeyPart::new("getFights", None::<&str>)]);
//! assert_eq!(format!("{}", key), "predictor:getFights");
//!
//! let key = QueryKey::new("predictor", 2, vec![KeyPart::new("event", Some("ufc-300"))]);
//! assert_eq!(format!("{}", key), "predictor:v2:event=ufc-300");
//! ```

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Inner structure containing the actual key data.
/// Wrapped in Arc for cheap cloning.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
struct QueryKeyInner {
    prefix: SmolStr,
    #[serde(default)]
    version: u32,
    parts: Vec<KeyPart>,
}

/// A query key identifying one cache entry.
///
/// `QueryKey` wraps its data in [`Arc`], so `clone()` only increments a
/// reference count. Keys are cloned on every cache access and into every
/// spawned loader task.
///
/// # Example
///
/// ```
/// use fightcast_core::{QueryKey, KeyPart};
///
/// let a = QueryKey::new("predictor", 0, vec![KeyPart::new("getFights", None::<&str>)]);
/// let b = QueryKey::from_slice("predictor", &[("getFights", None)]);
///
/// assert_eq!(a, b);
/// assert_eq!(a.prefix(), "predictor");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "QueryKeyInner", from = "QueryKeyInner")]
pub struct QueryKey {
    inner: Arc<QueryKeyInner>,
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<QueryKeyInner> for QueryKey {
    fn from(inner: QueryKeyInner) -> Self {
        QueryKey {
            inner: Arc::new(inner),
        }
    }
}

impl From<QueryKey> for QueryKeyInner {
    fn from(key: QueryKey) -> Self {
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.inner.prefix.is_empty() {
            write!(f, "{}:", self.inner.prefix)?;
        }
        if self.inner.version > 0 {
            write!(f, "v{}:", self.inner.version)?;
        }
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl QueryKey {
    /// Creates a new query key with the given components.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Key class, used to look up per-class cache policy
    /// * `version` - Version number for invalidation
    /// * `parts` - Ordered list of key-value parts
    pub fn new(prefix: impl Into<SmolStr>, version: u32, parts: Vec<KeyPart>) -> Self {
        QueryKey {
            inner: Arc::new(QueryKeyInner {
                prefix: prefix.into(),
                version,
                parts,
            }),
        }
    }

    /// Creates a query key from a slice of key-value pairs.
    ///
    /// The version is 0.
    pub fn from_slice(prefix: impl Into<SmolStr>, parts: &[(&str, Option<&str>)]) -> Self {
        let parts = parts
            .iter()
            .map(|(key, value)| KeyPart::new(key, *value))
            .collect();
        Self::new(prefix, 0, parts)
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }

    /// Returns the key version number.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Returns the key prefix (the key class).
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }
}

/// A single component of a query key.
///
/// The value is optional: a part without a value names the query itself
/// (`getFights`), a part with a value carries query input (`event=ufc-300`).
///
/// ```
/// use fightcast_core::KeyPart;
///
/// let part = KeyPart::new("event", Some("ufc-300"));
/// assert_eq!(part.key(), "event");
/// assert_eq!(part.value(), Some("ufc-300"));
///
/// let name = KeyPart::new("getFights", None::<&str>);
/// assert_eq!(name.value(), None);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = QueryKey::from_slice("predictor", &[("getFights", None)]);
        let b = QueryKey::new("predictor", 0, vec![KeyPart::new("getFights", None::<&str>)]);
        let c = QueryKey::from_slice("predictor", &[("getFight", None)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_part_order_matters() {
        let a = QueryKey::from_slice("p", &[("a", None), ("b", None)]);
        let b = QueryKey::from_slice("p", &[("b", None), ("a", None)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_keeps_structure() {
        let key = QueryKey::new("predictor", 3, vec![KeyPart::new("event", Some("ufc-300"))]);
        let json = serde_json::to_string(&key).unwrap();
        let back: QueryKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
        assert_eq!(back.to_string(), "predictor:v3:event=ufc-300");
    }
}
