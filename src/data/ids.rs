//! Stable identifiers for brain data entries in a package.
//!
//! A [`DataId`] names one `/data/<id>` node. Identical brain data hash to
//! the same id, which is what lets several views share one stored array.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored brain data entry, e.g. `__1a2b3c4d5e6f7a8b`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataId(String);

impl DataId {
    /// Builds an id from the two halves of an identity digest.
    #[inline]
    pub fn from_digest(meta: u32, content: u32) -> Self {
        Self(format!("__{:08x}{:08x}", meta, content))
    }

    /// Wraps an existing node name read back from a package.
    #[inline]
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns a variant of this id that avoids a digest collision.
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}_{}", self.0, n))
    }

    /// Returns the underlying node name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataId({})", self.0)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = DataId::from_digest(0xdead_beef, 0x1);
        assert_eq!(id.as_str(), "__deadbeef00000001");
    }

    #[test]
    fn test_suffix_differs() {
        let id = DataId::from_digest(1, 2);
        assert_ne!(id, id.with_suffix(1));
        assert!(id.with_suffix(1).as_str().starts_with(id.as_str()));
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(DataId::from_digest(1, 1));
        set.insert(DataId::from_digest(1, 2));
        set.insert(DataId::from_digest(1, 1)); // duplicate
        assert_eq!(set.len(), 2);
    }
}
