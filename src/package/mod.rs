//! The hierarchical package container.
//!
//! A package is a tree of nodes addressed by `/`-separated paths. Each node
//! may carry an array and a map of JSON attributes. Three top-level regions
//! are reserved:
//!
//! - `views/<name>`: one node per view (type tag, priority, display, data refs)
//! - `data/<id>`: one node per unique brain data
//! - `subjects/<subject>/...`: subject resources inlined by packing
//!
//! Everything else at the top level is a *stray* entry, e.g. an array added
//! by hand. The whole tree lives in memory; [`Package::flush`] writes it out
//! as a single zip archive.

mod archive;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use crate::data::DataArray;
use crate::error::CortexError;

/// Region holding one node per unique brain data.
pub const DATA: &str = "data";
/// Region holding packed subject resources.
pub const SUBJECTS: &str = "subjects";
/// Region holding one node per view.
pub const VIEWS: &str = "views";
/// Top-level names that can never be stray entries.
pub const RESERVED: [&str; 3] = [DATA, SUBJECTS, VIEWS];

/// Node attributes.
pub type Attrs = BTreeMap<String, serde_json::Value>;

/// One node in the package tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub array: Option<DataArray>,
    pub attrs: Attrs,
}

impl Node {
    pub fn with_array(array: DataArray) -> Self {
        Self {
            array: Some(array),
            attrs: Attrs::new(),
        }
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// String attribute, if present and a string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

/// Checks that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<(), CortexError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.starts_with('.') {
        "name starts with '.'"
    } else {
        return Ok(());
    };
    Err(CortexError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn normalize(path: &str) -> String {
    split_path(path).join("/")
}

/// An in-memory package tree, optionally bound to a file.
#[derive(Clone, Debug, Default)]
pub struct Package {
    path: Option<PathBuf>,
    nodes: BTreeMap<String, Node>,
}

impl Package {
    /// Creates an empty package not bound to any file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty package that will be written to `path` on flush.
    pub fn create(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            nodes: BTreeMap::new(),
        }
    }

    /// Reads an existing package file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid package.
    pub fn open(path: &Path) -> Result<Self, CortexError> {
        let bytes = std::fs::read(path)?;
        let nodes = archive::read_archive(&bytes, path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            nodes,
        })
    }

    /// Opens `path` if it exists, otherwise creates a new empty package.
    pub fn open_or_create(path: &Path) -> Result<Self, CortexError> {
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::create(path))
        }
    }

    /// Parses a package from archive bytes. The result is unbound.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CortexError> {
        let nodes = archive::read_archive(bytes, Path::new("<memory>"))?;
        Ok(Self { path: None, nodes })
    }

    /// Serializes the package to archive bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CortexError> {
        let cursor = archive::write_archive(&self.nodes, Cursor::new(Vec::new()), self.origin())?;
        Ok(cursor.into_inner())
    }

    /// File this package is bound to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the whole tree to the bound file.
    ///
    /// # Errors
    /// Returns [`CortexError::UnboundFile`] if the package has no file.
    pub fn flush(&self) -> Result<(), CortexError> {
        let path = self.path.as_deref().ok_or(CortexError::UnboundFile)?;
        let file = File::create(path)?;
        let writer = archive::write_archive(&self.nodes, BufWriter::new(file), path)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        tracing::debug!(path = %path.display(), nodes = self.nodes.len(), "flushed package");
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(&normalize(path))
    }

    /// True if `path` is a node or an implied group.
    pub fn contains(&self, path: &str) -> bool {
        let path = normalize(path);
        self.nodes.contains_key(&path) || self.descendants(&path).next().is_some()
    }

    /// Inserts or replaces the node at `path`.
    ///
    /// # Errors
    /// Returns [`CortexError::InvalidName`] if any segment is invalid.
    pub fn insert(&mut self, path: &str, node: Node) -> Result<(), CortexError> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(CortexError::InvalidName {
                name: path.to_string(),
                reason: "path is empty",
            });
        }
        for segment in &segments {
            validate_name(segment)?;
        }
        self.nodes.insert(segments.join("/"), node);
        Ok(())
    }

    /// Names of the immediate children of `path` (`""` for the root),
    /// including groups implied by deeper nodes. Sorted.
    pub fn children(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        let skip = if path.is_empty() { 0 } else { path.len() + 1 };
        let names: BTreeSet<String> = self
            .descendants(&path)
            .filter_map(|key| key[skip..].split('/').next())
            .map(str::to_string)
            .collect();
        names.into_iter().collect()
    }

    /// Removes `path` and everything below it.
    pub fn remove_subtree(&mut self, path: &str) {
        let path = normalize(path);
        let doomed: Vec<String> = self
            .descendants(&path)
            .map(str::to_string)
            .chain(std::iter::once(path.clone()))
            .collect();
        for key in doomed {
            self.nodes.remove(&key);
        }
    }

    /// All node paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn descendants<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        self.nodes
            .range(prefix.clone()..)
            .map(|(key, _)| key.as_str())
            .take_while(move |key| key.starts_with(&prefix))
    }

    fn origin(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new("<memory>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn sample() -> Package {
        let mut pkg = Package::new();
        pkg.insert("views/a", Node::default()).expect("insert");
        pkg.insert("data/__1", Node::with_array(DataArray::from(arr1(&[1u8]))))
            .expect("insert");
        pkg.insert(
            "subjects/S1/transforms/xfm/xfm",
            Node::with_array(DataArray::from(arr1(&[0.0f64]))),
        )
        .expect("insert");
        pkg
    }

    #[test]
    fn test_children_include_implied_groups() {
        let pkg = sample();
        assert_eq!(pkg.children(""), vec!["data", "subjects", "views"]);
        assert_eq!(pkg.children("/subjects"), vec!["S1"]);
        assert_eq!(pkg.children("subjects/S1/transforms"), vec!["xfm"]);
        assert!(pkg.children("missing").is_empty());
    }

    #[test]
    fn test_contains_implied_group() {
        let pkg = sample();
        assert!(pkg.contains("subjects/S1"));
        assert!(pkg.contains("/data/__1"));
        assert!(!pkg.contains("subjects/S2"));
    }

    #[test]
    fn test_children_do_not_match_sibling_prefixes() {
        let mut pkg = sample();
        pkg.insert("datafoo", Node::default()).expect("insert");
        assert_eq!(pkg.children("data"), vec!["__1"]);
    }

    #[test]
    fn test_remove_subtree() {
        let mut pkg = sample();
        pkg.remove_subtree("subjects");
        assert!(!pkg.contains("subjects"));
        assert!(pkg.contains("data"));
    }

    #[test]
    fn test_insert_rejects_bad_segments() {
        let mut pkg = Package::new();
        assert!(pkg.insert("", Node::default()).is_err());
        assert!(pkg.insert("views/.attrs.json", Node::default()).is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let pkg = sample();
        let bytes = pkg.to_bytes().expect("serialize");
        let restored = Package::from_bytes(&bytes).expect("parse");
        assert_eq!(restored.get("data/__1"), pkg.get("data/__1"));
        // The empty view node has no payload, so it is not stored.
        assert!(restored.get("views/a").is_none());
    }

    #[test]
    fn test_unbound_flush_fails() {
        let err = Package::new().flush().unwrap_err();
        assert!(matches!(err, CortexError::UnboundFile));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("retinotopy").is_ok());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("").is_err());
    }
}
