//! JSON manifests describing a dataset to build.
//!
//! ```json
//! {
//!   "views": {
//!     "retinotopy": {"volume": "ret.npy", "subject": "S1", "xfm": "fullhead",
//!                    "cmap": "RdBu_r", "priority": 1},
//!     "thickness":  {"vertex": "thick.npy", "subject": "S1"},
//!     "masked":     {"volume": "m.npy", "subject": "S1", "xfm": "fullhead", "mask": "thick"},
//!     "color":      {"rgb": [{"vertex": "r.npy", "subject": "S1"},
//!                            {"vertex": "g.npy", "subject": "S1"},
//!                            {"vertex": "b.npy", "subject": "S1"}]},
//!     "previous":   "older.cpk"
//!   }
//! }
//! ```
//!
//! A string entry is a package whose views are merged in. A bare array of
//! three channel objects is an RGB view without display settings. Array and
//! package paths are relative to the manifest file. Views are added in name
//! order; set `priority` to control display order.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::data::{DataArray, DisplayAttrs, Mask, View};
use crate::dataset::{normalize, Dataset, Input, Normalized};
use crate::error::CortexError;

/// Display settings given next to a view's data.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DisplayOverrides {
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cmap: Option<String>,
    #[serde(default)]
    pub vmin: Option<f64>,
    #[serde(default)]
    pub vmax: Option<f64>,
}

impl DisplayOverrides {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, mut view: View) -> View {
        if let Some(priority) = self.priority {
            view = view.with_priority(priority);
        }
        let mut display: DisplayAttrs = view.display().clone();
        if let Some(description) = self.description {
            display.description = description;
        }
        display.cmap = self.cmap.or(display.cmap);
        display.vmin = self.vmin.or(display.vmin);
        display.vmax = self.vmax.or(display.vmax);
        view.with_display(display)
    }
}

/// One entry of a manifest, with its arrays already loaded.
#[derive(Debug)]
pub struct ManifestView {
    pub name: String,
    pub input: Input,
    pub overrides: DisplayOverrides,
}

/// A parsed manifest.
#[derive(Debug)]
pub struct Manifest {
    pub path: PathBuf,
    pub views: Vec<ManifestView>,
}

#[derive(Deserialize)]
struct ManifestFile {
    views: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct EntryObject {
    #[serde(default)]
    volume: Option<PathBuf>,
    #[serde(default)]
    vertex: Option<PathBuf>,
    #[serde(default)]
    rgb: Option<Vec<Value>>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    xfm: Option<String>,
    /// Name of a mask stored in the subject database.
    #[serde(default)]
    mask: Option<String>,
    /// `.npy` file with an inline boolean mask.
    #[serde(default)]
    mask_file: Option<PathBuf>,
    #[serde(flatten)]
    display: DisplayOverrides,
}

impl Manifest {
    /// Reads and parses a manifest file, loading every array it names.
    pub fn from_file(path: &Path) -> Result<Self, CortexError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parses manifest text. Relative paths resolve against the directory
    /// of `path`.
    pub fn parse(text: &str, path: &Path) -> Result<Self, CortexError> {
        let file: ManifestFile = serde_json::from_str(text).map_err(|source| CortexError::Json {
            context: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or(Path::new(""));
        let reader = EntryReader { base, path };

        let mut views = Vec::with_capacity(file.views.len());
        for (name, value) in file.views {
            let (input, overrides) = reader.entry(&name, value)?;
            views.push(ManifestView {
                name,
                input,
                overrides,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            views,
        })
    }

    /// Normalizes every entry and collects the results into a dataset.
    pub fn build(self) -> Result<Dataset, CortexError> {
        let mut ds = Dataset::new();
        for entry in self.views {
            match normalize(entry.input)? {
                Normalized::View(view) => {
                    ds.append(entry.name, entry.overrides.apply(view))?;
                }
                Normalized::Dataset(nested) => {
                    if !entry.overrides.is_empty() {
                        return Err(CortexError::Manifest {
                            path: self.path.clone(),
                            message: format!(
                                "'{}': display settings cannot apply to a whole package",
                                entry.name
                            ),
                        });
                    }
                    ds.append(entry.name, nested)?;
                }
            }
        }
        tracing::info!(path = %self.path.display(), views = ds.len(), "built dataset from manifest");
        Ok(ds)
    }
}

struct EntryReader<'a> {
    base: &'a Path,
    path: &'a Path,
}

impl EntryReader<'_> {
    fn invalid(&self, name: &str, message: impl fmt::Display) -> CortexError {
        CortexError::Manifest {
            path: self.path.to_path_buf(),
            message: format!("'{}': {}", name, message),
        }
    }

    fn entry(&self, name: &str, value: Value) -> Result<(Input, DisplayOverrides), CortexError> {
        match value {
            Value::String(path) => Ok((Input::Path(self.base.join(path)), DisplayOverrides::default())),
            Value::Number(n) => Ok((
                Input::Scalar(n.as_f64().unwrap_or(f64::NAN)),
                DisplayOverrides::default(),
            )),
            Value::Array(items) => Ok((self.channels(name, items)?, DisplayOverrides::default())),
            Value::Object(_) => {
                let entry: EntryObject =
                    serde_json::from_value(value).map_err(|e| self.invalid(name, e))?;
                let display = entry.display.clone();
                Ok((self.object(name, entry)?, display))
            }
            Value::Bool(_) | Value::Null => {
                Err(self.invalid(name, "expected a package path, an array list or an object"))
            }
        }
    }

    fn channels(&self, name: &str, items: Vec<Value>) -> Result<Input, CortexError> {
        let mut channels = Vec::with_capacity(items.len());
        for item in items {
            let entry: EntryObject =
                serde_json::from_value(item).map_err(|e| self.invalid(name, e))?;
            if !entry.display.is_empty() {
                return Err(self.invalid(name, "display settings belong on the view, not a channel"));
            }
            channels.push(self.object(name, entry)?);
        }
        Ok(Input::List(channels))
    }

    fn object(&self, name: &str, entry: EntryObject) -> Result<Input, CortexError> {
        if let Some(items) = entry.rgb {
            return self.channels(name, items);
        }

        let subject = entry
            .subject
            .ok_or_else(|| self.invalid(name, "missing \"subject\""))?;
        match (entry.volume, entry.vertex) {
            (Some(volume), None) => {
                let xfmname = entry
                    .xfm
                    .ok_or_else(|| self.invalid(name, "volume data needs \"xfm\""))?;
                let mask = match (entry.mask, entry.mask_file) {
                    (Some(mask), None) => Some(Mask::Named(mask)),
                    (None, Some(file)) => Some(Mask::inline(self.array(&file)?)),
                    (None, None) => None,
                    (Some(_), Some(_)) => {
                        return Err(self.invalid(name, "give either \"mask\" or \"mask_file\""))
                    }
                };
                Ok(Input::Tuple {
                    data: self.array(&volume)?,
                    subject,
                    xfmname: Some(xfmname),
                    mask,
                })
            }
            (None, Some(vertex)) => {
                if entry.xfm.is_some() || entry.mask.is_some() || entry.mask_file.is_some() {
                    return Err(self.invalid(name, "vertex data takes no \"xfm\" or mask"));
                }
                Ok(Input::vertex_tuple(self.array(&vertex)?, subject))
            }
            _ => Err(self.invalid(
                name,
                "expected exactly one of \"volume\", \"vertex\" or \"rgb\"",
            )),
        }
    }

    fn array(&self, relative: &Path) -> Result<DataArray, CortexError> {
        let path = self.base.join(relative);
        let bytes = fs::read(&path)?;
        DataArray::from_npy_bytes(&path.display().to_string(), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BrainData, ViewKind};
    use ndarray::arr1;
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    fn scratch() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        for name in ["a", "r", "g", "b"] {
            write_npy(dir.path().join(format!("{}.npy", name)), &arr1(&[1.0f32, 2.0]))
                .expect("npy");
        }
        dir
    }

    fn parse(dir: &TempDir, text: &str) -> Result<Manifest, CortexError> {
        Manifest::parse(text, &dir.path().join("manifest.json"))
    }

    #[test]
    fn test_builds_views_with_display() {
        let dir = scratch();
        let manifest = parse(
            &dir,
            r#"{"views": {
                "vol": {"volume": "a.npy", "subject": "S1", "xfm": "fullhead", "cmap": "hot", "priority": 3},
                "vert": {"vertex": "a.npy", "subject": "S1", "priority": 1}
            }}"#,
        )
        .expect("parse");
        let ds = manifest.build().expect("build");

        assert_eq!(ds.names(), vec!["vert", "vol"]);
        assert_eq!(ds["vol"].display().cmap.as_deref(), Some("hot"));
        assert_eq!(ds["vol"].priority(), 3);
        assert_eq!(ds["vert"].kind(), ViewKind::Vertex);
    }

    #[test]
    fn test_rgb_entry() {
        let dir = scratch();
        let manifest = parse(
            &dir,
            r#"{"views": {"color": {"rgb": [
                {"vertex": "r.npy", "subject": "S1"},
                {"vertex": "g.npy", "subject": "S1"},
                {"vertex": "b.npy", "subject": "S1"}
            ], "description": "composite"}}}"#,
        )
        .expect("parse");
        let ds = manifest.build().expect("build");
        assert_eq!(ds["color"].kind(), ViewKind::RgbVertex);
        assert_eq!(ds["color"].display().description, "composite");
    }

    #[test]
    fn test_named_mask() {
        let dir = scratch();
        let manifest = parse(
            &dir,
            r#"{"views": {"m": {"volume": "a.npy", "subject": "S1", "xfm": "x", "mask": "thick"}}}"#,
        )
        .expect("parse");
        let ds = manifest.build().expect("build");
        assert_eq!(ds["m"].channels()[0].mask(), Some(&Mask::Named("thick".into())));
    }

    #[test]
    fn test_package_entry_merges_saved_views() {
        let dir = scratch();
        let mut saved = Dataset::from_inputs([
            ("old_a", Input::from(BrainData::vertex(arr1(&[1.0f32, 2.0]), "S1"))),
            ("old_b", Input::from(BrainData::vertex(arr1(&[3.0f32, 4.0]), "S1"))),
        ])
        .expect("dataset");
        saved.save(Some(&dir.path().join("old.cpk")), None).expect("save");

        let manifest = parse(
            &dir,
            r#"{"views": {
                "previous": "old.cpk",
                "vert": {"vertex": "a.npy", "subject": "S1"}
            }}"#,
        )
        .expect("parse");
        let ds = manifest.build().expect("build");
        assert_eq!(ds.len(), 3);
        assert!(ds.get("previous").is_none());
        assert!(ds.get("old_a").is_some() && ds.get("old_b").is_some());
    }

    #[test]
    fn test_package_entry_rejects_display_settings() {
        let dir = scratch();
        let mut saved = Dataset::from_inputs([(
            "old",
            Input::from(BrainData::vertex(arr1(&[1.0f32, 2.0]), "S1")),
        )])
        .expect("dataset");
        saved.save(Some(&dir.path().join("old.cpk")), None).expect("save");

        let manifest = Manifest {
            path: dir.path().join("manifest.json"),
            views: vec![ManifestView {
                name: "previous".to_string(),
                input: Input::Path(dir.path().join("old.cpk")),
                overrides: DisplayOverrides {
                    cmap: Some("hot".to_string()),
                    ..DisplayOverrides::default()
                },
            }],
        };
        assert!(matches!(
            manifest.build().unwrap_err(),
            CortexError::Manifest { .. }
        ));
    }

    #[test]
    fn test_number_entry_is_unsupported() {
        let dir = scratch();
        let manifest = parse(&dir, r#"{"views": {"n": 42}}"#).expect("parse");
        assert!(matches!(
            manifest.build().unwrap_err(),
            CortexError::UnsupportedType(_)
        ));
    }

    #[test]
    fn test_bool_entry_is_invalid() {
        let dir = scratch();
        assert!(matches!(
            parse(&dir, r#"{"views": {"n": true}}"#).unwrap_err(),
            CortexError::Manifest { .. }
        ));
    }

    #[test]
    fn test_volume_without_xfm() {
        let dir = scratch();
        let err = parse(&dir, r#"{"views": {"v": {"volume": "a.npy", "subject": "S1"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("xfm"));
    }
}
