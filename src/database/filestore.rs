//! Directory-backed subject database.
//!
//! Expected layout under the root:
//!
//! ```text
//! <subject>/overlays.svg
//! <subject>/surfaces/<type>_<hemi>.pts.npy
//! <subject>/surfaces/<type>_<hemi>.polys.npy
//! <subject>/transforms/<xfm>/matrices.json
//! <subject>/transforms/<xfm>/mask_<name>.npy
//! ```
//!
//! `matrices.json` holds `{"coord": [[..4..]; 4], "magnet": [[..4..]; 4], "shape": [z, y, x]}`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::Deserialize;
use walkdir::WalkDir;

use super::{unknown_overlay, SubjectDatabase, SubjectPaths, ROIS};
use crate::data::{DataArray, Hemisphere, Surface, Transform, XfmKind};
use crate::error::CortexError;

const PTS_SUFFIX: &str = ".pts.npy";
const POLYS_SUFFIX: &str = ".polys.npy";

#[derive(Deserialize)]
struct MatricesFile {
    #[serde(default)]
    coord: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    magnet: Option<Vec<Vec<f64>>>,
    shape: [usize; 3],
}

/// Subject database rooted at a local directory.
#[derive(Clone, Debug)]
pub struct Filestore {
    root: PathBuf,
}

impl Filestore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn subject_dir(&self, subject: &str) -> Result<PathBuf, CortexError> {
        let dir = self.root.join(subject);
        if subject.is_empty() || subject.contains(['/', '\\']) || !dir.is_dir() {
            return Err(CortexError::missing("Subject", subject));
        }
        Ok(dir)
    }

    fn read_array(&self, path: &Path, kind: &'static str, what: String) -> Result<DataArray, CortexError> {
        let bytes = read_or_missing(path, kind, what)?;
        DataArray::from_npy_bytes(&path.display().to_string(), &bytes)
    }
}

fn read_or_missing(path: &Path, kind: &'static str, what: String) -> Result<Vec<u8>, CortexError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(CortexError::missing(kind, what)),
        Err(err) => Err(CortexError::Io(err)),
    }
}

fn matrix4(rows: &[Vec<f64>], path: &Path) -> Result<Array2<f64>, CortexError> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    if rows.len() != 4 || rows.iter().any(|r| r.len() != 4) {
        return Err(CortexError::ShapeMismatch {
            subject: path.display().to_string(),
            expected: "4x4 matrix".to_string(),
            got: vec![rows.len(), rows.first().map_or(0, Vec::len)],
        });
    }
    Array2::from_shape_vec((4, 4), flat).map_err(|_| CortexError::ShapeMismatch {
        subject: path.display().to_string(),
        expected: "4x4 matrix".to_string(),
        got: vec![rows.len()],
    })
}

impl SubjectDatabase for Filestore {
    fn get_overlay(&self, subject: &str, kind: &str) -> Result<String, CortexError> {
        if kind != ROIS {
            return Err(unknown_overlay(kind));
        }
        let path = self.subject_dir(subject)?.join("overlays.svg");
        let bytes = read_or_missing(&path, "Overlay", format!("{}/{}", subject, kind))?;
        String::from_utf8(bytes).map_err(|e| CortexError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))
    }

    fn get_surf(
        &self,
        subject: &str,
        surftype: &str,
        hemi: Hemisphere,
    ) -> Result<Surface, CortexError> {
        let dir = self.subject_dir(subject)?.join("surfaces");
        let stem = format!("{}_{}", surftype, hemi);
        let what = format!("{}/{}/{}", subject, surftype, hemi);
        let pts = self.read_array(&dir.join(format!("{}{}", stem, PTS_SUFFIX)), "Surface", what.clone())?;
        let polys = self.read_array(&dir.join(format!("{}{}", stem, POLYS_SUFFIX)), "Surface", what.clone())?;
        Surface::from_arrays(&what, &pts, &polys)
    }

    fn get_paths(&self, subject: &str) -> Result<SubjectPaths, CortexError> {
        let dir = self.subject_dir(subject)?.join("surfaces");
        let mut paths = SubjectPaths::default();
        if !dir.is_dir() {
            return Ok(paths);
        }

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                CortexError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(ErrorKind::Other, "walkdir loop detected")
                }))
            })?;
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(PTS_SUFFIX) else {
                continue;
            };
            let Some((surftype, hemi)) = stem.rsplit_once('_') else {
                continue;
            };
            if Hemisphere::BOTH.iter().any(|h| h.as_str() == hemi) {
                paths
                    .surfs
                    .insert(surftype.to_string(), dir.join(surftype));
            }
        }

        Ok(paths)
    }

    fn get_xfm(
        &self,
        subject: &str,
        xfmname: &str,
        kind: XfmKind,
    ) -> Result<Transform, CortexError> {
        let path = self
            .subject_dir(subject)?
            .join("transforms")
            .join(xfmname)
            .join("matrices.json");
        let what = format!("{}/{}", subject, xfmname);
        let bytes = read_or_missing(&path, "Transform", what.clone())?;
        let parsed: MatricesFile =
            serde_json::from_slice(&bytes).map_err(|source| CortexError::Json {
                context: path.display().to_string(),
                source,
            })?;

        let rows = match kind {
            XfmKind::Coord => parsed.coord,
            XfmKind::Magnet => parsed.magnet,
        }
        .ok_or_else(|| CortexError::missing("Transform", format!("{} ({})", what, kind.as_str())))?;

        Ok(Transform::new(matrix4(&rows, &path)?, parsed.shape))
    }

    fn get_mask(
        &self,
        subject: &str,
        xfmname: &str,
        maskname: &str,
    ) -> Result<DataArray, CortexError> {
        let path = self
            .subject_dir(subject)?
            .join("transforms")
            .join(xfmname)
            .join(format!("mask_{}.npy", maskname));
        self.read_array(&path, "Mask", format!("{}/{}/{}", subject, xfmname, maskname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    fn store() -> (TempDir, Filestore) {
        let dir = TempDir::new().expect("tempdir");
        let subj = dir.path().join("S1");
        fs::create_dir_all(subj.join("surfaces")).expect("mkdir");
        fs::create_dir_all(subj.join("transforms/fullhead")).expect("mkdir");
        fs::write(subj.join("overlays.svg"), "<svg><g id=\"rois\"/></svg>").expect("write");
        for hemi in ["lh", "rh"] {
            write_npy(
                subj.join(format!("surfaces/wm_{}.pts.npy", hemi)),
                &arr2(&[[0.0f64, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
            )
            .expect("pts");
            write_npy(
                subj.join(format!("surfaces/wm_{}.polys.npy", hemi)),
                &arr2(&[[0u32, 1, 2]]),
            )
            .expect("polys");
        }
        fs::write(
            subj.join("transforms/fullhead/matrices.json"),
            r#"{"coord": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]], "shape": [2, 3, 4]}"#,
        )
        .expect("write");
        write_npy(
            subj.join("transforms/fullhead/mask_thick.npy"),
            &arr1(&[true, false, true]),
        )
        .expect("mask");
        let store = Filestore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_reads_surface() {
        let (_dir, db) = store();
        let surf = db.get_surf("S1", "wm", Hemisphere::Left).expect("surface");
        assert_eq!(surf.vertex_count(), 3);
    }

    #[test]
    fn test_lists_surface_types() {
        let (_dir, db) = store();
        let paths = db.get_paths("S1").expect("paths");
        assert_eq!(paths.surfs.keys().collect::<Vec<_>>(), vec!["wm"]);
    }

    #[test]
    fn test_reads_transform() {
        let (_dir, db) = store();
        let xfm = db.get_xfm("S1", "fullhead", XfmKind::Coord).expect("xfm");
        assert_eq!(xfm.shape, [2, 3, 4]);
        assert_eq!(xfm.matrix[[3, 3]], 1.0);

        let err = db.get_xfm("S1", "fullhead", XfmKind::Magnet).unwrap_err();
        assert!(err.is_missing_resource());
    }

    #[test]
    fn test_missing_subject_is_missing_resource() {
        let (_dir, db) = store();
        assert!(db.get_surf("S9", "wm", Hemisphere::Left).unwrap_err().is_missing_resource());
        assert!(db.get_mask("S1", "fullhead", "thin").unwrap_err().is_missing_resource());
    }

    #[test]
    fn test_unknown_overlay_kind() {
        let (_dir, db) = store();
        assert!(db.get_overlay("S1", ROIS).is_ok());
        assert!(matches!(
            db.get_overlay("S1", "sulci").unwrap_err(),
            CortexError::UnsupportedType(_)
        ));
    }
}
