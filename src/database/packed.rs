//! Read-through access to subject resources inlined into a package.

use std::path::PathBuf;

use ndarray::Ix2;

use super::{unknown_overlay, SubjectDatabase, SubjectPaths, ROIS};
use crate::data::{DataArray, Hemisphere, Surface, Transform, XfmKind};
use crate::error::CortexError;
use crate::package::{Package, SUBJECTS};

/// Surface type derived from the `wm` and `pia` meshes instead of stored.
pub const FIDUCIAL: &str = "fiducial";

pub(crate) fn subject_path(subject: &str) -> String {
    format!("{}/{}", SUBJECTS, subject)
}

pub(crate) fn rois_path(subject: &str) -> String {
    format!("{}/{}/{}", SUBJECTS, subject, ROIS)
}

pub(crate) fn surface_path(subject: &str, surftype: &str, hemi: Hemisphere) -> String {
    format!("{}/{}/surfaces/{}/{}", SUBJECTS, subject, surftype, hemi)
}

pub(crate) fn xfm_path(subject: &str, xfmname: &str) -> String {
    format!("{}/{}/transforms/{}", SUBJECTS, subject, xfmname)
}

pub(crate) fn mask_path(subject: &str, xfmname: &str, maskname: &str) -> String {
    format!("{}/masks/{}", xfm_path(subject, xfmname), maskname)
}

/// The `/subjects` region of a package, viewed as a subject database.
#[derive(Clone, Copy, Debug)]
pub struct PackedSubjects<'a> {
    package: &'a Package,
}

impl<'a> PackedSubjects<'a> {
    pub fn new(package: &'a Package) -> Self {
        Self { package }
    }

    fn array(&self, path: &str, kind: &'static str, what: &str) -> Result<&'a DataArray, CortexError> {
        self.package
            .get(path)
            .and_then(|node| node.array.as_ref())
            .ok_or_else(|| CortexError::missing(kind, what))
    }
}

impl SubjectDatabase for PackedSubjects<'_> {
    fn get_overlay(&self, subject: &str, kind: &str) -> Result<String, CortexError> {
        if kind != ROIS {
            return Err(unknown_overlay(kind));
        }
        self.package
            .get(&rois_path(subject))
            .and_then(|node| node.attr_str("xml"))
            .map(str::to_string)
            .ok_or_else(|| CortexError::missing("Overlay", format!("{}/{}", subject, kind)))
    }

    fn get_surf(
        &self,
        subject: &str,
        surftype: &str,
        hemi: Hemisphere,
    ) -> Result<Surface, CortexError> {
        if surftype == FIDUCIAL {
            let wm = self.get_surf(subject, "wm", hemi)?;
            let pia = self.get_surf(subject, "pia", hemi)?;
            return Surface::midpoint(subject, &wm, &pia);
        }

        let base = surface_path(subject, surftype, hemi);
        let what = format!("{}/{}/{}", subject, surftype, hemi);
        let pts = self.array(&format!("{}/pts", base), "Surface", &what)?;
        let polys = self.array(&format!("{}/polys", base), "Surface", &what)?;
        Surface::from_arrays(&what, pts, polys)
    }

    fn get_paths(&self, subject: &str) -> Result<SubjectPaths, CortexError> {
        if !self.package.contains(&subject_path(subject)) {
            return Err(CortexError::missing("Subject", subject));
        }
        let surfaces = format!("{}/surfaces", subject_path(subject));
        let surfs = self
            .package
            .children(&surfaces)
            .into_iter()
            .map(|surftype| {
                let path = PathBuf::from(format!("/{}/{}", surfaces, surftype));
                (surftype, path)
            })
            .collect();
        Ok(SubjectPaths { surfs })
    }

    fn get_xfm(
        &self,
        subject: &str,
        xfmname: &str,
        kind: XfmKind,
    ) -> Result<Transform, CortexError> {
        let what = format!("{}/{} ({})", subject, xfmname, kind.as_str());
        if kind != XfmKind::Coord {
            return Err(CortexError::missing("Transform", what));
        }

        let path = format!("{}/xfm", xfm_path(subject, xfmname));
        let node = self
            .package
            .get(&path)
            .ok_or_else(|| CortexError::missing("Transform", what.clone()))?;
        let bad_shape = |got: &[usize]| CortexError::ShapeMismatch {
            subject: what.clone(),
            expected: "4x4 matrix with a 3-element shape attribute".to_string(),
            got: got.to_vec(),
        };

        let array = node
            .array
            .as_ref()
            .ok_or_else(|| CortexError::missing("Transform", what.clone()))?;
        let matrix = array
            .to_f64()
            .and_then(|a| a.into_dimensionality::<Ix2>().ok())
            .filter(|m| m.dim() == (4, 4))
            .ok_or_else(|| bad_shape(array.shape()))?;
        let shape: [usize; 3] = node
            .attrs
            .get("shape")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| bad_shape(&[]))?;

        Ok(Transform::new(matrix, shape))
    }

    fn get_mask(
        &self,
        subject: &str,
        xfmname: &str,
        maskname: &str,
    ) -> Result<DataArray, CortexError> {
        let what = format!("{}/{}/{}", subject, xfmname, maskname);
        self.array(&mask_path(subject, xfmname, maskname), "Mask", &what)
            .cloned()
    }
}
