//! Inlining subject resources into a package.
//!
//! Each helper fetches every resource it needs before touching the package,
//! so a missing resource leaves the package as it was.

use std::collections::BTreeSet;

use crate::data::{DataArray, Hemisphere, XfmKind};
use crate::database::{SubjectDatabase, ROIS};
use crate::error::CortexError;
use crate::package::{Node, Package};

use crate::database::packed::{mask_path, rois_path, surface_path, xfm_path};

/// Subject, transform name.
pub type XfmKey = (String, String);
/// Subject, transform name, mask name.
pub type MaskKey = (String, String, String);

/// Nodes ready to be inserted into a package.
pub(crate) type Staged = Vec<(String, Node)>;

fn packing_error(subject: &str, resource: impl Into<String>, source: CortexError) -> CortexError {
    CortexError::PackingResource {
        subject: subject.to_string(),
        resource: resource.into(),
        source: Box::new(source),
    }
}

pub(crate) fn stage_subjects(
    subjects: &BTreeSet<String>,
    db: &dyn SubjectDatabase,
) -> Result<Staged, CortexError> {
    let mut staged = Staged::new();
    for subject in subjects {
        let xml = db
            .get_overlay(subject, ROIS)
            .map_err(|e| packing_error(subject, "overlay", e))?;
        if let Err(e) = roxmltree::Document::parse(&xml) {
            return Err(packing_error(
                subject,
                "overlay",
                CortexError::UnsupportedFormat(format!("overlay is not well-formed XML: {}", e)),
            ));
        }
        let mut rois = Node::default();
        rois.set_attr("xml", xml);
        staged.push((rois_path(subject), rois));

        let paths = db
            .get_paths(subject)
            .map_err(|e| packing_error(subject, "surface list", e))?;
        for surftype in paths.surfs.keys() {
            for hemi in Hemisphere::BOTH {
                let surf = db
                    .get_surf(subject, surftype, hemi)
                    .map_err(|e| packing_error(subject, format!("surface {}/{}", surftype, hemi), e))?;
                let base = surface_path(subject, surftype, hemi);
                staged.push((format!("{}/pts", base), Node::with_array(DataArray::from(surf.pts))));
                staged.push((
                    format!("{}/polys", base),
                    Node::with_array(DataArray::from(surf.polys)),
                ));
            }
        }
        tracing::debug!(subject = %subject, surfaces = paths.surfs.len(), "staged subject");
    }
    Ok(staged)
}

pub(crate) fn stage_transforms(
    xfms: &BTreeSet<XfmKey>,
    db: &dyn SubjectDatabase,
) -> Result<Staged, CortexError> {
    let mut staged = Staged::new();
    for (subject, xfmname) in xfms {
        let xfm = db
            .get_xfm(subject, xfmname, XfmKind::Coord)
            .map_err(|e| packing_error(subject, format!("transform {}", xfmname), e))?;
        let mut node = Node::with_array(DataArray::from(xfm.matrix));
        node.set_attr("shape", xfm.shape.to_vec());
        staged.push((format!("{}/xfm", xfm_path(subject, xfmname)), node));
    }
    Ok(staged)
}

pub(crate) fn stage_masks(
    masks: &BTreeSet<MaskKey>,
    db: &dyn SubjectDatabase,
) -> Result<Staged, CortexError> {
    let mut staged = Staged::new();
    for (subject, xfmname, maskname) in masks {
        let mask = db
            .get_mask(subject, xfmname, maskname)
            .map_err(|e| packing_error(subject, format!("mask {}/{}", xfmname, maskname), e))?;
        staged.push((mask_path(subject, xfmname, maskname), Node::with_array(mask)));
    }
    Ok(staged)
}

pub(crate) fn commit(package: &mut Package, staged: Staged) -> Result<(), CortexError> {
    for (path, node) in staged {
        package.insert(&path, node)?;
    }
    Ok(())
}

/// Writes each subject's overlay and every surface type for both hemispheres
/// under `subjects/<subject>`.
///
/// # Errors
/// Returns [`CortexError::PackingResource`] if any resource is missing or the
/// overlay is not well-formed XML. Nothing is written in that case.
pub fn pack_subjects(
    package: &mut Package,
    subjects: &BTreeSet<String>,
    db: &dyn SubjectDatabase,
) -> Result<(), CortexError> {
    let staged = stage_subjects(subjects, db)?;
    commit(package, staged)
}

/// Writes each coordinate transform's matrix with its `shape` attribute.
pub fn pack_transforms(
    package: &mut Package,
    xfms: &BTreeSet<XfmKey>,
    db: &dyn SubjectDatabase,
) -> Result<(), CortexError> {
    let staged = stage_transforms(xfms, db)?;
    commit(package, staged)
}

/// Writes each named mask under its transform's `masks` group.
pub fn pack_masks(
    package: &mut Package,
    masks: &BTreeSet<MaskKey>,
    db: &dyn SubjectDatabase,
) -> Result<(), CortexError> {
    let staged = stage_masks(masks, db)?;
    commit(package, staged)
}
