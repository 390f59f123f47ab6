//! Explicit resolution of transform, mask and surface references.
//!
//! Reconstructing brain data from a package needs to look up the transforms
//! and masks it refers to. Instead of a process-wide "current package" slot,
//! every reconstruction call receives a [`Resolver`] listing the sources to
//! consult, in order.

use super::{SubjectDatabase, SubjectPaths};
use crate::data::{BrainData, DataArray, DataKind, Hemisphere, Mask, Surface, Transform, XfmKind};
use crate::error::CortexError;

/// An ordered chain of subject databases. The first source that has a
/// resource wins; a source that fails for any reason other than a missing
/// resource stops the search.
#[derive(Default)]
pub struct Resolver<'a> {
    sources: Vec<&'a dyn SubjectDatabase>,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source, consulted after the ones already added.
    pub fn with_source(mut self, source: &'a dyn SubjectDatabase) -> Self {
        self.sources.push(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn first<T>(
        &self,
        what: &str,
        query: impl Fn(&dyn SubjectDatabase) -> Result<T, CortexError>,
    ) -> Result<T, CortexError> {
        let mut missing = None;
        for source in &self.sources {
            match query(*source) {
                Ok(found) => return Ok(found),
                Err(err) if err.is_missing_resource() => missing = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(missing.unwrap_or_else(|| CortexError::missing("Resource", what)))
    }

    /// Checks that the array shape fits the subject's anatomy.
    ///
    /// - unmasked volume data must end in the transform's volume shape
    /// - masked volume data must have a last axis equal to the number of
    ///   voxels the mask selects
    /// - vertex data must have a last axis equal to the vertex count of
    ///   both hemispheres together
    ///
    /// References that none of the sources can resolve are not checked.
    ///
    /// # Errors
    /// Returns [`CortexError::ShapeMismatch`] when the shape is inconsistent.
    pub fn check_shape(&self, data: &BrainData) -> Result<(), CortexError> {
        let subject = data.subject();
        let shape = data.data().shape();
        let mismatch = |expected: String| CortexError::ShapeMismatch {
            subject: subject.to_string(),
            expected,
            got: shape.to_vec(),
        };

        match data.kind() {
            DataKind::Volume { xfmname } => {
                let Some(xfm) = found(self.get_xfm(subject, xfmname, XfmKind::Coord))? else {
                    return Ok(());
                };
                match data.mask() {
                    None => {
                        if shape.len() < 3 || shape[shape.len() - 3..] != xfm.shape {
                            return Err(mismatch(format!("volume ending in {:?}", xfm.shape)));
                        }
                    }
                    Some(mask) => {
                        let resolved;
                        let mask_array: &DataArray = match mask {
                            Mask::Inline(array) => array,
                            Mask::Named(name) => {
                                match found(self.get_mask(subject, xfmname, name))? {
                                    Some(array) => {
                                        resolved = array;
                                        &resolved
                                    }
                                    None => return Ok(()),
                                }
                            }
                        };
                        if mask_array.shape() != xfm.shape {
                            return Err(CortexError::ShapeMismatch {
                                subject: subject.to_string(),
                                expected: format!("mask of shape {:?}", xfm.shape),
                                got: mask_array.shape().to_vec(),
                            });
                        }
                        let selected = mask_array.count_true().ok_or_else(|| {
                            mismatch(format!("boolean mask, got {}", mask_array.dtype()))
                        })?;
                        if shape.last() != Some(&selected) {
                            return Err(mismatch(format!("last axis of {} masked voxels", selected)));
                        }
                    }
                }
            }
            DataKind::Vertex => {
                let Some(paths) = found(self.get_paths(subject))? else {
                    return Ok(());
                };
                let Some(surftype) = paths.surfs.keys().next() else {
                    return Ok(());
                };
                let mut vertices = 0;
                for hemi in Hemisphere::BOTH {
                    match found(self.get_surf(subject, surftype, hemi))? {
                        Some(surf) => vertices += surf.vertex_count(),
                        None => return Ok(()),
                    }
                }
                if shape.last() != Some(&vertices) {
                    return Err(mismatch(format!("last axis of {} vertices", vertices)));
                }
            }
        }
        Ok(())
    }
}

/// Turns a missing resource into `None` and keeps every other error.
fn found<T>(result: Result<T, CortexError>) -> Result<Option<T>, CortexError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_missing_resource() => Ok(None),
        Err(err) => Err(err),
    }
}

impl SubjectDatabase for Resolver<'_> {
    fn get_overlay(&self, subject: &str, kind: &str) -> Result<String, CortexError> {
        self.first(subject, |db| db.get_overlay(subject, kind))
    }

    fn get_surf(
        &self,
        subject: &str,
        surftype: &str,
        hemi: Hemisphere,
    ) -> Result<Surface, CortexError> {
        self.first(subject, |db| db.get_surf(subject, surftype, hemi))
    }

    fn get_paths(&self, subject: &str) -> Result<SubjectPaths, CortexError> {
        self.first(subject, |db| db.get_paths(subject))
    }

    fn get_xfm(
        &self,
        subject: &str,
        xfmname: &str,
        kind: XfmKind,
    ) -> Result<Transform, CortexError> {
        self.first(subject, |db| db.get_xfm(subject, xfmname, kind))
    }

    fn get_mask(
        &self,
        subject: &str,
        xfmname: &str,
        maskname: &str,
    ) -> Result<DataArray, CortexError> {
        self.first(subject, |db| db.get_mask(subject, xfmname, maskname))
    }
}
