//! Access to per-subject resources: surfaces, transforms, masks and overlays.
//!
//! [`SubjectDatabase`] is the read-only adapter the rest of the crate talks
//! to. Three implementations ship with the crate:
//!
//! - [`Filestore`]: a directory tree of subjects on local storage
//! - [`PackedSubjects`]: the `/subjects` region inlined into a package
//! - [`Resolver`]: an ordered chain of other sources, first hit wins

mod filestore;
pub(crate) mod packed;
mod resolve;

use std::collections::BTreeMap;
use std::path::PathBuf;

pub use filestore::Filestore;
pub use packed::PackedSubjects;
pub use resolve::Resolver;

use crate::data::{DataArray, Hemisphere, Surface, Transform, XfmKind};
use crate::error::CortexError;

/// Overlay holding the subject's regions of interest.
pub const ROIS: &str = "rois";

/// Locations of a subject's resources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectPaths {
    /// Surface type (e.g. `wm`, `pia`, `inflated`) to where it is stored.
    pub surfs: BTreeMap<String, PathBuf>,
}

/// Read-only queries against per-subject storage.
///
/// Every method returns [`CortexError::MissingResource`] when the subject
/// or the requested resource does not exist.
pub trait SubjectDatabase {
    /// Serialized overlay document. Only [`ROIS`] is supported.
    fn get_overlay(&self, subject: &str, kind: &str) -> Result<String, CortexError>;

    fn get_surf(
        &self,
        subject: &str,
        surftype: &str,
        hemi: Hemisphere,
    ) -> Result<Surface, CortexError>;

    fn get_paths(&self, subject: &str) -> Result<SubjectPaths, CortexError>;

    fn get_xfm(&self, subject: &str, xfmname: &str, kind: XfmKind)
        -> Result<Transform, CortexError>;

    /// Boolean mask over the transform's volume.
    fn get_mask(
        &self,
        subject: &str,
        xfmname: &str,
        maskname: &str,
    ) -> Result<DataArray, CortexError>;
}

pub(crate) fn unknown_overlay(kind: &str) -> CortexError {
    CortexError::UnsupportedType(format!("unknown overlay type '{}'", kind))
}
