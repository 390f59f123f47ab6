//! Brain data: a numeric array tagged with subject, transform and mask.
//!
//! Two instances are the *same* data when subject, kind, transform, mask and
//! array contents all match. That identity drives deduplication both in
//! [`Dataset::uniques`](crate::Dataset::uniques) and on disk, where each
//! distinct brain data is written once under `/data/<id>`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::array::DataArray;
use super::ids::DataId;

/// How the array axes relate to anatomy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Voxel data in the space of a named coordinate transform.
    Volume { xfmname: String },
    /// Per-vertex data on the subject's cortical mesh (left then right hemisphere).
    Vertex,
}

/// Spatial selection applied to volume data.
#[derive(Clone, Debug)]
pub enum Mask {
    /// A mask stored in the subject database under this name.
    Named(String),
    /// A boolean mask carried with the data itself.
    Inline(Arc<DataArray>),
}

impl Mask {
    pub fn inline(mask: impl Into<DataArray>) -> Self {
        Mask::Inline(Arc::new(mask.into()))
    }

    /// Name of a stored mask; `None` for inline masks.
    pub fn name(&self) -> Option<&str> {
        match self {
            Mask::Named(name) => Some(name),
            Mask::Inline(_) => None,
        }
    }
}

// A named mask never equals an inline one, even when the stored mask would
// have identical contents: resolving the name needs a subject database.
impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Mask::Named(a), Mask::Named(b)) => a == b,
            (Mask::Inline(a), Mask::Inline(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Eq for Mask {}

/// A single subject/transform/mask-tagged numeric array.
///
/// Cloning is cheap: the array lives behind an [`Arc`] and clones share it.
#[derive(Clone, Debug)]
pub struct BrainData {
    data: Arc<DataArray>,
    subject: String,
    kind: DataKind,
    mask: Option<Mask>,
    id: DataId,
}

impl BrainData {
    /// Creates unmasked volume data in the space of transform `xfmname`.
    pub fn volume(
        data: impl Into<DataArray>,
        subject: impl Into<String>,
        xfmname: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            Arc::new(data.into()),
            subject.into(),
            DataKind::Volume {
                xfmname: xfmname.into(),
            },
            None,
        )
    }

    /// Creates masked volume data. The last axis holds one value per
    /// selected voxel.
    pub fn masked_volume(
        data: impl Into<DataArray>,
        subject: impl Into<String>,
        xfmname: impl Into<String>,
        mask: Mask,
    ) -> Self {
        Self::from_parts(
            Arc::new(data.into()),
            subject.into(),
            DataKind::Volume {
                xfmname: xfmname.into(),
            },
            Some(mask),
        )
    }

    /// Creates per-vertex data for `subject`.
    pub fn vertex(data: impl Into<DataArray>, subject: impl Into<String>) -> Self {
        Self::from_parts(Arc::new(data.into()), subject.into(), DataKind::Vertex, None)
    }

    pub(crate) fn from_parts(
        data: Arc<DataArray>,
        subject: String,
        kind: DataKind,
        mask: Option<Mask>,
    ) -> Self {
        let id = identity_digest(&data, &subject, &kind, mask.as_ref());
        Self {
            data,
            subject,
            kind,
            mask,
            id,
        }
    }

    pub fn data(&self) -> &DataArray {
        &self.data
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn kind(&self) -> &DataKind {
        &self.kind
    }

    /// Transform name; `None` for vertex data.
    pub fn xfmname(&self) -> Option<&str> {
        match &self.kind {
            DataKind::Volume { xfmname } => Some(xfmname),
            DataKind::Vertex => None,
        }
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn is_volume(&self) -> bool {
        matches!(self.kind, DataKind::Volume { .. })
    }

    /// Identity digest, also the node name used under `/data`.
    pub fn id(&self) -> &DataId {
        &self.id
    }

    /// True when both values point at the same array allocation.
    pub fn shares_data_with(&self, other: &BrainData) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for BrainData {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.subject == other.subject
            && self.kind == other.kind
            && self.mask == other.mask
            && (Arc::ptr_eq(&self.data, &other.data) || self.data == other.data)
    }
}

impl Eq for BrainData {}

impl Hash for BrainData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for BrainData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DataKind::Volume { xfmname } => write!(
                f,
                "VolumeData(subject={}, xfm={}, shape={:?})",
                self.subject,
                xfmname,
                self.data.shape()
            ),
            DataKind::Vertex => write!(
                f,
                "VertexData(subject={}, shape={:?})",
                self.subject,
                self.data.shape()
            ),
        }
    }
}

fn identity_digest(
    data: &DataArray,
    subject: &str,
    kind: &DataKind,
    mask: Option<&Mask>,
) -> DataId {
    let mut meta = crc32c::crc32c(subject.as_bytes());
    match kind {
        DataKind::Volume { xfmname } => {
            meta = crc32c::crc32c_append(meta, b"\0volume\0");
            meta = crc32c::crc32c_append(meta, xfmname.as_bytes());
        }
        DataKind::Vertex => meta = crc32c::crc32c_append(meta, b"\0vertex\0"),
    }
    match mask {
        None => meta = crc32c::crc32c_append(meta, b"\0nomask"),
        Some(Mask::Named(name)) => {
            meta = crc32c::crc32c_append(meta, b"\0named\0");
            meta = crc32c::crc32c_append(meta, name.as_bytes());
        }
        Some(Mask::Inline(array)) => {
            meta = crc32c::crc32c_append(meta, b"\0inline\0");
            meta = append_array(meta, array);
        }
    }

    let content = append_array(0, data);
    DataId::from_digest(meta, content)
}

fn append_array(crc: u32, array: &DataArray) -> u32 {
    let mut crc = crc32c::crc32c_append(crc, array.dtype().as_str().as_bytes());
    for dim in array.shape() {
        crc = crc32c::crc32c_append(crc, &(*dim as u64).to_le_bytes());
    }
    crc32c::crc32c_append(crc, &array.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use std::collections::HashSet;

    #[test]
    fn test_identical_data_is_equal_and_hashes_once() {
        let a = BrainData::volume(arr1(&[1.0f32, 2.0, 3.0]), "S1", "fullhead");
        let b = BrainData::volume(arr1(&[1.0f32, 2.0, 3.0]), "S1", "fullhead");

        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert!(!a.shares_data_with(&b));

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_transform_is_part_of_identity() {
        let a = BrainData::volume(arr1(&[1.0f32]), "S1", "fullhead");
        let b = BrainData::volume(arr1(&[1.0f32]), "S1", "other");
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_volume_and_vertex_differ() {
        let a = BrainData::vertex(arr1(&[1.0f32]), "S1");
        let b = BrainData::volume(arr1(&[1.0f32]), "S1", "fullhead");
        assert_ne!(a, b);
        assert_eq!(a.xfmname(), None);
        assert_eq!(b.xfmname(), Some("fullhead"));
    }

    #[test]
    fn test_named_mask_identity_by_name() {
        let a = BrainData::masked_volume(arr1(&[1.0f32]), "S1", "xfm", Mask::Named("thick".into()));
        let b = BrainData::masked_volume(arr1(&[1.0f32]), "S1", "xfm", Mask::Named("thick".into()));
        let c = BrainData::masked_volume(arr1(&[1.0f32]), "S1", "xfm", Mask::Named("thin".into()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_inline_mask_identity_by_content() {
        let a = BrainData::masked_volume(
            arr1(&[1.0f32]),
            "S1",
            "xfm",
            Mask::inline(arr1(&[true, false])),
        );
        let b = BrainData::masked_volume(
            arr1(&[1.0f32]),
            "S1",
            "xfm",
            Mask::inline(arr1(&[true, false])),
        );
        let c = BrainData::masked_volume(
            arr1(&[1.0f32]),
            "S1",
            "xfm",
            Mask::inline(arr1(&[false, true])),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_named_and_inline_mask_never_equal() {
        let named = BrainData::masked_volume(arr1(&[1.0f32]), "S1", "xfm", Mask::Named("m".into()));
        let inline =
            BrainData::masked_volume(arr1(&[1.0f32]), "S1", "xfm", Mask::inline(arr1(&[true])));
        let unmasked = BrainData::volume(arr1(&[1.0f32]), "S1", "xfm");
        assert_ne!(named, inline);
        assert_ne!(named, unmasked);
        assert_ne!(inline, unmasked);
        assert_eq!(named.mask().and_then(Mask::name), Some("m"));
        assert_eq!(inline.mask().and_then(Mask::name), None);
    }

    #[test]
    fn test_clone_shares_array() {
        let a = BrainData::vertex(arr1(&[1u8, 2]), "S1");
        let b = a.clone();
        assert!(a.shares_data_with(&b));
    }
}
