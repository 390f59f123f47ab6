//! Subject-level resources: surfaces and coordinate transforms.

use std::fmt;

use ndarray::{concatenate, Array2, Axis, Ix2};

use super::array::DataArray;
use crate::error::CortexError;

/// Cortical hemisphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    /// Both hemispheres, left first.
    pub const BOTH: [Hemisphere; 2] = [Hemisphere::Left, Hemisphere::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hemisphere::Left => "lh",
            Hemisphere::Right => "rh",
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which matrix of a transform to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XfmKind {
    /// Maps volume voxel coordinates to surface coordinates. The only kind a
    /// package stores.
    Coord,
    /// Maps volume voxel coordinates to scanner (magnet) space.
    Magnet,
}

impl XfmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XfmKind::Coord => "coord",
            XfmKind::Magnet => "magnet",
        }
    }
}

/// A named affine transform together with the shape of its target volume.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    /// 4x4 affine matrix.
    pub matrix: Array2<f64>,
    /// Volume shape as (z, y, x).
    pub shape: [usize; 3],
}

impl Transform {
    pub fn new(matrix: Array2<f64>, shape: [usize; 3]) -> Self {
        Self { matrix, shape }
    }
}

/// A triangle mesh for one hemisphere.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    /// Vertex positions, one row of (x, y, z) per vertex.
    pub pts: Array2<f64>,
    /// Triangles as vertex index triples.
    pub polys: Array2<u32>,
}

impl Surface {
    pub fn new(pts: Array2<f64>, polys: Array2<u32>) -> Self {
        Self { pts, polys }
    }

    /// Converts stored arrays into a surface, accepting any numeric point
    /// type and any non-negative integer index type.
    pub fn from_arrays(what: &str, pts: &DataArray, polys: &DataArray) -> Result<Self, CortexError> {
        let pts = pts
            .to_f64()
            .and_then(|a| a.into_dimensionality::<Ix2>().ok())
            .filter(|a| a.ncols() == 3)
            .ok_or_else(|| CortexError::ShapeMismatch {
                subject: what.to_string(),
                expected: "points of shape (n, 3)".to_string(),
                got: pts.shape().to_vec(),
            })?;
        let polys = polys
            .to_indices()
            .and_then(|a| a.into_dimensionality::<Ix2>().ok())
            .filter(|a| a.ncols() == 3)
            .ok_or_else(|| CortexError::ShapeMismatch {
                subject: what.to_string(),
                expected: "non-negative triangles of shape (m, 3)".to_string(),
                got: polys.shape().to_vec(),
            })?;
        Ok(Self { pts, polys })
    }

    pub fn vertex_count(&self) -> usize {
        self.pts.nrows()
    }

    /// Joins left and right meshes; right indices are offset by the left
    /// vertex count.
    pub fn merge(left: &Surface, right: &Surface) -> Result<Surface, CortexError> {
        let mismatch = |got: &[usize]| CortexError::ShapeMismatch {
            subject: "merged surface".to_string(),
            expected: "three columns in both hemispheres".to_string(),
            got: got.to_vec(),
        };
        let overflow = || CortexError::ShapeMismatch {
            subject: "merged surface".to_string(),
            expected: "vertex indices that fit in u32".to_string(),
            got: vec![left.vertex_count(), right.vertex_count()],
        };
        let offset = u32::try_from(left.vertex_count()).map_err(|_| overflow())?;
        let mut shifted = right.polys.clone();
        for index in shifted.iter_mut() {
            *index = index.checked_add(offset).ok_or_else(overflow)?;
        }
        let pts = concatenate(Axis(0), &[left.pts.view(), right.pts.view()])
            .map_err(|_| mismatch(right.pts.shape()))?;
        let polys = concatenate(Axis(0), &[left.polys.view(), shifted.view()])
            .map_err(|_| mismatch(right.polys.shape()))?;
        Ok(Surface { pts, polys })
    }

    /// Halfway surface between white matter and pial meshes, keeping the
    /// white matter triangles.
    pub fn midpoint(what: &str, wm: &Surface, pia: &Surface) -> Result<Surface, CortexError> {
        if wm.pts.dim() != pia.pts.dim() {
            return Err(CortexError::ShapeMismatch {
                subject: what.to_string(),
                expected: format!("pial points of shape {:?}", wm.pts.dim()),
                got: pia.pts.shape().to_vec(),
            });
        }
        let pts = (&wm.pts + &pia.pts) / 2.0;
        Ok(Surface {
            pts,
            polys: wm.polys.clone(),
        })
    }

    /// Shifts the mesh along x so the hemispheres sit side by side at the
    /// midline.
    pub fn nudged(mut self, hemi: Hemisphere) -> Self {
        let xs = self.pts.column(0);
        let shift = match hemi {
            Hemisphere::Left => xs.fold(f64::NEG_INFINITY, |m, v| m.max(*v)),
            Hemisphere::Right => xs.fold(f64::INFINITY, |m, v| m.min(*v)),
        };
        if shift.is_finite() {
            self.pts.column_mut(0).mapv_inplace(|v| v - shift);
        }
        self
    }
}
