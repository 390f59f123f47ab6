//! Typed n-dimensional arrays carried by brain data and subject resources.
//!
//! The package stores every array as an `.npy` blob, so the element types
//! here are the ones `ndarray-npy` can read and write without extra
//! descriptors.

use std::fmt;

use ndarray::{Array, ArrayD, Dimension};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use serde::{Deserialize, Serialize};

use crate::error::CortexError;

/// Element type of a [`DataArray`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    U8,
    U32,
    Bool,
}

impl DType {
    /// Short stable name, used in identity hashing and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U32 => "u32",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owned, dynamically-shaped numeric array.
#[derive(Clone, Debug)]
pub enum DataArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U32(ArrayD<u32>),
    Bool(ArrayD<bool>),
}

macro_rules! each_variant {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            DataArray::F32($arr) => $body,
            DataArray::F64($arr) => $body,
            DataArray::I32($arr) => $body,
            DataArray::I64($arr) => $body,
            DataArray::U8($arr) => $body,
            DataArray::U32($arr) => $body,
            DataArray::Bool($arr) => $body,
        }
    };
}

macro_rules! impl_from_array {
    ($elem:ty, $variant:ident) => {
        impl<D: Dimension> From<Array<$elem, D>> for DataArray {
            fn from(array: Array<$elem, D>) -> Self {
                DataArray::$variant(array.into_dyn())
            }
        }
    };
}

impl_from_array!(f32, F32);
impl_from_array!(f64, F64);
impl_from_array!(i32, I32);
impl_from_array!(i64, I64);
impl_from_array!(u8, U8);
impl_from_array!(u32, U32);
impl_from_array!(bool, Bool);

impl DataArray {
    /// Element type of this array.
    pub fn dtype(&self) -> DType {
        match self {
            DataArray::F32(_) => DType::F32,
            DataArray::F64(_) => DType::F64,
            DataArray::I32(_) => DType::I32,
            DataArray::I64(_) => DType::I64,
            DataArray::U8(_) => DType::U8,
            DataArray::U32(_) => DType::U32,
            DataArray::Bool(_) => DType::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `true` elements, for boolean arrays only.
    pub fn count_true(&self) -> Option<usize> {
        match self {
            DataArray::Bool(a) => Some(a.iter().filter(|v| **v).count()),
            _ => None,
        }
    }

    /// Elements in logical (row-major) order as little-endian bytes.
    ///
    /// Booleans encode as a single `0`/`1` byte each.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * 8);
        match self {
            DataArray::F32(a) => a.iter().for_each(|v| out.extend(v.to_bits().to_le_bytes())),
            DataArray::F64(a) => a.iter().for_each(|v| out.extend(v.to_bits().to_le_bytes())),
            DataArray::I32(a) => a.iter().for_each(|v| out.extend(v.to_le_bytes())),
            DataArray::I64(a) => a.iter().for_each(|v| out.extend(v.to_le_bytes())),
            DataArray::U8(a) => out.extend(a.iter().copied()),
            DataArray::U32(a) => a.iter().for_each(|v| out.extend(v.to_le_bytes())),
            DataArray::Bool(a) => out.extend(a.iter().map(|v| u8::from(*v))),
        }
        out
    }

    /// Numeric contents widened to `f64`. Returns `None` for boolean arrays.
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        match self {
            DataArray::F32(a) => Some(a.mapv(f64::from)),
            DataArray::F64(a) => Some(a.clone()),
            DataArray::I32(a) => Some(a.mapv(f64::from)),
            DataArray::I64(a) => Some(a.mapv(|v| v as f64)),
            DataArray::U8(a) => Some(a.mapv(f64::from)),
            DataArray::U32(a) => Some(a.mapv(f64::from)),
            DataArray::Bool(_) => None,
        }
    }

    /// Integer contents as vertex indices. Returns `None` for non-integer
    /// arrays or when any value is negative or does not fit in `u32`.
    pub fn to_indices(&self) -> Option<ArrayD<u32>> {
        match self {
            DataArray::U32(a) => Some(a.clone()),
            DataArray::U8(a) => Some(a.mapv(u32::from)),
            DataArray::I32(a) => {
                if a.iter().any(|v| *v < 0) {
                    return None;
                }
                Some(a.mapv(|v| v as u32))
            }
            DataArray::I64(a) => {
                if a.iter().any(|v| *v < 0 || *v > i64::from(u32::MAX)) {
                    return None;
                }
                Some(a.mapv(|v| v as u32))
            }
            _ => None,
        }
    }

    /// Encodes the array as an `.npy` blob.
    pub fn to_npy_bytes(&self, entry: &str) -> Result<Vec<u8>, CortexError> {
        let mut buf = Vec::new();
        each_variant!(self, a => a.write_npy(&mut buf)).map_err(|source| CortexError::NpyWrite {
            entry: entry.to_string(),
            source,
        })?;
        Ok(buf)
    }

    /// Decodes an `.npy` blob of any supported element type.
    pub fn from_npy_bytes(entry: &str, bytes: &[u8]) -> Result<Self, CortexError> {
        // npy descriptors are distinct per dtype, so at most one reader succeeds.
        let mut last_err = String::from("empty input");
        macro_rules! attempt {
            ($elem:ty) => {
                match ArrayD::<$elem>::read_npy(bytes) {
                    Ok(array) => return Ok(DataArray::from(array)),
                    Err(err) => last_err = err.to_string(),
                }
            };
        }
        attempt!(f64);
        attempt!(f32);
        attempt!(i32);
        attempt!(i64);
        attempt!(u8);
        attempt!(u32);
        attempt!(bool);

        Err(CortexError::NpyRead {
            entry: entry.to_string(),
            message: last_err,
        })
    }
}

impl PartialEq for DataArray {
    fn eq(&self, other: &Self) -> bool {
        if self.dtype() != other.dtype() || self.shape() != other.shape() {
            return false;
        }
        match (self, other) {
            (DataArray::F32(a), DataArray::F32(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (DataArray::F64(a), DataArray::F64(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (DataArray::I32(a), DataArray::I32(b)) => a == b,
            (DataArray::I64(a), DataArray::I64(b)) => a == b,
            (DataArray::U8(a), DataArray::U8(b)) => a == b,
            (DataArray::U32(a), DataArray::U32(b)) => a == b,
            (DataArray::Bool(a), DataArray::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataArray {}
