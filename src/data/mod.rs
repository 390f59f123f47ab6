//! Value types for brain data and the views built from them.
//!
//! # Design Principles
//!
//! 1. **Closed variants**: brain data is either volume or vertex data and a
//!    view is one of four kinds. Everything dispatches by `match`, never by
//!    inspecting runtime types.
//!
//! 2. **Immutable, shared arrays**: a [`BrainData`] never changes after
//!    construction. Clones share the array, which is how relabelled datasets
//!    and deduplicated loads keep one copy of each array in memory.
//!
//! 3. **Identity by value**: equality and hashing follow subject, transform,
//!    mask and contents, so identical data collapse to one stored entry.
//!
//! # Example
//!
//! ```
//! use cortexpack::data::{BrainData, View};
//! use ndarray::arr1;
//!
//! let a = BrainData::volume(arr1(&[0.5f32, 1.5]), "S1", "fullhead");
//! let b = BrainData::volume(arr1(&[0.5f32, 1.5]), "S1", "fullhead");
//! assert_eq!(a, b);
//!
//! let view = View::new(a).with_cmap("RdBu_r").with_priority(1);
//! assert_eq!(view.channels().len(), 1);
//! ```

mod array;
mod braindata;
mod ids;
mod subject;
mod view;

pub use array::{DType, DataArray};
pub use braindata::{BrainData, DataKind, Mask};
pub use ids::DataId;
pub use subject::{Hemisphere, Surface, Transform, XfmKind};
pub use view::{DisplayAttrs, View, ViewKind, DEFAULT_PRIORITY};
