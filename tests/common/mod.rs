//! Fixtures shared by the integration tests: a directory subject database
//! with one small subject, and brain data that fits it.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use cortexpack::data::{BrainData, Mask};
use ndarray::{arr2, Array1, Array3};
use ndarray_npy::write_npy;
use tempfile::TempDir;

pub const SUBJECT: &str = "S1";
pub const XFM: &str = "fullhead";
pub const MASK: &str = "thick";

/// Volume shape of the `fullhead` transform, as (z, y, x).
pub const VOLUME_SHAPE: (usize, usize, usize) = (2, 3, 4);
/// Vertices across both hemispheres.
pub const VERTICES: usize = 6;
/// Voxels the `thick` mask selects.
pub const MASKED_VOXELS: usize = 5;

pub const OVERLAY: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="rois"/></svg>"#;

/// The `thick` mask: the first five voxels in C order.
pub fn mask_array() -> Array3<bool> {
    let (_, ny, nx) = VOLUME_SHAPE;
    Array3::from_shape_fn(VOLUME_SHAPE, |(z, y, x)| z * ny * nx + y * nx + x < MASKED_VOXELS)
}

/// Writes a subject with `wm` and `pia` surfaces (three vertices per
/// hemisphere), the `fullhead` transform and the `thick` mask.
pub fn write_subject(root: &Path, subject: &str) {
    let dir = root.join(subject);
    let surfaces = dir.join("surfaces");
    let transform = dir.join("transforms").join(XFM);
    fs::create_dir_all(&surfaces).expect("create surfaces dir");
    fs::create_dir_all(&transform).expect("create transform dir");

    fs::write(dir.join("overlays.svg"), OVERLAY).expect("write overlay");

    for (surftype, z) in [("wm", 0.0f64), ("pia", 2.0)] {
        for (hemi, x) in [("lh", -1.0f64), ("rh", 1.0)] {
            write_npy(
                surfaces.join(format!("{}_{}.pts.npy", surftype, hemi)),
                &arr2(&[[x, 0.0, z], [x, 1.0, z], [x, 0.0, z + 1.0]]),
            )
            .expect("write pts");
            write_npy(
                surfaces.join(format!("{}_{}.polys.npy", surftype, hemi)),
                &arr2(&[[0u32, 1, 2]]),
            )
            .expect("write polys");
        }
    }

    fs::write(
        transform.join("matrices.json"),
        r#"{
            "coord": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
            "magnet": [[2, 0, 0, 0], [0, 2, 0, 0], [0, 0, 2, 0], [0, 0, 0, 1]],
            "shape": [2, 3, 4]
        }"#,
    )
    .expect("write matrices");
    write_npy(transform.join(format!("mask_{}.npy", MASK)), &mask_array()).expect("write mask");
}

/// A temporary subject database holding [`SUBJECT`].
pub fn filestore() -> TempDir {
    let dir = TempDir::new().expect("create tempdir");
    write_subject(dir.path(), SUBJECT);
    dir
}

pub fn volume(fill: f32) -> BrainData {
    BrainData::volume(Array3::from_elem(VOLUME_SHAPE, fill), SUBJECT, XFM)
}

pub fn vertex(fill: f32) -> BrainData {
    BrainData::vertex(Array1::from_elem(VERTICES, fill), SUBJECT)
}

pub fn masked(fill: f32) -> BrainData {
    BrainData::masked_volume(
        Array1::from_elem(MASKED_VOXELS, fill),
        SUBJECT,
        XFM,
        Mask::Named(MASK.to_string()),
    )
}
