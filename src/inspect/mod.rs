//! Package inspection.
//!
//! Produces a summary of a loaded dataset: its views, how much stored data
//! they share, and which subject resources the package carries.

mod report;

pub use report::{InspectReport, PackedSubject, PackedTransform, SummarySection, ViewRow};

use crate::data::Mask;
use crate::database::packed::{rois_path, subject_path, xfm_path};
use crate::dataset::Dataset;
use crate::package::{Package, SUBJECTS};

/// Options for package inspection.
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Number of views to list in the view table.
    pub max_views: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self { max_views: 50 }
    }
}

/// Inspect a dataset and its backing package.
///
/// `skipped_entries` is the number of entries the load left out, as
/// returned by [`Dataset::from_file_with`].
pub fn inspect_dataset(
    dataset: &Dataset,
    skipped_entries: usize,
    opts: &InspectOptions,
) -> InspectReport {
    let subjects = dataset.package().map(packed_subjects).unwrap_or_default();

    let summary = SummarySection {
        views: dataset.len(),
        unique_data: dataset.uniques().len(),
        data_refs: dataset.iter().map(|(_, view)| view.channels().len()).sum(),
        skipped_entries,
        packed_subjects: subjects.len(),
    };

    let views = dataset
        .iter()
        .take(opts.max_views)
        .map(|(name, view)| {
            let first = &view.channels()[0];
            ViewRow {
                name: name.to_string(),
                kind: view.kind().to_string(),
                priority: view.priority(),
                subject: view.subject().to_string(),
                xfmname: view.xfmname().map(str::to_string),
                shape: first.data().shape().to_vec(),
                dtype: first.data().dtype().to_string(),
                mask: first.mask().map(|mask| match mask {
                    Mask::Named(name) => format!("named:{}", name),
                    Mask::Inline(_) => "inline".to_string(),
                }),
            }
        })
        .collect();

    InspectReport {
        path: dataset.path().map(|p| p.display().to_string()),
        summary,
        views,
        views_omitted: dataset.len().saturating_sub(opts.max_views),
        subjects,
    }
}

/// Lists what the `subjects` region holds.
fn packed_subjects(package: &Package) -> Vec<PackedSubject> {
    package
        .children(SUBJECTS)
        .into_iter()
        .map(|name| {
            let base = subject_path(&name);
            let transforms = package
                .children(&format!("{}/transforms", base))
                .into_iter()
                .map(|xfm| PackedTransform {
                    masks: package.children(&format!("{}/masks", xfm_path(&name, &xfm))),
                    name: xfm,
                })
                .collect();
            PackedSubject {
                has_overlay: package.get(&rois_path(&name)).is_some(),
                surfaces: package.children(&format!("{}/surfaces", base)),
                transforms,
                name,
            }
        })
        .collect()
}
