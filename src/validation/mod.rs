//! Package validation for cortexpack.
//!
//! Checks a package as stored, before it is turned into a dataset:
//! - Structural integrity (view type tags, channel counts, data references)
//! - Data quality (arrays and subject attributes present, shapes that fit)
//! - Self-containment (subjects, transforms and masks packed into the file)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{BTreeSet, HashSet};

use crate::data::ViewKind;
use crate::database::packed::{mask_path, subject_path, xfm_path};
use crate::database::{PackedSubjects, Resolver};
use crate::dataset::codec::{self, MASK, REFS, SUBJECT, TYPE, XFMNAME};
use crate::error::CortexError;
use crate::package::{Package, DATA, RESERVED, VIEWS};

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// Validates a package and returns a report of all issues found.
pub fn validate_package(package: &Package, _opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();
    let packed = PackedSubjects::new(package);
    let resolver = Resolver::new().with_source(&packed);

    let referenced = validate_views(package, &mut report);
    validate_data(package, &referenced, &resolver, &mut report);
    validate_strays(package, &resolver, &mut report);
    validate_references(package, &mut report);

    report
}

/// Validates every view node. Returns the data ids views refer to.
fn validate_views(package: &Package, report: &mut ValidationReport) -> HashSet<String> {
    let mut referenced = HashSet::new();

    for name in package.children(VIEWS) {
        let context = || IssueContext::View { name: name.clone() };
        let Some(node) = package.get(&codec::view_path(&name)) else {
            report.add(ValidationIssue::error(
                IssueCode::InvalidViewType,
                "View has no attributes",
                context(),
            ));
            continue;
        };

        let Some(kind) = node.attr_str(TYPE).and_then(ViewKind::from_tag) else {
            report.add(ValidationIssue::error(
                IssueCode::InvalidViewType,
                format!("Unknown view type {:?}", node.attr_str(TYPE).unwrap_or("")),
                context(),
            ));
            continue;
        };

        let refs: Vec<&str> = node
            .attrs
            .get(REFS)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if refs.is_empty() {
            report.add(ValidationIssue::error(
                IssueCode::EmptyView,
                "View refers to no data",
                context(),
            ));
            continue;
        }
        if refs.len() != kind.channels() {
            report.add(ValidationIssue::error(
                IssueCode::ChannelCountMismatch,
                format!(
                    "{} view needs {} data reference(s), has {}",
                    kind,
                    kind.channels(),
                    refs.len()
                ),
                context(),
            ));
        }

        let mut subjects = BTreeSet::new();
        let mut xfms = BTreeSet::new();
        for id in refs {
            referenced.insert(id.to_string());
            match package.get(&format!("{}/{}", DATA, id)) {
                Some(data) => {
                    subjects.extend(data.attr_str(SUBJECT));
                    xfms.insert(data.attr_str(XFMNAME));
                }
                None => report.add(ValidationIssue::error(
                    IssueCode::DanglingDataRef,
                    format!("Refers to missing data entry {}", id),
                    context(),
                )),
            }
        }
        if subjects.len() > 1 {
            report.add(ValidationIssue::error(
                IssueCode::MixedSubjects,
                format!("Channels belong to subjects {:?}", subjects),
                context(),
            ));
        }
        if xfms.len() > 1 {
            report.add(ValidationIssue::error(
                IssueCode::MixedTransforms,
                format!("Channels use transforms {:?}", xfms),
                context(),
            ));
        }
    }

    referenced
}

/// Validates every `/data` entry.
fn validate_data(
    package: &Package,
    referenced: &HashSet<String>,
    resolver: &Resolver<'_>,
    report: &mut ValidationReport,
) {
    for id in package.children(DATA) {
        let path = format!("{}/{}", DATA, id);
        let context = IssueContext::Data { id: id.clone() };

        let node = package.get(&path);
        if node.and_then(|n| n.array.as_ref()).is_none() {
            report.add(ValidationIssue::error(
                IssueCode::MissingArray,
                "Data entry has no array",
                context,
            ));
            continue;
        }
        if node.and_then(|n| n.attr_str(SUBJECT)).is_none() {
            report.add(ValidationIssue::error(
                IssueCode::MissingSubject,
                "Data entry has no subject attribute",
                context,
            ));
            continue;
        }

        if !referenced.contains(&id) {
            report.add(ValidationIssue::warning(
                IssueCode::OrphanedData,
                "No view refers to this data; it loads as a view of its own",
                context.clone(),
            ));
        }
        check_shape(package, &path, resolver, context, report);
    }
}

/// Validates top-level entries outside the reserved regions.
fn validate_strays(package: &Package, resolver: &Resolver<'_>, report: &mut ValidationReport) {
    for name in package.children("") {
        if RESERVED.contains(&name.as_str()) {
            continue;
        }
        let context = IssueContext::Entry { path: name.clone() };
        let complete = package
            .get(&name)
            .is_some_and(|n| n.array.is_some() && n.attr_str(SUBJECT).is_some());

        if complete {
            report.add(ValidationIssue::warning(
                IssueCode::StrayEntry,
                "Entry outside views/data loads as a view of its own",
                context.clone(),
            ));
            check_shape(package, &name, resolver, context, report);
        } else {
            report.add(ValidationIssue::warning(
                IssueCode::StrayWithoutMetadata,
                "Entry has no array or subject and is skipped on load",
                context,
            ));
        }
    }
}

fn check_shape(
    package: &Package,
    path: &str,
    resolver: &Resolver<'_>,
    context: IssueContext,
    report: &mut ValidationReport,
) {
    if let Err(CortexError::ShapeMismatch { expected, got, .. }) =
        codec::read_brain_data(package, path, resolver)
    {
        report.add(ValidationIssue::error(
            IssueCode::ShapeMismatch,
            format!("Expected {}, got shape {:?}", expected, got),
            context,
        ));
    }
}

/// Warns about subject resources the package refers to but doesn't carry.
fn validate_references(package: &Package, report: &mut ValidationReport) {
    let mut subjects = BTreeSet::new();
    let mut xfms = BTreeSet::new();
    let mut masks = BTreeSet::new();

    let data_paths = package
        .children(DATA)
        .into_iter()
        .map(|id| format!("{}/{}", DATA, id))
        .chain(
            package
                .children("")
                .into_iter()
                .filter(|name| !RESERVED.contains(&name.as_str())),
        );
    for path in data_paths {
        let Some(node) = package.get(&path) else {
            continue;
        };
        let Some(subject) = node.attr_str(SUBJECT) else {
            continue;
        };
        subjects.insert(subject.to_string());
        if let Some(xfmname) = node.attr_str(XFMNAME) {
            xfms.insert((subject.to_string(), xfmname.to_string()));
            if let Some(mask) = node.attr_str(MASK) {
                masks.insert((subject.to_string(), xfmname.to_string(), mask.to_string()));
            }
        }
    }

    for subject in subjects {
        if !package.contains(&subject_path(&subject)) {
            report.add(ValidationIssue::warning(
                IssueCode::UnpackedSubject,
                "Subject is not packed; surfaces must come from a subject database",
                IssueContext::Subject { name: subject },
            ));
        }
    }
    for (subject, xfmname) in xfms {
        if package.get(&format!("{}/xfm", xfm_path(&subject, &xfmname))).is_none() {
            report.add(ValidationIssue::warning(
                IssueCode::UnpackedTransform,
                format!("Transform '{}' is not packed", xfmname),
                IssueContext::Subject { name: subject },
            ));
        }
    }
    for (subject, xfmname, mask) in masks {
        if package.get(&mask_path(&subject, &xfmname, &mask)).is_none() {
            report.add(ValidationIssue::warning(
                IssueCode::UnpackedMask,
                format!("Mask '{}' for transform '{}' is not packed", mask, xfmname),
                IssueContext::Subject { name: subject },
            ));
        }
    }
}
