//! Validation report types for structured error reporting.
//!
//! Reports can be printed for people or serialized to JSON for scripts.

use std::fmt;

use serde::Serialize;

/// The result of validating a package.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// All issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Creates a new empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Adds an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns the number of errors in the report.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings in the report.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if validation passed in strict mode (no errors or warnings).
    pub fn is_ok_strict(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue carries `code`.
    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// JSON document with counts and issues.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error_count": self.error_count(),
            "warning_count": self.warning_count(),
            "issues": self.issues,
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Validation passed: no issues found");
        }

        writeln!(
            f,
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,

    /// A stable code for the issue type.
    pub code: IssueCode,

    pub message: String,

    /// Where in the package the issue occurred.
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    /// Creates a new error.
    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    /// Creates a new warning.
    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

/// The severity of a validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The package loads, but something looks off.
    Warning,
    /// The package cannot be loaded as written.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    // View issues
    /// A view has no type tag or an unknown one.
    InvalidViewType,
    /// A view refers to no data at all.
    EmptyView,
    /// A view's data count doesn't match its type (1, or 3 for RGB).
    ChannelCountMismatch,
    /// A view refers to a `/data` entry that doesn't exist.
    DanglingDataRef,
    /// Channels of one view belong to different subjects.
    MixedSubjects,
    /// Channels of one view use different transforms or data kinds.
    MixedTransforms,

    // Data issues
    /// A data entry has no array.
    MissingArray,
    /// A data entry has no subject attribute.
    MissingSubject,
    /// A data entry no view refers to; it loads as its own view.
    OrphanedData,
    /// Array shape doesn't fit the subject's transform, mask or surfaces.
    ShapeMismatch,

    // Top-level entries
    /// A top-level entry outside the reserved regions; it loads as a view.
    StrayEntry,
    /// A top-level entry that will be skipped on load.
    StrayWithoutMetadata,

    // Self-containment
    /// Data refers to a subject not packed into the file.
    UnpackedSubject,
    /// Volume data refers to a transform not packed into the file.
    UnpackedTransform,
    /// Volume data refers to a named mask not packed into the file.
    UnpackedMask,
}

/// Where a validation issue occurred.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueContext {
    /// The package as a whole.
    Package,
    View { name: String },
    Data { id: String },
    /// A stray top-level entry.
    Entry { path: String },
    Subject { name: String },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Package => write!(f, "package"),
            IssueContext::View { name } => write!(f, "view '{}'", name),
            IssueContext::Data { id } => write!(f, "data {}", id),
            IssueContext::Entry { path } => write!(f, "entry '{}'", path),
            IssueContext::Subject { name } => write!(f, "subject '{}'", name),
        }
    }
}
