use std::fmt;

/// How serious a reported issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The candidate (or document) is rejected.
    Error,
    /// Worth surfacing, but does not change the verdict.
    Warning,
}

/// A single finding, located by a JSON-pointer-like path (e.g. `/methods/0/name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The result of a structural validation pass.
///
/// Every check runs and reports into the same value, so a single report covers
/// every defect instead of stopping at the first one.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, path: impl Into<String>, msg: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Error,
            path: path.into(),
            message: msg.into(),
        });
    }

    pub fn add_warning(&mut self, path: impl Into<String>, msg: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Warning,
            path: path.into(),
            message: msg.into(),
        });
    }

    /// Appends every issue of `other`, keeping their order.
    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// The first error, which is what callers that can only raise one message report.
    pub fn first_error(&self) -> Option<&ValidationIssue> {
        self.errors().next()
    }

    /// All errors joined into one displayable line.
    pub fn summary(&self) -> String {
        self.errors()
            .map(ValidationIssue::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "valid");
        }
        write!(f, "{}", self.summary())
    }
}
