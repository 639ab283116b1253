//! Diagnostics for network validation.
//!
//! Validation distinguishes hard structural errors (the solve cannot
//! proceed) from warnings (unusual but solvable, e.g. generation capacity
//! below peak load). Issues carry a severity, a category for grouping and
//! an optional entity reference, and serialize for JSON output.
//!
//! # Example
//!
//! ```
//! use exopf_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("capacity", "generation capacity below peak load");
//! diag.add_error_with_entity("reference", "references unknown bus b9", "line l1");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the solve can proceed.
    Warning,
    /// The network cannot be solved as given.
    Error,
}

/// A single issue found during validation.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping: "structure", "reference", "bounds",
    /// "series", "capacity".
    pub category: String,
    /// Human-readable description.
    pub message: String,
    /// Optional entity reference (e.g. "line l1", "generator wind").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    /// Add an entity reference to the issue.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}]", severity, self.category)?;
        if let Some(entity) = &self.entity {
            write!(f, " {entity}:")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Collection of validation issues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Issues in one category.
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_counts() {
        let mut diag = Diagnostics::new();
        assert!(!diag.has_issues());
        diag.add_warning("capacity", "low reserve");
        diag.add_error("structure", "no buses");
        diag.add_error_with_entity("reference", "references unknown bus x", "line l0");

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 2);
        assert!(diag.has_errors());
        assert!(diag.has_warnings());
        assert_eq!(diag.issues_by_category("reference").count(), 1);
    }

    #[test]
    fn test_display_carries_entity() {
        let issue = DiagnosticIssue::new(Severity::Error, "bounds", "s_nom_min > s_nom_max")
            .with_entity("line l2");
        let rendered = issue.to_string();
        assert!(rendered.contains("error"));
        assert!(rendered.contains("line l2"));
        assert!(rendered.contains("s_nom_min"));
    }
}
