//! Pre-flight checks run before a remote build is attempted.
//!
//! Every rule that fails yields one [`ValidationIssue`]. An empty list means
//! the project can be packaged.

use std::fmt;

use serde::Serialize;

use crate::manifest::Project;

/// A blocking problem found in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks a project for errors that would make the remote build fail.
pub fn validate_project(project: &Project) -> Vec<ValidationIssue> {
    let manifest = project.manifest();
    let mut issues = Vec::new();

    if manifest.name.trim().is_empty() {
        issues.push(ValidationIssue::new("name", "the game has no name"));
    }

    if !is_valid_package_name(&manifest.package_name) {
        issues.push(ValidationIssue::new(
            "packageName",
            format!(
                "'{}' is not a valid package name (expected something like com.example.mygame)",
                manifest.package_name
            ),
        ));
    }

    if !is_valid_version(&manifest.version) {
        issues.push(ValidationIssue::new(
            "version",
            format!(
                "'{}' is not a valid version (expected MAJOR.MINOR.PATCH)",
                manifest.version
            ),
        ));
    }

    let source_dir = project.source_dir();
    if !source_dir.is_dir() {
        issues.push(ValidationIssue::new(
            "sourceDir",
            format!("directory {} does not exist", source_dir.display()),
        ));
    } else if !source_dir.join("index.html").is_file() {
        issues.push(ValidationIssue::new(
            "sourceDir",
            format!("{} has no index.html", source_dir.display()),
        ));
    }

    issues
}

/// Reverse-domain identifier: at least two segments, each starting with a
/// letter and made of `[A-Za-z0-9_]`.
fn is_valid_package_name(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() < 2 {
        return false;
    }
    segments.iter().all(|seg| {
        let mut chars = seg.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn is_valid_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
