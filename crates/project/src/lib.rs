//! Game project handling for the packager.
//!
//! A project is a directory holding a `project.json` manifest and a source
//! directory with the game's web build. This crate loads the manifest,
//! checks it for blocking errors before a remote build is attempted, and
//! exports the sources into a Cordova-shaped directory ready to archive.
//!
//! It has no knowledge of the build pipeline; the app wires [`export_project`]
//! and [`validate_project`] into the pipeline's gateway traits.

pub mod error;
pub mod export;
pub mod manifest;
pub mod scanner;
pub mod validation;

pub use error::ProjectError;
pub use export::{ExportOptions, export_project, prepare_output_dir};
pub use manifest::{MANIFEST_FILE, Orientation, Project, ProjectManifest};
pub use scanner::{ScannedFile, scan_files};
pub use validation::{ValidationIssue, validate_project};
