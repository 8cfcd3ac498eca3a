//! Shared types for the remote build service.
//!
//! Every other crate in the workspace speaks in these types: the build
//! record returned by the service, the artifacts it exposes, the usage
//! limits attached to an account, and upload progress counters.

pub mod build;
pub mod types;

pub use build::{ArtifactKey, Build, BuildStatus, BuildType, ParseArtifactKeyError};
pub use types::{BuildLimit, CORDOVA_BUILD_LIMIT, ProgressCallback, Session, UploadProgress};
