//! Collaborator traits the pipeline drives.
//!
//! The application implements these on top of the concrete exporter,
//! archiver, upload transport and HTTP client. Keeping them as traits lets
//! the orchestrator and watcher be tested with in-memory mocks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use apkforge_project::{ExportOptions, Project, ValidationIssue};
use apkforge_protocol::{ArtifactKey, Build, Session};

use crate::error::PipelineError;

pub use apkforge_protocol::ProgressCallback;

/// Boxed future returned by every async gateway call.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

/// Pre-flight checks on a project.
pub trait Validator: Send + Sync {
    fn validate(&self, project: &Project) -> Vec<ValidationIssue>;
}

/// Native project export.
pub trait ExporterGateway: Send + Sync {
    /// Writes the exported project into `output_dir` and returns it.
    ///
    /// Implementations create or clear `output_dir` before writing.
    fn export<'a>(
        &'a self,
        project: &'a Project,
        output_dir: &'a Path,
        options: ExportOptions,
    ) -> GatewayFuture<'a, PathBuf>;
}

/// Compresses a directory into one file.
pub trait ArchiverGateway: Send + Sync {
    /// Returns `dest_file` once written.
    fn archive<'a>(&'a self, source_dir: &'a Path, dest_file: &'a Path) -> GatewayFuture<'a, PathBuf>;
}

/// Moves a file to remote storage.
pub trait UploadGateway: Send + Sync {
    /// Returns the storage key of the uploaded file.
    ///
    /// Fails with [`PipelineError::UploadUnavailable`] when no upload
    /// channel exists.
    fn upload<'a>(&'a self, file: &'a Path, on_progress: ProgressCallback) -> GatewayFuture<'a, String>;
}

/// Remote build service.
pub trait BuildServiceGateway: Send + Sync {
    fn submit<'a>(&'a self, session: &'a Session, storage_key: &'a str) -> GatewayFuture<'a, Build>;

    fn fetch_status<'a>(&'a self, session: &'a Session, build_id: &'a str) -> GatewayFuture<'a, Build>;

    /// Download location of an artifact, `None` if the build lacks it.
    fn download_url(&self, build: &Build, artifact: ArtifactKey) -> Option<String>;
}

/// Every collaborator one orchestrator needs.
#[derive(Clone)]
pub struct Gateways {
    pub validator: Arc<dyn Validator>,
    pub exporter: Arc<dyn ExporterGateway>,
    pub archiver: Arc<dyn ArchiverGateway>,
    pub uploader: Arc<dyn UploadGateway>,
    pub build_service: Arc<dyn BuildServiceGateway>,
}
