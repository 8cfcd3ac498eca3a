//! Adapters bridging the concrete project, transfer and build-service
//! crates to the gateway traits required by `apkforge-pipeline`.
//!
//! Each wrapper maps its crate's error type into the `PipelineError`
//! variant of the stage it serves. Blocking filesystem work runs on the
//! blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use apkforge_build_service::{BuildServiceClient, HttpUploader, ServiceError};
use apkforge_pipeline::{
    ArchiverGateway, BuildServiceGateway, ExporterGateway, GatewayFuture, Gateways, PipelineError,
    ProgressCallback, UploadGateway, Validator,
};
use apkforge_project::{ExportOptions, Project, ValidationIssue};
use apkforge_protocol::{ArtifactKey, Build, Session};

use crate::config::Config;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

pub struct ProjectValidator;

impl Validator for ProjectValidator {
    fn validate(&self, project: &Project) -> Vec<ValidationIssue> {
        apkforge_project::validate_project(project)
    }
}

pub struct ProjectExporter;

impl ExporterGateway for ProjectExporter {
    fn export<'a>(
        &'a self,
        project: &'a Project,
        output_dir: &'a Path,
        options: ExportOptions,
    ) -> GatewayFuture<'a, PathBuf> {
        let project = project.clone();
        let output_dir = output_dir.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                apkforge_project::export_project(&project, &output_dir, &options)
                    .map(|_| output_dir)
                    .map_err(|e| PipelineError::Export(e.to_string()))
            })
            .await
            .map_err(|e| PipelineError::Export(e.to_string()))?
        })
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

pub struct ZipArchiver;

impl ArchiverGateway for ZipArchiver {
    fn archive<'a>(&'a self, source_dir: &'a Path, dest_file: &'a Path) -> GatewayFuture<'a, PathBuf> {
        let source_dir = source_dir.to_path_buf();
        let dest_file = dest_file.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                apkforge_transfer::archive_dir(&source_dir, &dest_file)
                    .map(|_| dest_file)
                    .map_err(|e| PipelineError::Archive(e.to_string()))
            })
            .await
            .map_err(|e| PipelineError::Archive(e.to_string()))?
        })
    }
}

/// Uploads through the configured storage endpoint.
pub struct HttpUpload {
    uploader: HttpUploader,
}

impl HttpUpload {
    pub fn new(uploader: HttpUploader) -> Self {
        Self { uploader }
    }
}

impl UploadGateway for HttpUpload {
    fn upload<'a>(&'a self, file: &'a Path, on_progress: ProgressCallback) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            self.uploader
                .upload(file, on_progress)
                .await
                .map_err(|e| PipelineError::Upload(e.to_string()))
        })
    }
}

/// Stands in when no upload endpoint is configured.
pub struct NoUploadChannel;

impl UploadGateway for NoUploadChannel {
    fn upload<'a>(&'a self, _file: &'a Path, _on_progress: ProgressCallback) -> GatewayFuture<'a, String> {
        Box::pin(async { Err(PipelineError::UploadUnavailable) })
    }
}

// ---------------------------------------------------------------------------
// Build service
// ---------------------------------------------------------------------------

/// Implements `BuildServiceGateway` by delegating to `BuildServiceClient`.
pub struct ServiceAdapter {
    client: Arc<BuildServiceClient>,
}

impl ServiceAdapter {
    pub fn new(client: Arc<BuildServiceClient>) -> Self {
        Self { client }
    }
}

impl BuildServiceGateway for ServiceAdapter {
    fn submit<'a>(&'a self, session: &'a Session, storage_key: &'a str) -> GatewayFuture<'a, Build> {
        Box::pin(async move {
            self.client
                .submit(session, storage_key)
                .await
                .map_err(submission_error)
        })
    }

    fn fetch_status<'a>(&'a self, session: &'a Session, build_id: &'a str) -> GatewayFuture<'a, Build> {
        Box::pin(async move {
            self.client
                .get_build(session, build_id)
                .await
                .map_err(|e| PipelineError::Fetch(e.to_string()))
        })
    }

    fn download_url(&self, build: &Build, artifact: ArtifactKey) -> Option<String> {
        self.client.download_url(build, artifact)
    }
}

fn submission_error(e: ServiceError) -> PipelineError {
    match e {
        ServiceError::Unauthorized => PipelineError::Authentication,
        other => PipelineError::Submission(other.to_string()),
    }
}

/// Builds the HTTP client shared by the pipeline and the commands.
pub fn build_client(config: &Config) -> anyhow::Result<Arc<BuildServiceClient>> {
    let client = BuildServiceClient::new(
        &config.build_api_url,
        &config.downloads_url,
        config.http_timeout(),
    )?;
    Ok(Arc::new(client))
}

/// Wires every gateway from the configuration.
pub fn gateways(config: &Config, client: Arc<BuildServiceClient>) -> anyhow::Result<Gateways> {
    let uploader: Arc<dyn UploadGateway> = match &config.upload_url {
        Some(url) => Arc::new(HttpUpload::new(HttpUploader::new(url, config.http_timeout())?)),
        None => {
            tracing::warn!("no upload_url configured, uploads are unavailable");
            Arc::new(NoUploadChannel)
        }
    };

    Ok(Gateways {
        validator: Arc::new(ProjectValidator),
        exporter: Arc::new(ProjectExporter),
        archiver: Arc::new(ZipArchiver),
        uploader,
        build_service: Arc::new(ServiceAdapter::new(client)),
    })
}
