use apkforge_project::ValidationIssue;

/// Errors surfaced by a pipeline run or by the gateways it drives.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("project has {} blocking issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("export failed: {0}")]
    Export(String),

    #[error("archive failed: {0}")]
    Archive(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("capability unavailable: no upload channel is configured")]
    UploadUnavailable,

    #[error("build submission failed: {0}")]
    Submission(String),

    #[error("user is not authenticated")]
    Authentication,

    #[error("build status fetch failed: {0}")]
    Fetch(String),

    #[error("run superseded by a newer run")]
    Superseded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
