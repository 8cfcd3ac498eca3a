use std::fmt;
use std::path::{Path, PathBuf};

use apkforge_project::ValidationIssue;
use apkforge_protocol::{Build, Session};
use serde::Serialize;

/// Directory the project is exported into, under the work dir.
pub const EXPORT_DIR_NAME: &str = "OnlineCordovaExport";
/// Archive uploaded to storage, under the work dir.
pub const ARCHIVE_NAME: &str = "game-archive.zip";

/// Named step of a pipeline run.
///
/// Variants are declared in run order; a run only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Exporting,
    Compressing,
    Uploading,
    AwaitingBuild,
    /// Submission accepted; the watcher owns further progress.
    Building,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Exporting => "exporting",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::AwaitingBuild => "awaiting-build",
            Self::Building => "building",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Exporting => "Exporting the game...",
            Self::Compressing => "Compressing the game...",
            Self::Uploading => "Uploading the game...",
            Self::AwaitingBuild => "Launching the build...",
            Self::Building => "Building the game...",
        }
    }

    /// Message reported when a run fails during this stage.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Exporting => "Error while exporting the game.",
            Self::Compressing => "Error while compressing the game.",
            Self::Uploading => {
                "Error while uploading the game. Check your internet connection or try again later."
            }
            Self::AwaitingBuild => "Error while launching the build of the game.",
            Self::Idle | Self::Building => "Error while packaging the game.",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one pipeline execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    /// Increases with every started run. Zero means no run yet.
    pub run_id: u64,
    pub stage: PipelineStage,
    pub build: Option<Build>,
    pub upload_progress: u64,
    pub upload_total: u64,
    /// Sticky for the rest of the run once set.
    pub failed: bool,
}

impl PipelineRun {
    /// Whether a run is still moving through its stages.
    pub fn is_in_progress(&self) -> bool {
        !self.failed && !matches!(self.stage, PipelineStage::Idle | PipelineStage::Building)
    }

    /// Upload completion in percent, 0 when the total is unknown.
    pub fn upload_percentage(&self) -> f64 {
        if self.upload_total == 0 {
            return 0.0;
        }
        self.upload_progress as f64 * 100.0 / self.upload_total as f64
    }
}

/// The single error reported for a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    pub message: String,
    pub cause: String,
}

/// Ordered notifications from the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PipelineEvent {
    StateChanged(PipelineRun),
    ValidationFailed(Vec<ValidationIssue>),
    Failed(PipelineFailure),
    BuildUpdated(Build),
}

/// Who is running the pipeline. Submission needs a session.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    session: Option<Session>,
}

impl AuthContext {
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

/// Where a run writes its intermediate files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
}

impl PipelineSettings {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn export_dir(&self) -> PathBuf {
        self.work_dir.join(EXPORT_DIR_NAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(ARCHIVE_NAME)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
