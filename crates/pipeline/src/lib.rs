//! Remote build pipeline for game projects.
//!
//! [`PipelineOrchestrator`] drives one run through export, compression,
//! upload and submission, publishing a [`PipelineRun`] snapshot after every
//! transition. Once the service accepts the build, polling moves to a
//! [`BuildWatcher`] until the build reaches a terminal status.
//!
//! The concrete exporter, archiver, uploader and build service are supplied
//! by the application through the traits in [`gateway`].

pub mod admission;
pub mod error;
pub mod gateway;
pub mod orchestrator;
mod state;
pub mod types;
pub mod watcher;

pub use admission::can_launch;
pub use error::PipelineError;
pub use gateway::{
    ArchiverGateway, BuildServiceGateway, ExporterGateway, GatewayFuture, Gateways,
    ProgressCallback, UploadGateway, Validator,
};
pub use orchestrator::PipelineOrchestrator;
pub use types::{
    AuthContext, PipelineEvent, PipelineFailure, PipelineRun, PipelineSettings, PipelineStage,
};
pub use watcher::{BuildUpdateCallback, BuildWatcher, WatchRequest, WatchSet};
