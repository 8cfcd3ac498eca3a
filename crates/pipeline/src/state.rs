//! Single-writer cell holding the current [`PipelineRun`].
//!
//! Every mutation names the run it belongs to. Writes from a superseded run,
//! or from a run that already failed, are dropped.

use apkforge_protocol::{Build, UploadProgress};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use crate::error::PipelineError;
use crate::types::{PipelineEvent, PipelineFailure, PipelineRun, PipelineStage};

pub(crate) struct RunCell {
    state: watch::Sender<PipelineRun>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl RunCell {
    pub(crate) fn new(events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        let (state, _) = watch::channel(PipelineRun::default());
        Self { state, events }
    }

    pub(crate) fn snapshot(&self) -> PipelineRun {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.state.subscribe()
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    /// Replaces the current run with a fresh one at `exporting`.
    pub(crate) fn begin(&self) -> u64 {
        let mut snapshot = PipelineRun::default();
        self.state.send_modify(|run| {
            *run = PipelineRun {
                run_id: run.run_id + 1,
                stage: PipelineStage::Exporting,
                ..PipelineRun::default()
            };
            snapshot = run.clone();
        });
        let run_id = snapshot.run_id;
        self.emit(PipelineEvent::StateChanged(snapshot));
        run_id
    }

    /// Applies `f` to the run if it is still `run_id` and has not failed.
    ///
    /// `f` returns whether it changed anything; a change is published as a
    /// snapshot and a `StateChanged` event.
    fn update(&self, run_id: u64, f: impl FnOnce(&mut PipelineRun) -> bool) -> bool {
        let mut snapshot = None;
        self.state.send_if_modified(|run| {
            if run.run_id != run_id || run.failed || !f(run) {
                return false;
            }
            snapshot = Some(run.clone());
            true
        });
        match snapshot {
            Some(run) => {
                self.emit(PipelineEvent::StateChanged(run));
                true
            }
            None => false,
        }
    }

    /// Moves the run forward to `stage`.
    ///
    /// Returns `false` if the run was superseded or failed, or if `stage`
    /// would not be a step forward.
    pub(crate) fn advance(&self, run_id: u64, stage: PipelineStage) -> bool {
        self.update(run_id, |run| {
            if stage <= run.stage {
                return false;
            }
            run.stage = stage;
            true
        })
    }

    /// Records upload progress. Only applies while the run is uploading.
    pub(crate) fn progress(&self, run_id: u64, progress: UploadProgress) -> bool {
        self.update(run_id, |run| {
            if run.stage != PipelineStage::Uploading {
                return false;
            }
            let unchanged = run.upload_progress == progress.transferred_bytes
                && run.upload_total == progress.total_bytes;
            run.upload_progress = progress.transferred_bytes;
            run.upload_total = progress.total_bytes;
            !unchanged
        })
    }

    /// Stores the accepted build and moves to `building` in one step.
    pub(crate) fn submitted(&self, run_id: u64, build: Build) -> bool {
        self.update(run_id, |run| {
            if run.stage != PipelineStage::AwaitingBuild {
                return false;
            }
            run.stage = PipelineStage::Building;
            run.build = Some(build);
            true
        })
    }

    /// Replaces the run's build with a fresher copy from the watcher.
    pub(crate) fn build_updated(&self, run_id: u64, build: &Build) -> bool {
        let written = self.update(run_id, |run| match &run.build {
            Some(current) if current.id == build.id && current != build => {
                run.build = Some(build.clone());
                true
            }
            _ => false,
        });
        if written {
            self.emit(PipelineEvent::BuildUpdated(build.clone()));
        }
        written
    }

    /// Marks the run failed and reports `cause` once.
    ///
    /// A second call for the same run, or a call for a superseded run, does
    /// nothing and returns `false`.
    pub(crate) fn fail(&self, run_id: u64, cause: &PipelineError) -> bool {
        let mut failed_at = None;
        let mut snapshot = None;
        self.state.send_if_modified(|run| {
            if run.run_id != run_id || run.failed {
                return false;
            }
            run.failed = true;
            failed_at = Some(run.stage);
            snapshot = Some(run.clone());
            true
        });
        let (Some(stage), Some(run)) = (failed_at, snapshot) else {
            debug!(run_id, error = %cause, "failure ignored");
            return false;
        };

        let failure = PipelineFailure {
            stage,
            message: stage.failure_message().to_string(),
            cause: cause.to_string(),
        };
        error!(run_id, stage = %stage, error = %cause, "{}", failure.message);
        self.emit(PipelineEvent::StateChanged(run));
        self.emit(PipelineEvent::Failed(failure));
        true
    }
}
