//! Pipeline orchestrator.
//!
//! Sequences validation, export, compression, upload and submission for one
//! project, then hands the accepted build to the [`BuildWatcher`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use apkforge_project::{ExportOptions, Project};
use apkforge_protocol::{ArtifactKey, Build, UploadProgress};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::gateway::{Gateways, ProgressCallback};
use crate::state::RunCell;
use crate::types::{AuthContext, PipelineEvent, PipelineRun, PipelineSettings, PipelineStage};
use crate::watcher::{BuildUpdateCallback, BuildWatcher, WatchRequest};

struct Inner {
    gateways: Gateways,
    settings: PipelineSettings,
    cell: Arc<RunCell>,
    watcher: BuildWatcher,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PipelineEvent>>>,
}

/// Drives pipeline runs and publishes their state.
///
/// Cheap to clone; clones share the same run state and watcher.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    inner: Arc<Inner>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator whose watcher polls every `poll_interval`.
    pub fn new(gateways: Gateways, settings: PipelineSettings, poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watcher = BuildWatcher::new(gateways.build_service.clone(), poll_interval);
        Self {
            inner: Arc::new(Inner {
                gateways,
                settings,
                cell: Arc::new(RunCell::new(events_tx)),
                watcher,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PipelineEvent>> {
        self.inner
            .events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Receiver of the latest run snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.inner.cell.subscribe()
    }

    pub fn snapshot(&self) -> PipelineRun {
        self.inner.cell.snapshot()
    }

    pub fn watcher(&self) -> &BuildWatcher {
        &self.inner.watcher
    }

    /// Starts a run in the background. `None` means no open project: no-op.
    pub fn start(
        &self,
        project: Option<Project>,
        auth: AuthContext,
    ) -> Option<JoinHandle<Result<Build, PipelineError>>> {
        let project = project?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run(&project, &auth).await }))
    }

    /// Runs the whole pipeline for `project` and returns the accepted build.
    ///
    /// Validation issues abort before any stage starts. A failure in any
    /// stage is reported once through a `Failed` event and returned.
    /// Starting a run stops the watcher of the previous one.
    pub async fn run(&self, project: &Project, auth: &AuthContext) -> Result<Build, PipelineError> {
        let issues = self.inner.gateways.validator.validate(project);
        if !issues.is_empty() {
            warn!(project = %project.name(), issues = issues.len(), "project failed validation");
            self.inner
                .cell
                .emit(PipelineEvent::ValidationFailed(issues.clone()));
            return Err(PipelineError::Validation(issues));
        }

        self.inner.watcher.stop();
        let run_id = self.inner.cell.begin();
        info!(run_id, project = %project.name(), "pipeline started");

        match self.run_stages(run_id, project, auth).await {
            Ok(build) => {
                info!(run_id, build_id = %build.id, "build accepted, handing off to watcher");
                Ok(build)
            }
            Err(e) => {
                self.inner.cell.fail(run_id, &e);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: u64,
        project: &Project,
        auth: &AuthContext,
    ) -> Result<Build, PipelineError> {
        let gateways = &self.inner.gateways;
        let settings = &self.inner.settings;

        let export_dir = settings.export_dir();
        let options = ExportOptions {
            export_for_cordova: true,
        };
        let exported = gateways.exporter.export(project, &export_dir, options).await?;

        self.advance(run_id, PipelineStage::Compressing)?;
        let archive = gateways
            .archiver
            .archive(&exported, &settings.archive_path())
            .await?;

        self.advance(run_id, PipelineStage::Uploading)?;
        let cell = self.inner.cell.clone();
        let on_progress: ProgressCallback = Arc::new(move |p: UploadProgress| {
            cell.progress(run_id, p);
        });
        let storage_key = gateways.uploader.upload(&archive, on_progress).await?;

        self.advance(run_id, PipelineStage::AwaitingBuild)?;
        let session = auth.session().ok_or(PipelineError::Authentication)?;
        let build = gateways.build_service.submit(session, &storage_key).await?;

        if !self.inner.cell.submitted(run_id, build.clone()) {
            return Err(PipelineError::Superseded);
        }

        let cell = self.inner.cell.clone();
        let on_build_updated: BuildUpdateCallback = Arc::new(move |b: &Build| {
            cell.build_updated(run_id, b);
        });
        self.inner.watcher.start(WatchRequest {
            session: session.clone(),
            builds: vec![build.clone()],
            on_build_updated,
        });

        Ok(build)
    }

    fn advance(&self, run_id: u64, stage: PipelineStage) -> Result<(), PipelineError> {
        if self.inner.cell.advance(run_id, stage) {
            Ok(())
        } else {
            Err(PipelineError::Superseded)
        }
    }

    /// Download location of an artifact of the current run's build.
    pub fn download_url(&self, artifact: ArtifactKey) -> Option<String> {
        let run = self.inner.cell.snapshot();
        let build = run.build.as_ref()?;
        self.inner.gateways.build_service.download_url(build, artifact)
    }

    /// Stops the build watcher. Call on teardown.
    pub fn shutdown(&self) {
        self.inner.watcher.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        ArchiverGateway, BuildServiceGateway, ExporterGateway, GatewayFuture, UploadGateway,
        Validator,
    };
    use apkforge_project::{ProjectManifest, ValidationIssue};
    use apkforge_protocol::{BuildStatus, Session};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_secs(5);

    struct MockValidator(Vec<ValidationIssue>);

    impl Validator for MockValidator {
        fn validate(&self, _: &Project) -> Vec<ValidationIssue> {
            self.0.clone()
        }
    }

    /// Records the stage it was called in, so tests can check that the
    /// stage advanced before the work began.
    struct MockExporter {
        cell: Mutex<Option<watch::Receiver<PipelineRun>>>,
        seen_stage: Mutex<Option<PipelineStage>>,
        fail: bool,
    }

    impl MockExporter {
        fn new(fail: bool) -> Self {
            Self {
                cell: Mutex::new(None),
                seen_stage: Mutex::new(None),
                fail,
            }
        }

        fn record(&self) {
            if let Some(rx) = self.cell.lock().unwrap().as_ref() {
                *self.seen_stage.lock().unwrap() = Some(rx.borrow().stage);
            }
        }
    }

    impl ExporterGateway for MockExporter {
        fn export<'a>(
            &'a self,
            _: &'a Project,
            output_dir: &'a Path,
            options: ExportOptions,
        ) -> GatewayFuture<'a, PathBuf> {
            self.record();
            assert!(options.export_for_cordova);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PipelineError::Export("native export crashed".into()))
                } else {
                    Ok(output_dir.to_path_buf())
                }
            })
        }
    }

    struct MockArchiver {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ArchiverGateway for MockArchiver {
        fn archive<'a>(&'a self, _: &'a Path, dest_file: &'a Path) -> GatewayFuture<'a, PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PipelineError::Archive("disk full".into()))
                } else {
                    Ok(dest_file.to_path_buf())
                }
            })
        }
    }

    /// Reports the given progress ticks, then returns `key` or fails
    /// when there is none.
    struct MockUploader {
        ticks: Vec<(u64, u64)>,
        key: Option<String>,
    }

    impl UploadGateway for MockUploader {
        fn upload<'a>(&'a self, _: &'a Path, on_progress: ProgressCallback) -> GatewayFuture<'a, String> {
            Box::pin(async move {
                for &(done, total) in &self.ticks {
                    on_progress(UploadProgress::new(done, total));
                    tokio::task::yield_now().await;
                }
                self.key
                    .clone()
                    .ok_or_else(|| PipelineError::Upload("connection reset".into()))
            })
        }
    }

    /// Upload gateway with no channel behind it.
    struct NoUpload;

    impl UploadGateway for NoUpload {
        fn upload<'a>(&'a self, _: &'a Path, _: ProgressCallback) -> GatewayFuture<'a, String> {
            Box::pin(async { Err(PipelineError::UploadUnavailable) })
        }
    }

    #[derive(Default)]
    struct MockService {
        submitted: Mutex<Vec<(String, String)>>,
        fetched: Mutex<Vec<String>>,
        status: Mutex<Option<Build>>,
        reject: bool,
    }

    impl BuildServiceGateway for MockService {
        fn submit<'a>(&'a self, session: &'a Session, storage_key: &'a str) -> GatewayFuture<'a, Build> {
            self.submitted
                .lock()
                .unwrap()
                .push((session.user_id.clone(), storage_key.to_string()));
            let reject = self.reject;
            Box::pin(async move {
                if reject {
                    Err(PipelineError::Submission("quota exceeded".into()))
                } else {
                    Ok(Build::pending("b1"))
                }
            })
        }

        fn fetch_status<'a>(&'a self, _: &'a Session, build_id: &'a str) -> GatewayFuture<'a, Build> {
            self.fetched.lock().unwrap().push(build_id.to_string());
            let build = self
                .status
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Build::pending(build_id));
            Box::pin(async move { Ok(build) })
        }

        fn download_url(&self, build: &Build, artifact: ArtifactKey) -> Option<String> {
            build
                .artifact(artifact)
                .map(|key| format!("https://dl.example.com/{key}"))
        }
    }

    struct Harness {
        orch: PipelineOrchestrator,
        exporter: Arc<MockExporter>,
        archiver: Arc<MockArchiver>,
        service: Arc<MockService>,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
    }

    struct Setup {
        issues: Vec<ValidationIssue>,
        export_fails: bool,
        archive_fails: bool,
        uploader: Arc<dyn UploadGateway>,
        service: MockService,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                issues: Vec::new(),
                export_fails: false,
                archive_fails: false,
                uploader: Arc::new(MockUploader {
                    ticks: vec![(0, 100), (100, 100)],
                    key: Some("prefix-1".into()),
                }),
                service: MockService::default(),
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let exporter = Arc::new(MockExporter::new(setup.export_fails));
        let archiver = Arc::new(MockArchiver {
            calls: AtomicUsize::new(0),
            fail: setup.archive_fails,
        });
        let service = Arc::new(setup.service);
        let gateways = Gateways {
            validator: Arc::new(MockValidator(setup.issues)),
            exporter: exporter.clone(),
            archiver: archiver.clone(),
            uploader: setup.uploader,
            build_service: service.clone(),
        };
        let orch = PipelineOrchestrator::new(gateways, PipelineSettings::new("/tmp/work"), INTERVAL);
        *exporter.cell.lock().unwrap() = Some(orch.subscribe());
        let events = orch.take_events().unwrap();
        Harness {
            orch,
            exporter,
            archiver,
            service,
            events,
        }
    }

    fn project() -> Project {
        Project::new("/tmp/game", ProjectManifest::default())
    }

    fn signed_in() -> AuthContext {
        AuthContext::signed_in(Session::new("u1", "t1"))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    fn stages(events: &[PipelineEvent]) -> Vec<PipelineStage> {
        let mut out: Vec<PipelineStage> = Vec::new();
        for e in events {
            if let PipelineEvent::StateChanged(run) = e {
                if out.last() != Some(&run.stage) {
                    out.push(run.stage);
                }
            }
        }
        out
    }

    fn failures(events: &[PipelineEvent]) -> Vec<crate::types::PipelineFailure> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Failed(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_hands_off_to_watcher() {
        let mut h = harness(Setup::default());

        let build = h.orch.run(&project(), &signed_in()).await.unwrap();
        assert_eq!(build.id, "b1");

        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::Building);
        assert_eq!(run.build.as_ref().unwrap().id, "b1");
        assert!(!run.failed);

        assert_eq!(
            *h.service.submitted.lock().unwrap(),
            vec![("u1".to_string(), "prefix-1".to_string())]
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(h.orch.watcher().is_running());
        assert_eq!(*h.service.fetched.lock().unwrap(), vec!["b1"]);

        let events = drain(&mut h.events);
        assert_eq!(
            stages(&events),
            vec![
                PipelineStage::Exporting,
                PipelineStage::Compressing,
                PipelineStage::Uploading,
                PipelineStage::AwaitingBuild,
                PipelineStage::Building,
            ]
        );
        assert!(failures(&events).is_empty());
        h.orch.shutdown();
        assert!(!h.orch.watcher().is_running());
    }

    #[tokio::test]
    async fn stage_advances_before_work_begins() {
        let h = harness(Setup::default());
        h.orch.run(&project(), &signed_in()).await.unwrap();
        assert_eq!(
            *h.exporter.seen_stage.lock().unwrap(),
            Some(PipelineStage::Exporting)
        );
        h.orch.shutdown();
    }

    #[tokio::test]
    async fn validation_issues_abort_without_stage_change() {
        let issue = ValidationIssue {
            field: "version".into(),
            message: "'1.0' is not a valid version".into(),
        };
        let mut h = harness(Setup {
            issues: vec![issue.clone()],
            ..Setup::default()
        });

        let err = h.orch.run(&project(), &signed_in()).await.unwrap_err();
        match err {
            PipelineError::Validation(issues) => assert_eq!(issues, vec![issue.clone()]),
            other => panic!("unexpected error: {other}"),
        }

        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::Idle);
        assert!(!run.failed);
        assert_eq!(
            drain(&mut h.events),
            vec![PipelineEvent::ValidationFailed(vec![issue])]
        );
        assert!(h.exporter.seen_stage.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn export_failure_stops_the_run() {
        let mut h = harness(Setup {
            export_fails: true,
            ..Setup::default()
        });

        let err = h.orch.run(&project(), &signed_in()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Export(_)));
        assert_eq!(h.archiver.calls.load(Ordering::SeqCst), 0);

        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::Exporting);
        assert!(run.failed);

        let failures = failures(&drain(&mut h.events));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, PipelineStage::Exporting);
        assert_eq!(failures[0].message, "Error while exporting the game.");
        assert!(failures[0].cause.contains("native export crashed"));
    }

    #[tokio::test]
    async fn archive_failure_is_tagged_with_compressing() {
        let mut h = harness(Setup {
            archive_fails: true,
            ..Setup::default()
        });

        h.orch.run(&project(), &signed_in()).await.unwrap_err();
        let failures = failures(&drain(&mut h.events));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, PipelineStage::Compressing);
        assert!(h.service.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_upload_channel_fails_at_uploading() {
        let mut h = harness(Setup {
            uploader: Arc::new(NoUpload),
            ..Setup::default()
        });

        let err = h.orch.run(&project(), &signed_in()).await.unwrap_err();
        assert!(matches!(err, PipelineError::UploadUnavailable));
        assert_eq!(h.archiver.calls.load(Ordering::SeqCst), 1);

        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::Uploading);
        assert!(run.failed);

        let failures = failures(&drain(&mut h.events));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, PipelineStage::Uploading);
        assert!(failures[0].cause.contains("capability unavailable"));
        assert!(!h.orch.watcher().is_running());
    }

    #[tokio::test]
    async fn upload_progress_last_value_wins() {
        let mut h = harness(Setup {
            uploader: Arc::new(MockUploader {
                ticks: vec![(10, 100), (55, 100)],
                key: None,
            }),
            ..Setup::default()
        });

        h.orch.run(&project(), &signed_in()).await.unwrap_err();

        let run = h.orch.snapshot();
        assert_eq!((run.upload_progress, run.upload_total), (55, 100));
        assert_eq!(run.upload_percentage(), 55.0);

        let progress: Vec<(u64, u64)> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StateChanged(r) if r.stage == PipelineStage::Uploading && !r.failed => {
                    Some((r.upload_progress, r.upload_total))
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(0, 0), (10, 100), (55, 100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_upload_keeps_last_progress() {
        let mut h = harness(Setup {
            uploader: Arc::new(MockUploader {
                ticks: vec![(10, 100), (55, 100)],
                key: Some("prefix-1".into()),
            }),
            ..Setup::default()
        });

        h.orch.run(&project(), &signed_in()).await.unwrap();

        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::Building);
        assert_eq!((run.upload_progress, run.upload_total), (55, 100));

        let awaiting: Vec<(u64, u64)> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StateChanged(r) if r.stage == PipelineStage::AwaitingBuild => {
                    Some((r.upload_progress, r.upload_total))
                }
                _ => None,
            })
            .collect();
        assert_eq!(awaiting, vec![(55, 100)]);
        h.orch.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn new_run_stops_previous_watcher() {
        let mut h = harness(Setup::default());
        h.orch.run(&project(), &signed_in()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(h.orch.watcher().is_running());
        let fetches_before = h.service.fetched.lock().unwrap().len();
        assert_eq!(fetches_before, 1);

        let err = h
            .orch
            .run(&project(), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Authentication));
        assert!(!h.orch.watcher().is_running());

        let mut done = Build::pending("b1");
        done.status = BuildStatus::Complete;
        *h.service.status.lock().unwrap() = Some(done);
        drain(&mut h.events);
        tokio::time::sleep(INTERVAL * 3).await;

        assert_eq!(h.service.fetched.lock().unwrap().len(), fetches_before);
        let updates = drain(&mut h.events)
            .into_iter()
            .filter(|e| matches!(e, PipelineEvent::BuildUpdated(_)))
            .count();
        assert_eq!(updates, 0);
    }

    #[tokio::test]
    async fn anonymous_submission_is_an_authentication_error() {
        let mut h = harness(Setup::default());

        let err = h
            .orch
            .run(&project(), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Authentication));
        assert!(h.service.submitted.lock().unwrap().is_empty());

        let failures = failures(&drain(&mut h.events));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, PipelineStage::AwaitingBuild);
        assert_eq!(failures[0].message, "Error while launching the build of the game.");
        assert_eq!(failures[0].cause, "user is not authenticated");
    }

    #[tokio::test]
    async fn rejected_submission_fails_at_awaiting_build() {
        let h = harness(Setup {
            service: MockService {
                reject: true,
                ..MockService::default()
            },
            ..Setup::default()
        });

        let err = h.orch.run(&project(), &signed_in()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Submission(_)));
        let run = h.orch.snapshot();
        assert_eq!(run.stage, PipelineStage::AwaitingBuild);
        assert!(run.failed);
        assert!(run.build.is_none());
    }

    #[tokio::test]
    async fn start_without_project_is_a_no_op() {
        let mut h = harness(Setup::default());
        assert!(h.orch.start(None, signed_in()).is_none());
        assert_eq!(h.orch.snapshot(), PipelineRun::default());
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn start_runs_in_background() {
        let h = harness(Setup::default());
        let handle = h.orch.start(Some(project()), signed_in()).unwrap();
        let build = handle.await.unwrap().unwrap();
        assert_eq!(build.id, "b1");
        assert_eq!(h.orch.snapshot().stage, PipelineStage::Building);
        h.orch.shutdown();
    }

    #[tokio::test]
    async fn new_run_resets_previous_failure() {
        let h = harness(Setup {
            archive_fails: true,
            ..Setup::default()
        });
        h.orch.run(&project(), &signed_in()).await.unwrap_err();
        let first = h.orch.snapshot();
        assert!(first.failed);

        h.orch.run(&project(), &signed_in()).await.unwrap_err();
        let second = h.orch.snapshot();
        assert_eq!(second.run_id, first.run_id + 1);
        assert!(second.failed);
        assert_eq!(second.stage, PipelineStage::Compressing);
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_updates_flow_into_run() {
        let mut h = harness(Setup::default());
        h.orch.run(&project(), &signed_in()).await.unwrap();
        assert_eq!(h.orch.download_url(ArtifactKey::Apk), None);

        let mut done = Build::pending("b1");
        done.status = BuildStatus::Complete;
        done.apk_key = Some("b1/game.apk".into());
        *h.service.status.lock().unwrap() = Some(done.clone());

        drain(&mut h.events);
        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;

        let run = h.orch.snapshot();
        assert_eq!(run.build.as_ref(), Some(&done));
        assert_eq!(run.stage, PipelineStage::Building);
        assert_eq!(
            h.orch.download_url(ArtifactKey::Apk).as_deref(),
            Some("https://dl.example.com/b1/game.apk")
        );
        assert_eq!(h.orch.download_url(ArtifactKey::Logs), None);

        let updates: Vec<Build> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::BuildUpdated(b) => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![done]);
        assert!(!h.orch.watcher().is_running());
    }

    #[test]
    fn take_events_once() {
        let h = harness(Setup::default());
        assert!(h.orch.take_events().is_none());
    }
}
