//! Polling of in-flight remote builds.
//!
//! A [`BuildWatcher`] owns at most one polling task. Starting it again
//! cancels the previous task before the new watch set is installed, and the
//! task stops by itself once every watched build is terminal.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apkforge_protocol::{Build, Session};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::BuildServiceGateway;

/// Invoked once for every observed change of a watched build.
pub type BuildUpdateCallback = Arc<dyn Fn(&Build) + Send + Sync>;

/// Last-known record of every watched build, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    builds: BTreeMap<String, Build>,
}

impl WatchSet {
    pub fn new(builds: impl IntoIterator<Item = Build>) -> Self {
        Self {
            builds: builds.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    /// Ids of builds that still need polling.
    pub fn pending(&self) -> Vec<String> {
        self.builds
            .values()
            .filter(|b| !b.is_terminal())
            .map(|b| b.id.clone())
            .collect()
    }

    /// Stores `fetched` if it differs from the known record.
    ///
    /// Returns whether anything changed. Builds outside the set are ignored.
    pub fn apply(&mut self, fetched: &Build) -> bool {
        match self.builds.get_mut(&fetched.id) {
            Some(known) if known != fetched => {
                *known = fetched.clone();
                true
            }
            _ => false,
        }
    }

    pub fn all_terminal(&self) -> bool {
        self.builds.values().all(Build::is_terminal)
    }

    pub fn get(&self, id: &str) -> Option<&Build> {
        self.builds.get(id)
    }

    pub fn builds(&self) -> impl Iterator<Item = &Build> {
        self.builds.values()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

/// What to watch and whom to tell.
#[derive(Clone)]
pub struct WatchRequest {
    pub session: Session,
    pub builds: Vec<Build>,
    pub on_build_updated: BuildUpdateCallback,
}

struct WatchTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    set: Arc<Mutex<WatchSet>>,
}

/// Polls the build service for a set of builds on a fixed interval.
pub struct BuildWatcher {
    service: Arc<dyn BuildServiceGateway>,
    interval: Duration,
    task: Mutex<Option<WatchTask>>,
}

impl BuildWatcher {
    pub fn new(service: Arc<dyn BuildServiceGateway>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replaces the watch set and starts polling; the first tick is immediate.
    ///
    /// Any previous polling task is stopped first.
    pub fn start(&self, request: WatchRequest) {
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = slot.take() {
            prev.cancel.cancel();
            prev.handle.abort();
            debug!("previous watch cancelled");
        }

        let set = Arc::new(Mutex::new(WatchSet::new(request.builds)));
        let cancel = CancellationToken::new();
        info!(
            builds = set.lock().map(|s| s.len()).unwrap_or(0),
            interval_secs = self.interval.as_secs_f64(),
            "watching builds"
        );

        let handle = tokio::spawn(poll_loop(
            self.service.clone(),
            self.interval,
            request.session,
            set.clone(),
            request.on_build_updated,
            cancel.clone(),
        ));

        *slot = Some(WatchTask {
            cancel,
            handle,
            set,
        });
    }

    /// Stops polling. Harmless when nothing is running.
    pub fn stop(&self) {
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.take() {
            task.cancel.cancel();
            task.handle.abort();
            debug!("watch stopped");
        }
    }

    /// Whether a polling task is alive.
    pub fn is_running(&self) -> bool {
        let slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// Last-known records of the current watch set.
    pub fn builds(&self) -> Vec<Build> {
        let slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(task) => {
                let set = task.set.lock().unwrap_or_else(|e| e.into_inner());
                set.builds().cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

impl Drop for BuildWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    service: Arc<dyn BuildServiceGateway>,
    interval: Duration,
    session: Session,
    set: Arc<Mutex<WatchSet>>,
    on_build_updated: BuildUpdateCallback,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let pending = set.lock().map(|s| s.pending()).unwrap_or_default();
        for id in pending {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = service.fetch_status(&session, &id) => r,
            };
            match result {
                Ok(build) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let changed = set
                        .lock()
                        .map(|mut s| s.apply(&build))
                        .unwrap_or(false);
                    if changed {
                        debug!(build_id = %build.id, status = %build.status, "build changed");
                        on_build_updated(&build);
                    }
                }
                Err(e) => {
                    warn!(build_id = %id, error = %e, "build status fetch failed, retrying next tick");
                }
            }
        }

        if set.lock().map(|s| s.all_terminal()).unwrap_or(false) {
            info!("all watched builds are terminal, polling stopped");
            return;
        }
    }
}
