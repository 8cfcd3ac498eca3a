use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use apkforge_pipeline::{BuildUpdateCallback, BuildWatcher, WatchRequest};
use apkforge_protocol::{ArtifactKey, Build};
use colored::*;
use tokio::sync::mpsc;

use super::require_session;
use crate::adapters::{ServiceAdapter, build_client};
use crate::config::Config;
use crate::render;

pub async fn run(config: &Config, build_ids: Vec<String>) -> Result<()> {
    let session = require_session(config)?;
    let client = build_client(config)?;
    let watcher = BuildWatcher::new(
        Arc::new(ServiceAdapter::new(client.clone())),
        config.poll_interval(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<Build>();
    let on_build_updated: BuildUpdateCallback = Arc::new(move |b: &Build| {
        let _ = tx.send(b.clone());
    });

    let mut remaining: BTreeSet<String> = build_ids.iter().cloned().collect();
    watcher.start(WatchRequest {
        session,
        builds: build_ids.into_iter().map(Build::pending).collect(),
        on_build_updated,
    });

    while !remaining.is_empty() {
        tokio::select! {
            update = rx.recv() => {
                let Some(build) = update else { break };
                render::print_build(&build);
                if build.is_terminal() {
                    remaining.remove(&build.id);
                    for key in ArtifactKey::ALL {
                        render::print_artifact(key.as_str(), client.download_url(&build, key).as_deref());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                watcher.stop();
                println!();
                println!("{}", "Stopped watching.".yellow());
                return Ok(());
            }
        }
    }

    watcher.stop();
    Ok(())
}
