use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use apkforge_pipeline::{
    AuthContext, PipelineEvent, PipelineOrchestrator, PipelineSettings, PipelineStage, can_launch,
};
use apkforge_project::Project;
use apkforge_protocol::{ArtifactKey, Build, BuildLimit, CORDOVA_BUILD_LIMIT};
use colored::*;
use tracing::warn;

use crate::adapters::{build_client, gateways};
use crate::config::Config;
use crate::render;

pub async fn run(config: &Config, project_dir: &Path, no_watch: bool) -> Result<()> {
    let project = Project::load(project_dir)
        .with_context(|| format!("failed to open project at {}", project_dir.display()))?;

    let client = build_client(config)?;
    let limit = match &config.session {
        Some(session) => fetch_limit(&client, session).await,
        None => None,
    };

    let orch = PipelineOrchestrator::new(
        gateways(config, client)?,
        PipelineSettings::new(config.work_dir()),
        config.poll_interval(),
    );
    if !can_launch(&orch.snapshot(), limit.as_ref()) {
        let (current, max) = limit.map(|l| (l.current, l.max)).unwrap_or_default();
        bail!("build limit reached ({current}/{max} builds used)");
    }

    let mut events = orch
        .take_events()
        .ok_or_else(|| anyhow!("pipeline events already taken"))?;
    let mut handle = orch
        .start(Some(project), AuthContext::new(config.session.clone()))
        .ok_or_else(|| anyhow!("no project to package"))?;

    let mut last_line = String::new();
    let mut submitted: Option<Build> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(done) = on_event(event, &mut last_line) {
                    submitted = Some(done);
                    break;
                }
            }
            result = &mut handle, if submitted.is_none() => {
                let build = match result.context("pipeline task panicked")? {
                    Ok(build) => build,
                    Err(e) => {
                        while let Ok(event) = events.try_recv() {
                            on_event(event, &mut last_line);
                        }
                        return Err(e).context("packaging failed");
                    }
                };
                while let Ok(event) = events.try_recv() {
                    on_event(event, &mut last_line);
                }
                if no_watch || build.is_terminal() {
                    orch.shutdown();
                    submitted = Some(build);
                    break;
                }
                submitted = Some(build);
                println!("{}", "Waiting for the remote build, Ctrl-C to stop watching.".dimmed());
            }
            _ = tokio::signal::ctrl_c() => {
                orch.shutdown();
                println!();
                println!("{}", "Stopped watching. The build keeps running remotely.".yellow());
                return Ok(());
            }
        }
    }

    orch.shutdown();
    let run = orch.snapshot();
    let build = run.build.or(submitted).context("no build was submitted")?;
    print_result(&orch, &build, no_watch);
    Ok(())
}

/// Renders one event. Returns the build once it reaches a terminal status.
fn on_event(event: PipelineEvent, last_line: &mut String) -> Option<Build> {
    match event {
        PipelineEvent::StateChanged(run) => {
            if run.failed || run.stage == PipelineStage::Idle {
                return None;
            }
            let line = render::run_line(&run);
            if line != *last_line {
                render::print_run(&run);
                *last_line = line;
            }
            None
        }
        PipelineEvent::ValidationFailed(issues) => {
            render::print_issues(&issues);
            None
        }
        PipelineEvent::Failed(failure) => {
            render::print_failure(&failure);
            None
        }
        PipelineEvent::BuildUpdated(build) => {
            render::print_build(&build);
            build.is_terminal().then_some(build)
        }
    }
}

fn print_result(orch: &PipelineOrchestrator, build: &Build, no_watch: bool) {
    if no_watch && !build.is_terminal() {
        println!(
            "Build {} submitted. Follow it with `apkforge watch {}`.",
            build.id.bold(),
            build.id
        );
        return;
    }

    render::print_build(build);
    for key in ArtifactKey::ALL {
        let url = orch.download_url(key);
        render::print_artifact(key.as_str(), url.as_deref());
    }
}

async fn fetch_limit(
    client: &apkforge_build_service::BuildServiceClient,
    session: &apkforge_protocol::Session,
) -> Option<BuildLimit> {
    match client.get_limits(session).await {
        Ok(mut limits) => limits.remove(CORDOVA_BUILD_LIMIT),
        Err(e) => {
            warn!(error = %e, "could not read build limits, continuing");
            None
        }
    }
}
