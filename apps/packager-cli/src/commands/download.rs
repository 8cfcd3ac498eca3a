use anyhow::{Context, Result};
use apkforge_protocol::ArtifactKey;

use super::require_session;
use crate::adapters::build_client;
use crate::config::Config;

pub async fn run(config: &Config, build_id: &str, artifact: ArtifactKey, print: bool) -> Result<()> {
    let session = require_session(config)?;
    let client = build_client(config)?;

    let build = client
        .get_build(&session, build_id)
        .await
        .with_context(|| format!("failed to fetch build {build_id}"))?;
    let url = client.download_url(&build, artifact).with_context(|| {
        format!(
            "build {build_id} has no {artifact} artifact (status: {})",
            build.status
        )
    })?;

    if print {
        println!("{url}");
        return Ok(());
    }

    tracing::info!(build_id, %artifact, "opening artifact");
    open::that(&url).with_context(|| format!("failed to open {url}"))?;
    Ok(())
}
