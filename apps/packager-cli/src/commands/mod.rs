//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod auth;
mod download;
mod package;
mod validate;
mod watch;

use std::path::{Path, PathBuf};

use anyhow::Result;
use apkforge_protocol::ArtifactKey;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store the session used for build-service calls
    Login {
        #[arg(long)]
        user_id: String,
        #[arg(long, env = "APKFORGE_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Forget the stored session
    Logout,
    /// Check a project for blocking issues
    Validate {
        /// Project directory (contains project.json)
        project: PathBuf,
    },
    /// Export, upload and build a project
    Package {
        /// Project directory (contains project.json)
        project: PathBuf,

        /// Return once the build is submitted instead of waiting for it
        #[arg(long)]
        no_watch: bool,
    },
    /// Follow existing builds until they finish
    Watch {
        /// Build ids
        #[arg(required = true)]
        builds: Vec<String>,
    },
    /// Open or print a build artifact's download URL
    Download {
        build_id: String,

        /// apk or logs
        artifact: ArtifactKey,

        /// Print the URL instead of opening it
        #[arg(long)]
        print: bool,
    },
}

/// Routes the command to its handler.
pub async fn handle_command(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Login { user_id, token } => auth::login(config_path, user_id, token),
        Commands::Logout => auth::logout(config_path),
        Commands::Validate { project } => validate::run(&project),
        Commands::Package { project, no_watch } => {
            let config = load_config(config_path)?;
            package::run(&config, &project, no_watch).await
        }
        Commands::Watch { builds } => {
            let config = load_config(config_path)?;
            watch::run(&config, builds).await
        }
        Commands::Download {
            build_id,
            artifact,
            print,
        } => {
            let config = load_config(config_path)?;
            download::run(&config, &build_id, artifact, print).await
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    tracing::debug!(path = %path.display(), api = %config.build_api_url, "configuration loaded");
    Ok(config)
}

/// The stored session, or an error telling the user to log in.
fn require_session(config: &Config) -> Result<apkforge_protocol::Session> {
    config
        .session
        .clone()
        .ok_or_else(|| anyhow::anyhow!("not logged in, run `apkforge login` first"))
}
