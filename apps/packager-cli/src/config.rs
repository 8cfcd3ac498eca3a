//! Packager configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/apkforge/config.toml`
//! - Windows: `%APPDATA%/apkforge/config.toml`
//!
//! `--config <path>` or `APKFORGE_CONFIG` overrides the location.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use apkforge_protocol::Session;
use serde::{Deserialize, Serialize};

const DEFAULT_BUILD_API_URL: &str = "https://build.apkforge.dev/api";
const DEFAULT_DOWNLOADS_URL: &str = "https://downloads.apkforge.dev";

/// Packager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote build API.
    pub build_api_url: String,

    /// Storage endpoint archives are uploaded to. Without it the pipeline
    /// has no upload channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,

    /// Base URL build artifacts are downloaded from.
    pub downloads_url: String,

    pub poll_interval_secs: u64,

    /// Scratch directory for exports and archives. Defaults to the system
    /// temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    pub http_timeout_secs: u64,

    /// Signed-in user, written by `apkforge login`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build_api_url: DEFAULT_BUILD_API_URL.into(),
            upload_url: None,
            downloads_url: DEFAULT_DOWNLOADS_URL.into(),
            poll_interval_secs: 5,
            work_dir: None,
            http_timeout_secs: 60,
            session: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or creates a default if not found.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may carry a session token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        check_url("build_api_url", &self.build_api_url)?;
        check_url("downloads_url", &self.downloads_url)?;
        if let Some(url) = &self.upload_url {
            check_url("upload_url", url)?;
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("apkforge"))
    }
}

fn check_url(field: &str, url: &str) -> anyhow::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        bail!("{field} must be an http(s) URL, got '{url}'")
    }
}

/// Returns the configuration file path, honoring an explicit override.
pub fn config_path(override_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path;
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("apkforge")
            .join("config.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("apkforge").join("config.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/apkforge/config.toml")
    }
}
