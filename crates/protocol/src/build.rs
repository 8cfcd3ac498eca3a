use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A remote packaging job as reported by the build service.
///
/// The service owns the record; locally it is only ever replaced by a
/// fresher copy, never edited field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(rename = "type", default)]
    pub build_type: BuildType,
    pub status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_key: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub updated_at: i64,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

impl Build {
    /// Creates a freshly submitted build with no artifacts yet.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            build_type: BuildType::CordovaBuild,
            status: BuildStatus::Pending,
            apk_key: None,
            logs_key: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Whether the service will never change this build again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Storage key of the given artifact, if the build exposes it.
    pub fn artifact(&self, key: ArtifactKey) -> Option<&str> {
        let value = match key {
            ArtifactKey::Apk => self.apk_key.as_deref(),
            ArtifactKey::Logs => self.logs_key.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Status of a remote build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Complete,
    Error,
    /// Any status this client does not know about. Treated as in-flight.
    #[serde(other)]
    Unknown,
}

impl BuildStatus {
    /// `Complete` and `Error` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Kind of packaging job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildType {
    #[default]
    #[serde(rename = "cordova-build")]
    CordovaBuild,
    #[serde(other)]
    Other,
}

impl BuildType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CordovaBuild => "cordova-build",
            Self::Other => "other",
        }
    }
}

/// Downloadable output of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// The packaged Android application.
    Apk,
    /// Raw build logs, useful when the build errored.
    Logs,
}

impl ArtifactKey {
    pub const ALL: [ArtifactKey; 2] = [ArtifactKey::Apk, ArtifactKey::Logs];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apk => "apk",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an artifact name is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown artifact '{0}' (expected 'apk' or 'logs')")]
pub struct ParseArtifactKeyError(String);

impl FromStr for ArtifactKey {
    type Err = ParseArtifactKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apk" | "apkkey" => Ok(Self::Apk),
            "logs" | "logskey" => Ok(Self::Logs),
            _ => Err(ParseArtifactKeyError(s.to_string())),
        }
    }
}
