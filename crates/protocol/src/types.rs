use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of the usage limit that gates remote Android builds.
pub const CORDOVA_BUILD_LIMIT: &str = "cordova-build";

/// A usage limit attached to the user's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLimit {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub max: u32,
    #[serde(default)]
    pub limit_reached: bool,
}

impl BuildLimit {
    /// Remaining builds before the limit is reached.
    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }
}

/// Credentials of a signed-in user, sent with every build-service call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

// Keeps tokens out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Progress of a file transfer, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(transferred_bytes: u64, total_bytes: u64) -> Self {
        Self {
            transferred_bytes,
            total_bytes,
        }
    }

    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.transferred_bytes as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Receives `(transferred, total)` byte counts while an upload runs.
///
/// Shared by the streaming layer that produces the counts and the pipeline
/// that records them.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;
