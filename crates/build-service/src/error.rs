/// Errors from the build service and upload transport.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unauthorized: the session was rejected by the build service")]
    Unauthorized,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] apkforge_transfer::TransferError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ServiceError {
    /// Maps a non-success response into the matching variant.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            _ => Self::Api { status, body },
        }
    }
}
