use std::path::{Path, PathBuf};
use std::time::Duration;

use apkforge_transfer::{
    ProgressCallback, TransferError, calculate_file_checksum, open_progress_stream,
    validate_storage_key,
};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, info};

use crate::error::ServiceError;

/// Header carrying the hex SHA-256 of the uploaded file.
const CHECKSUM_HEADER: &str = "x-content-sha256";

/// Streams archives to remote storage with `PUT {upload_url}/{key}`.
pub struct HttpUploader {
    http: reqwest::Client,
    upload_url: String,
}

impl HttpUploader {
    pub fn new(upload_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        if !upload_url.starts_with("http://") && !upload_url.starts_with("https://") {
            return Err(ServiceError::InvalidUrl(upload_url.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            upload_url: upload_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uploads `path` under a fresh storage prefix and returns that prefix.
    ///
    /// `on_progress` sees `(0, total)` before the first byte and then one
    /// report per chunk read from disk.
    pub async fn upload(&self, path: &Path, on_progress: ProgressCallback) -> Result<String, ServiceError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidKey(format!("no file name in {}", path.display())))?;

        let prefix = uuid::Uuid::new_v4().to_string();
        let key = format!("{prefix}/{file_name}");
        validate_storage_key(&key)?;

        let checksum_path: PathBuf = path.to_path_buf();
        let checksum = tokio::task::spawn_blocking(move || calculate_file_checksum(&checksum_path))
            .await
            .map_err(std::io::Error::other)??;

        let stream = open_progress_stream(path, on_progress).await?;
        let total = stream.total();
        debug!(key = %key, bytes = total, "starting upload");

        let url = format!("{}/{key}", self.upload_url);
        let resp = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "application/zip")
            .header(CONTENT_LENGTH, total)
            .header(CHECKSUM_HEADER, checksum)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), body));
        }

        info!(key = %key, bytes = total, "archive uploaded");
        Ok(prefix)
    }
}
