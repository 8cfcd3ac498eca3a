//! Build service API client.
//!
//! Async HTTP client using `reqwest`. The session token travels in the
//! `Authorization` header and the user id as a query parameter.

use std::collections::HashMap;
use std::time::Duration;

use apkforge_protocol::{ArtifactKey, Build, BuildLimit, BuildType, Session};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ServiceError;

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build service API client.
pub struct BuildServiceClient {
    http: reqwest::Client,
    base_url: String,
    downloads_url: String,
}

impl BuildServiceClient {
    /// Creates a client for the API at `base_url`.
    ///
    /// Artifact download links are resolved against `downloads_url`.
    pub fn new(base_url: &str, downloads_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        for url in [base_url, downloads_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ServiceError::InvalidUrl(url.to_string()));
            }
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            downloads_url: downloads_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends `req` with the session token and decodes a JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        session: &Session,
    ) -> Result<T, ServiceError> {
        let resp = req.header(AUTHORIZATION, &session.token).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), body));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Requests a new Cordova build for the archive stored under `storage_key`.
    pub async fn submit(&self, session: &Session, storage_key: &str) -> Result<Build, ServiceError> {
        let url = format!("{}/build", self.base_url);
        let req = self.http.post(&url).query(&[
            ("userId", session.user_id.as_str()),
            ("key", storage_key),
            ("type", BuildType::CordovaBuild.as_str()),
        ]);
        let build: Build = self.send_json(req, session).await?;
        info!(build_id = %build.id, status = %build.status, "build submitted");
        Ok(build)
    }

    /// Fetches the current record of a build.
    pub async fn get_build(&self, session: &Session, build_id: &str) -> Result<Build, ServiceError> {
        let encoded = utf8_percent_encode(build_id, PATH_SEGMENT).to_string();
        let url = format!("{}/build/{encoded}", self.base_url);
        let req = self
            .http
            .get(&url)
            .query(&[("userId", session.user_id.as_str())]);
        let build: Build = self.send_json(req, session).await?;
        debug!(build_id = %build.id, status = %build.status, "build fetched");
        Ok(build)
    }

    /// Returns the account's usage limits keyed by limit name.
    pub async fn get_limits(
        &self,
        session: &Session,
    ) -> Result<HashMap<String, BuildLimit>, ServiceError> {
        let url = format!("{}/usage/limits", self.base_url);
        let req = self
            .http
            .get(&url)
            .query(&[("userId", session.user_id.as_str())]);
        self.send_json(req, session).await
    }

    /// Public URL of one of a build's artifacts, if the build has it.
    pub fn download_url(&self, build: &Build, artifact: ArtifactKey) -> Option<String> {
        let key = build.artifact(artifact)?;
        let path: Vec<String> = key
            .split('/')
            .map(|seg| utf8_percent_encode(seg, PATH_SEGMENT).to_string())
            .collect();
        Some(format!("{}/{}", self.downloads_url, path.join("/")))
    }
}
