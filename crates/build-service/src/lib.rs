//! Remote build service access over HTTP.
//!
//! [`BuildServiceClient`] submits builds, polls their status and reads the
//! account's usage limits. [`HttpUploader`] streams an archive to storage
//! and returns the prefix the service expects in a submission.

mod client;
mod error;
mod upload;

pub use client::BuildServiceClient;
pub use error::ServiceError;
pub use upload::HttpUploader;
