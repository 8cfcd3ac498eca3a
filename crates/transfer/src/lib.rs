//! Moving a packaged game from disk to remote storage.
//!
//! - [`archive_dir`] compresses an exported directory into one zip file.
//! - [`ProgressStream`] wraps a file stream and reports bytes sent so far.
//! - [`validate_storage_key`] guards the keys an archive is stored under.

mod archive;
mod checksum;
mod progress;
mod validation;

pub use apkforge_protocol::ProgressCallback;
pub use archive::{ARCHIVE_FILE_NAME, archive_dir};
pub use checksum::{calculate_file_checksum, checksum_bytes};
pub use progress::{ProgressStream, open_progress_stream};
pub use validation::validate_storage_key;

/// Read size for streamed uploads: 256 KiB.
///
/// Each chunk read produces one progress report, so this also bounds how
/// often observers are notified.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}
