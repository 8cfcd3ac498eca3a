//! Source tree scanning.
//!
//! Recursively walks a directory and produces a list of files with relative
//! paths normalized to forward slashes.

use std::path::Path;

use crate::error::ProjectError;

/// A file found under a scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scanned root, always `/`-separated.
    pub relative_path: String,
    pub size: u64,
}

/// Scans a directory recursively and returns its files and total size.
///
/// Entries under `skip` (if given) are ignored, so an output directory
/// nested inside the source tree is never copied into itself.
pub fn scan_files(root: &Path, skip: Option<&Path>) -> Result<(Vec<ScannedFile>, u64), ProjectError> {
    let mut files = Vec::new();
    let mut total_size: u64 = 0;

    walk_dir(root, root, skip, &mut files, &mut total_size)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok((files, total_size))
}

fn walk_dir(
    root: &Path,
    current: &Path,
    skip: Option<&Path>,
    files: &mut Vec<ScannedFile>,
    total_size: &mut u64,
) -> Result<(), ProjectError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if skip.is_some_and(|s| path.starts_with(s)) {
            continue;
        }
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, skip, files, total_size)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            let size = metadata.len();

            files.push(ScannedFile {
                relative_path: rel_str,
                size,
            });
            *total_size += size;
        }
    }

    Ok(())
}
