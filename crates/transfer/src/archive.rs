use std::fs::File;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::TransferError;

/// File name the build service expects for an uploaded game.
pub const ARCHIVE_FILE_NAME: &str = "game-archive.zip";

/// Compresses every file under `src_dir` into the zip at `dest_file`.
///
/// Entry names are relative to `src_dir` and `/`-separated. If `dest_file`
/// lies inside `src_dir` it is not added to itself. Returns `dest_file`'s
/// entry count.
pub fn archive_dir(src_dir: &Path, dest_file: &Path) -> Result<usize, TransferError> {
    if let Some(parent) = dest_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(dest_file)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = 0;
    for entry in WalkDir::new(src_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == dest_file || !entry.file_type().is_file() {
            continue;
        }
        let rel = path.strip_prefix(src_dir).unwrap_or(path);
        let name = rel.to_string_lossy().replace('\\', "/");

        zip.start_file(name, options)?;
        let mut f = File::open(path)?;
        std::io::copy(&mut f, &mut zip)?;
        entries += 1;
    }

    zip.finish()?;
    debug!(
        src = %src_dir.display(),
        dest = %dest_file.display(),
        entries,
        "archive written"
    );
    Ok(entries)
}
