//! Zip extraction for downloaded template archives.

use crate::error::TemplateError;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Extract `bytes` into `dest`, then flatten a single top-level wrapper
/// directory. Returns the number of files written.
///
/// Entries whose paths would escape `dest` are skipped.
pub fn extract_zip(bytes: &[u8], dest: &Path) -> Result<usize, TemplateError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TemplateError::with_source("Downloaded template archive is not a valid zip", e))?;
    fs::create_dir_all(dest).map_err(|e| {
        TemplateError::with_source(format!("Failed to create {}", dest.display()), e)
    })?;

    let mut written = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| TemplateError::with_source("Failed to read template archive entry", e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| io_error(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let mut out = fs::File::create(&out_path).map_err(|e| io_error(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| io_error(&out_path, e))?;
        written += 1;
    }

    flatten_single_wrapper(dest)?;
    debug!(dest = %dest.display(), files = written, "Template archive extracted");
    Ok(written)
}

/// If `dir` holds exactly one entry and it is a directory, move that
/// directory's contents up one level. Returns whether anything moved.
pub fn flatten_single_wrapper(dir: &Path) -> Result<bool, TemplateError> {
    let entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .filter_map(Result::ok)
        .collect();
    let [only] = entries.as_slice() else {
        return Ok(false);
    };
    if !only.file_type().map(|t| t.is_dir()).unwrap_or(false) {
        return Ok(false);
    }

    // rename first so a child with the wrapper's own name cannot collide
    let staging = dir.join(".apigen-unwrap");
    fs::rename(only.path(), &staging).map_err(|e| io_error(&staging, e))?;
    for child in fs::read_dir(&staging).map_err(|e| io_error(&staging, e))? {
        let child = child.map_err(|e| io_error(&staging, e))?;
        let target = dir.join(child.file_name());
        fs::rename(child.path(), &target).map_err(|e| io_error(&target, e))?;
    }
    fs::remove_dir(&staging).map_err(|e| io_error(&staging, e))?;
    debug!(
        wrapper = %only.file_name().to_string_lossy(),
        "Flattened archive wrapper directory"
    );
    Ok(true)
}

fn io_error(path: &Path, e: io::Error) -> TemplateError {
    TemplateError::with_source(format!("I/O error at {}", path.display()), e)
}
