//! Staged writes.
//!
//! Downloads and extracted payloads are written to a temporary file in the
//! staging directory and only moved to their final name once complete. The
//! final name is never overwritten.
//!
//! Layout: {root}/data/staging/pub/US/.courier_staged_XXXXXX

use anyhow::{anyhow, Context, Result};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Prefix for staging files so orphans can be recognised after a crash.
pub const STAGING_PREFIX: &str = ".courier_staged_";

pub fn staging_file(staging_dir: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(staging_dir)
        .with_context(|| format!("create staging file in {}", staging_dir.display()))
}

/// Moves a finished staging file to `dest`. Fails if `dest` already exists.
pub fn persist_staged(staged: NamedTempFile, dest: &Path) -> Result<PathBuf> {
    match staged.persist_noclobber(dest) {
        Ok(_) => {
            debug!(to = %dest.display(), "staged file moved into place");
            Ok(dest.to_path_buf())
        }
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(anyhow!("{} already exists", dest.display()))
        }
        Err(err) => {
            // Rename fails across filesystems; fall back to copy.
            warn!(
                error = %err.error,
                to = %dest.display(),
                "rename from staging failed, trying copy"
            );
            copy_noclobber(err.file.path(), dest)?;
            Ok(dest.to_path_buf())
        }
    }
}

fn copy_noclobber(src: &Path, dest: &Path) -> Result<()> {
    let mut input =
        fs::File::open(src).with_context(|| format!("open staged {}", src.display()))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .with_context(|| format!("create {}", dest.display()))?;
    if let Err(err) = io::copy(&mut input, &mut output) {
        drop(output);
        let _ = fs::remove_file(dest);
        return Err(err).with_context(|| format!("copy into {}", dest.display()));
    }
    // Keep the source mtime, the way rename would.
    if let Ok(modified) = input.metadata().and_then(|m| m.modified()) {
        output.set_modified(modified).ok();
    }
    Ok(())
}

/// Removes staging files left behind by an interrupted cycle. Returns how
/// many were removed.
pub fn cleanup_orphans(staging_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(staging_dir)
        .with_context(|| format!("read {}", staging_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot remove orphaned staging file"),
        }
    }
    if removed > 0 {
        info!(removed, "removed orphaned staging files");
    }
    Ok(removed)
}
