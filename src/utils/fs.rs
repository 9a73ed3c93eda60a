//! File system helpers
//!
//! - [`ensure_dir`] creates a directory tree, failing if a file is in the way
//! - [`atomic_write`] replaces a file through a temporary sibling and a rename
//! - [`backup_file`] copies a file to a timestamped sibling that is never overwritten

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating parents as needed.
///
/// # Errors
///
/// Fails if the directory cannot be created or `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically replace `path` with `content`.
///
/// The content is written to a temporary file in the same directory, synced,
/// given the permissions of the file it replaces (0644 for a new file), and
/// renamed over the target. Readers see either the old or the new content.
///
/// # Errors
///
/// Fails if the temporary file cannot be created, written, synced or renamed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".erp-migrate-")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = fs::metadata(path).map(|m| m.permissions().mode() & 0o7777).unwrap_or(0o644);
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions for {}", path.display()))?;
    }

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Copy `path` to `<path>.bak.<stamp>` and return the backup location.
///
/// An existing backup is never overwritten: if the name is taken, `.1`, `.2`,
/// and so on are appended until a free name is found.
///
/// # Errors
///
/// Fails if the source cannot be read or the backup cannot be written.
pub fn backup_file(path: &Path, stamp: &str) -> Result<PathBuf> {
    let target = free_backup_path(path, stamp);
    fs::copy(path, &target).with_context(|| {
        format!("Failed to back up {} to {}", path.display(), target.display())
    })?;
    Ok(target)
}

fn free_backup_path(path: &Path, stamp: &str) -> PathBuf {
    let base = format!("{}.bak.{stamp}", path.display());
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{n}"));
        n += 1;
    }
    candidate
}
