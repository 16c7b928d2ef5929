//! Atomic file write helpers.
//!
//! Writes go to a temp file in the target directory which is then renamed over
//! the destination. Where rename-over-existing fails (Windows) the old file is
//! moved to `.bak` first and restored if the second rename fails too.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Inherit the default umask.
    #[default]
    Default,
    /// Owner-only read/write (0o600 on Unix).
    OwnerOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    pub file_sync: FileSyncPolicy,
    pub mode: PersistMode,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            mode: PersistMode::OwnerOnly,
        }
    }
}

/// Restore `path` from `path.bak` after a crash inside the backup window.
///
/// Returns `true` when a backup was moved back into place.
pub fn recover_bak_file(path: &Path) -> bool {
    let backup = path.with_extension("bak");
    if path.exists() || !backup.exists() {
        return false;
    }
    match fs::rename(&backup, path) {
        Ok(()) => {
            tracing::warn!(
                path = %path.display(),
                "Recovered .bak file from interrupted atomic write"
            );
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to recover .bak file: {e}");
            false
        }
    }
}

/// Read `path`, first recovering an interrupted write. `Ok(None)` if absent.
pub fn read_recovering(path: &Path) -> io::Result<Option<Vec<u8>>> {
    recover_bak_file(path);
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with_options(path, bytes, AtomicWriteOptions::default())
}

pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    apply_mode(tmp.path(), options.mode)?;
    tmp.write_all(bytes)?;
    if options.file_sync == FileSyncPolicy::SyncAll {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = path.with_extension("bak");
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;
        if let Err(retry) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(retry.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!(path = %backup.display(), "Failed to remove .bak after atomic write: {e}");
        }
    }

    apply_mode(path, options.mode)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: PersistMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        PersistMode::Default => Ok(()),
        PersistMode::OwnerOnly => fs::set_permissions(path, fs::Permissions::from_mode(0o600)),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: PersistMode) -> io::Result<()> {
    Ok(())
}
