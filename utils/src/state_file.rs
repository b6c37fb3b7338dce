//! Crash-safe state file helpers.
//!
//! Writes go through a temp file in the destination directory followed by a
//! rename. Where rename-over-existing fails (Windows), the old file is moved to
//! `<name>.bak` first; [`read_state_file`] restores that backup if a crash left
//! only the `.bak` behind.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSyncPolicy {
    /// `fsync` the temp file before the rename.
    #[default]
    SyncAll,
    SkipSync,
}

/// Read a state file, restoring an orphaned `.bak` first.
///
/// Returns `Ok(None)` when neither the file nor a backup exists.
pub fn read_state_file(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let backup = path.with_extension("bak");
    if !path.exists() && backup.exists() {
        match fs::rename(&backup, path) {
            Ok(()) => warn!(path = %path.display(), "Recovered state file from interrupted write"),
            Err(e) => warn!(path = %path.display(), "Failed to recover .bak state file: {e}"),
        }
    }

    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Atomically replace `path` with `bytes`.
pub fn write_state_file(path: &Path, bytes: &[u8], sync: FileSyncPolicy) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if sync == FileSyncPolicy::SyncAll {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = path.with_extension("bak");
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;

        if let Err(rename_err) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(rename_err.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            debug!(path = %backup.display(), "Failed to remove .bak after state write: {e}");
        }
    }

    Ok(())
}

/// Create `dir` (and parents) and restrict it to the owner on Unix.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(dir)?.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}
