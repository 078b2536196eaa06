//! Atomic file output.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written file. Pairs of files that only make
//! sense together (a key and its certificate) are committed all-or-nothing.

use crate::error::Result;
use rand::RngCore;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Permissions applied to a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Default permissions for the process umask
    Public,
    /// Readable and writable by the owner only (unix)
    Private,
}

/// One file of a pair write.
#[derive(Debug, Clone, Copy)]
pub struct PendingFile<'a> {
    /// Final destination
    pub path: &'a Path,
    /// Complete file contents
    pub contents: &'a [u8],
    /// Permissions for the new file
    pub mode: FileMode,
}

/// Sibling path with a random suffix: `dir/.name.<tag>-<hex>`.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let suffix = rand::thread_rng().next_u64();
    path.with_file_name(format!(".{}.{}-{:016x}", name, tag, suffix))
}

fn create(path: &Path, mode: FileMode) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if mode == FileMode::Private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

/// Write `contents` to a fresh temporary sibling of `path` and return its path.
fn stage(path: &Path, contents: &[u8], mode: FileMode) -> std::io::Result<PathBuf> {
    let tmp = sibling(path, "tmp");
    let result = create(&tmp, mode).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    match result {
        Ok(()) => Ok(tmp),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        },
    }
}

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8], mode: FileMode) -> Result<()> {
    let tmp = stage(path, contents, mode)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    log::debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// Write two files so that either both new versions end up on disk or
/// neither does.
///
/// Existing files are moved aside first and restored if the second rename
/// fails.
pub fn write_pair_atomic(first: PendingFile<'_>, second: PendingFile<'_>) -> Result<()> {
    let tmp_first = stage(first.path, first.contents, first.mode)?;
    let tmp_second = match stage(second.path, second.contents, second.mode) {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = fs::remove_file(&tmp_first);
            return Err(e.into());
        },
    };

    let mut committed: Vec<&Path> = Vec::new();
    let mut backups: Vec<(PathBuf, &Path)> = Vec::new();
    let result = (|| -> std::io::Result<()> {
        for (tmp, target) in [(&tmp_first, first.path), (&tmp_second, second.path)] {
            if target.is_dir() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is a directory", target.display()),
                ));
            }
            if target.exists() {
                let backup = sibling(target, "bak");
                fs::rename(target, &backup)?;
                backups.push((backup, target));
            }
            fs::rename(tmp, target)?;
            committed.push(target);
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            for (backup, _) in &backups {
                let _ = fs::remove_file(backup);
            }
            log::debug!(
                "Wrote {} and {}",
                first.path.display(),
                second.path.display()
            );
            Ok(())
        },
        Err(e) => {
            log::warn!("Pair write failed, rolling back: {}", e);
            for target in committed {
                let _ = fs::remove_file(target);
            }
            for (backup, target) in backups {
                let _ = fs::rename(&backup, target);
            }
            let _ = fs::remove_file(&tmp_first);
            let _ = fs::remove_file(&tmp_second);
            Err(e.into())
        },
    }
}
