use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use agentpack_core::Error;
use tempfile::TempDir;

use crate::fs_utils::{copy_dir_recursive, remove_file_if_exists};

/// Captures restorable copies of paths before they are mutated, staged in a
/// scoped temp directory. On failure the caller restores everything in
/// reverse capture order; on success dropping the set discards the staging.
pub struct SnapshotSet {
    staging: TempDir,
    entries: Vec<SnapshotEntry>,
    seen: HashSet<PathBuf>,
}

struct SnapshotEntry {
    path: PathBuf,
    captured: Captured,
}

enum Captured {
    Missing { is_dir: bool },
    File { backup: PathBuf, mode: Option<u32> },
    Dir { backup: PathBuf },
}

impl SnapshotSet {
    pub fn new() -> Result<Self, Error> {
        let staging = tempfile::Builder::new()
            .prefix("agentpack-rollback-")
            .tempdir()
            .map_err(|err| Error::io("failed to create rollback staging directory", err))?;
        Ok(Self {
            staging,
            entries: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Captures the pre-mutation state of a file path. The first capture of
    /// a path wins; later captures of the same path are no-ops, so the
    /// restored state is always the one that predates the operation.
    pub fn capture_file(&mut self, path: &Path) -> Result<(), Error> {
        if !self.seen.insert(path.to_path_buf()) {
            return Ok(());
        }

        match fs::symlink_metadata(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.entries.push(SnapshotEntry {
                    path: path.to_path_buf(),
                    captured: Captured::Missing { is_dir: false },
                });
                Ok(())
            }
            Err(err) => Err(snapshot_failed("file", path, err.to_string())),
            Ok(metadata) if metadata.is_dir() => Err(snapshot_failed(
                "file",
                path,
                "path is a directory".to_string(),
            )),
            Ok(metadata) => {
                let backup = self.next_slot();
                fs::copy(path, &backup)
                    .map_err(|err| snapshot_failed("file", path, err.to_string()))?;
                self.entries.push(SnapshotEntry {
                    path: path.to_path_buf(),
                    captured: Captured::File {
                        backup,
                        mode: file_mode(&metadata),
                    },
                });
                Ok(())
            }
        }
    }

    /// Captures a directory deeply, or records that it did not exist.
    pub fn capture_dir(&mut self, path: &Path) -> Result<(), Error> {
        if !self.seen.insert(path.to_path_buf()) {
            return Ok(());
        }

        match fs::symlink_metadata(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.entries.push(SnapshotEntry {
                    path: path.to_path_buf(),
                    captured: Captured::Missing { is_dir: true },
                });
                Ok(())
            }
            Err(err) => Err(snapshot_failed("directory", path, err.to_string())),
            Ok(metadata) if metadata.is_dir() => {
                let backup = self.next_slot();
                copy_dir_recursive(path, &backup)
                    .map_err(|err| snapshot_failed("directory", path, err.to_string()))?;
                self.entries.push(SnapshotEntry {
                    path: path.to_path_buf(),
                    captured: Captured::Dir { backup },
                });
                Ok(())
            }
            Ok(_) => Err(snapshot_failed(
                "directory",
                path,
                "path is not a directory".to_string(),
            )),
        }
    }

    /// Restores every captured path to its pre-operation state, in reverse
    /// capture order. Returns a detail string when any restore fails; that
    /// condition is strictly worse than the failure that triggered it.
    pub fn rollback(&self) -> Result<(), String> {
        let mut failures = Vec::new();
        for entry in self.entries.iter().rev() {
            if let Err(detail) = restore_entry(entry) {
                failures.push(detail);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    fn next_slot(&self) -> PathBuf {
        self.staging.path().join(format!("s{}", self.entries.len()))
    }
}

fn restore_entry(entry: &SnapshotEntry) -> Result<(), String> {
    match &entry.captured {
        Captured::Missing { is_dir } => {
            let result = if *is_dir {
                match fs::remove_dir_all(&entry.path) {
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                    other => other,
                }
            } else {
                remove_file_if_exists(&entry.path)
            };
            result.map_err(|err| format!("failed to remove {}: {err}", entry.path.display()))
        }
        Captured::File { backup, mode } => {
            if entry.path.is_dir() {
                fs::remove_dir_all(&entry.path)
                    .map_err(|err| format!("failed to clear {}: {err}", entry.path.display()))?;
            }
            if let Some(parent) = entry.path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| format!("failed to recreate {}: {err}", parent.display()))?;
            }
            fs::copy(backup, &entry.path)
                .map_err(|err| format!("failed to restore {}: {err}", entry.path.display()))?;
            restore_mode(&entry.path, *mode)
                .map_err(|err| format!("failed to restore mode on {}: {err}", entry.path.display()))
        }
        Captured::Dir { backup } => {
            if entry.path.exists() {
                fs::remove_dir_all(&entry.path)
                    .map_err(|err| format!("failed to clear {}: {err}", entry.path.display()))?;
            }
            copy_dir_recursive(backup, &entry.path)
                .map_err(|err| format!("failed to restore {}: {err}", entry.path.display()))
        }
    }
}

fn snapshot_failed(what: &'static str, path: &Path, detail: String) -> Error {
    Error::SnapshotFailed {
        what,
        path: path.to_path_buf(),
        detail,
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
