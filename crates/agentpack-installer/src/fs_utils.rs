use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub(crate) fn copy_dir_recursive(source_root: &Path, destination_root: &Path) -> io::Result<()> {
    fs::create_dir_all(destination_root)?;

    let mut queue: VecDeque<(PathBuf, PathBuf)> = VecDeque::new();
    queue.push_back((source_root.to_path_buf(), destination_root.to_path_buf()));

    while let Some((from_dir, to_dir)) = queue.pop_front() {
        for entry in fs::read_dir(&from_dir)? {
            let entry = entry?;
            let from_path = entry.path();
            let to_path = to_dir.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::create_dir_all(&to_path)?;
                queue.push_back((from_path, to_path));
            } else if file_type.is_file() {
                fs::copy(&from_path, &to_path)?;
            }
        }
    }

    Ok(())
}

/// Removes `path` only when it is an empty directory. Missing and non-empty
/// directories are both reported as "not removed", not as errors.
pub(crate) fn remove_dir_if_empty(path: &Path) -> io::Result<bool> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path)?;
    Ok(true)
}

/// `create_dir_all` that also records which directories did not exist
/// before, topmost first, so the caller can register them as managed.
pub(crate) fn create_dir_all_tracked(path: &Path, created: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() || dir.exists() {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }

    fs::create_dir_all(path)?;
    for dir in missing.into_iter().rev() {
        created.push(dir);
    }
    Ok(())
}

/// Highest ancestor of `path` (possibly `path` itself) that does not exist,
/// or `None` when `path` exists. Snapshotting that ancestor is enough for a
/// rollback to undo every directory a `create_dir_all` will produce.
pub(crate) fn topmost_missing_ancestor(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return None;
    }
    let mut top = path.to_path_buf();
    while let Some(parent) = top.parent() {
        if parent.as_os_str().is_empty() || parent.exists() {
            break;
        }
        top = parent.to_path_buf();
    }
    Some(top)
}
