use std::fs;
use std::io;
use std::path::Path;

use agentpack_core::Error;

use crate::fs_utils::remove_file_if_exists;
use crate::types::TrackedState;

/// A missing file means "no prior installation". A file that exists but does
/// not parse is fatal for every operation; the caller must not guess.
pub fn read_tracked_state(path: &Path) -> Result<Option<TrackedState>, Error> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::StateUnreadable {
                path: path.to_path_buf(),
                detail: err.to_string(),
            });
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| Error::StateUnreadable {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })
}

/// Write-temp-then-rename so a crash mid-write can never leave a
/// half-written record behind.
pub fn write_tracked_state(path: &Path, state: &TrackedState) -> Result<(), Error> {
    let mut payload = serde_json::to_string_pretty(state).map_err(|err| Error::StateWrite {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    payload.push('\n');

    let tmp = sibling_tmp_path(path);
    fs::write(&tmp, payload).map_err(|err| Error::StateWrite {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = remove_file_if_exists(&tmp);
        return Err(Error::StateWrite {
            path: path.to_path_buf(),
            detail: err.to_string(),
        });
    }
    Ok(())
}

pub fn delete_tracked_state(path: &Path) -> Result<(), Error> {
    remove_file_if_exists(path)
        .map_err(|err| Error::io(format!("failed to remove tracked state {}", path.display()), err))
}

fn sibling_tmp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tracked.json".to_string());
    path.with_file_name(format!("{file_name}.tmp"))
}
