use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use agentpack_core::Error;
use zip::ZipArchive;

/// Unpacks the agents archive into `dest`, stripping exactly one leading
/// path component per entry. An entry whose remainder is empty (the
/// top-level directory itself) is skipped. Returns the destination file
/// paths that were written, in encounter order, for the caller to register
/// as managed.
pub fn extract_agents_archive(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut archive = open_archive(archive_path)?;

    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| Error::Archive {
                detail: err.to_string(),
            })?;
        let name = entry.name().to_string();
        let Some(rel) = stripped_entry_path(&name)? else {
            continue;
        };

        let out = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)
                .map_err(|err| Error::io(format!("failed to create {}", out.display()), err))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io(format!("failed to create {}", parent.display()), err))?;
        }
        let mut out_file = File::create(&out)
            .map_err(|err| Error::io(format!("failed to create {}", out.display()), err))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|err| Error::io(format!("failed to extract {}", out.display()), err))?;
        written.push(out);
    }

    Ok(written)
}

/// Destination (files, dirs) extraction would produce, without writing
/// anything. The update path uses this to compute stale managed paths
/// before the first mutation.
pub fn planned_archive_paths(
    archive_path: &Path,
    dest: &Path,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), Error> {
    let mut archive = open_archive(archive_path)?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|err| Error::Archive {
                detail: err.to_string(),
            })?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        let Some(rel) = stripped_entry_path(&name)? else {
            continue;
        };

        let out = dest.join(&rel);
        if is_dir {
            push_unique(&mut dirs, out);
        } else {
            if let Some(parent) = out.parent() {
                collect_dirs_below(dest, parent, &mut dirs);
            }
            push_unique(&mut files, out);
        }
    }

    Ok((files, dirs))
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<File>, Error> {
    let file = File::open(archive_path).map_err(|err| {
        Error::io(
            format!("failed to open agents archive {}", archive_path.display()),
            err,
        )
    })?;
    ZipArchive::new(file).map_err(|err| Error::Archive {
        detail: err.to_string(),
    })
}

/// Entry name with its first path component removed, or `None` when the
/// remainder is empty. Entries that would escape the destination are
/// rejected outright.
fn stripped_entry_path(name: &str) -> Result<Option<PathBuf>, Error> {
    let normalized = name.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    let Some((_, rest)) = trimmed.split_once('/') else {
        return Ok(None);
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Ok(None);
    }

    let rel = PathBuf::from(rest);
    for component in rel.components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(Error::Archive {
                detail: format!("archive entry escapes destination: {name}"),
            });
        }
    }
    Ok(Some(rel))
}

/// Records `dir` and its ancestors strictly below `dest`, topmost first.
fn collect_dirs_below(dest: &Path, dir: &Path, dirs: &mut Vec<PathBuf>) {
    let mut chain = Vec::new();
    let mut current = dir;
    while current != dest && current.starts_with(dest) {
        chain.push(current.to_path_buf());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    for entry in chain.into_iter().rev() {
        push_unique(dirs, entry);
    }
}

fn push_unique(list: &mut Vec<PathBuf>, item: PathBuf) {
    if !list.contains(&item) {
        list.push(item);
    }
}
