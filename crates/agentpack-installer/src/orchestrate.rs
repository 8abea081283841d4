use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use agentpack_core::{CancelToken, Error, STATE_SCHEMA_VERSION};
use agentpack_release::{
    download_bundle, fetch_latest_release, select_bundle_assets, DownloadedBundle, HttpFetcher,
    Release,
};
use agentpack_security::AttestationVerifier;

use crate::allowlist::is_allowed_managed_path;
use crate::config_edits::{
    apply_mcp_edit, apply_settings_edit, revert_mcp_edit, revert_settings_edit,
};
use crate::extract::{extract_agents_archive, planned_archive_paths};
use crate::fs_utils::{
    create_dir_all_tracked, remove_dir_if_empty, remove_file_if_exists, topmost_missing_ancestor,
};
use crate::layout::InstallPaths;
use crate::snapshots::SnapshotSet;
use crate::state::{delete_tracked_state, read_tracked_state, write_tracked_state};
use crate::types::{
    InstallOutcome, InstallReport, JsonEdits, ManagedState, SettingsEdit, TrackedState,
    UninstallReport, UninstallStatus,
};

pub trait Clock {
    fn unix_timestamp(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Places one binary payload at its destination. Injected so tests and
/// alternate packagings can substitute the copy step.
pub trait BinaryInstaller {
    fn install(&self, source: &Path, dest: &Path) -> Result<(), Error>;
}

pub struct FsBinaryInstaller;

impl BinaryInstaller for FsBinaryInstaller {
    fn install(&self, source: &Path, dest: &Path) -> Result<(), Error> {
        remove_file_if_exists(dest)
            .map_err(|err| Error::io(format!("failed to replace binary {}", dest.display()), err))?;
        fs::copy(source, dest)
            .map_err(|err| Error::io(format!("failed to install binary {}", dest.display()), err))?;
        set_executable(dest)
    }
}

pub trait ProgressSink {
    fn phase(&mut self, label: &str);
}

pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn phase(&mut self, _label: &str) {}
}

/// The install/update/uninstall state machine. Every ambient collaborator is
/// an injected field; production and test wiring differ only in what gets
/// plugged in here.
pub struct Orchestrator {
    pub repo: String,
    pub http: Box<dyn HttpFetcher>,
    pub attestation: Box<dyn AttestationVerifier>,
    pub clock: Box<dyn Clock>,
    pub binaries: Box<dyn BinaryInstaller>,
}

impl Orchestrator {
    /// Install or refresh the bundle. Attestation runs before the first
    /// filesystem mutation; everything after it is snapshot-protected and
    /// rolls back as one unit. The tracked-state file is only written at the
    /// very end, atomically.
    pub fn install(
        &self,
        paths: &InstallPaths,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<InstallReport, Error> {
        let previous = read_tracked_state(&paths.state_file)?;
        cancel.check()?;

        progress.phase("resolving latest release");
        let release = fetch_latest_release(self.http.as_ref(), &self.repo)?;
        let assets = select_bundle_assets(&release)?;

        if let Some(prev) = previous.as_ref() {
            if prev.release_id == release.id {
                return self.refresh_config(paths, prev, &release, cancel, progress);
            }
        }

        cancel.check()?;
        let bundle = download_bundle(self.http.as_ref(), &assets, cancel, &mut |name| {
            progress.phase(&format!("downloading {name}"));
        })?;

        progress.phase("verifying attestation");
        for asset in [&bundle.agents, &bundle.server, &bundle.mcp] {
            cancel.check()?;
            self.attestation.verify(&asset.name, asset.path())?;
        }

        // Everything past this point mutates the filesystem.
        let mut snapshots = SnapshotSet::new()?;
        match self.apply_bundle(
            paths,
            previous.as_ref(),
            &release,
            &bundle,
            cancel,
            &mut snapshots,
            progress,
        ) {
            Ok(report) => Ok(report),
            Err(original) => Err(roll_back(&snapshots, original)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_bundle(
        &self,
        paths: &InstallPaths,
        previous: Option<&TrackedState>,
        release: &Release,
        bundle: &DownloadedBundle,
        cancel: &CancelToken,
        snapshots: &mut SnapshotSet,
        progress: &mut dyn ProgressSink,
    ) -> Result<InstallReport, Error> {
        let (planned_files, planned_dirs) =
            planned_archive_paths(bundle.agents.path(), &paths.agents_dir)?;
        let binary_paths = paths.managed_binary_paths();

        let mut skipped = Vec::new();
        let mut created_dirs = Vec::new();

        // Stale content from the previous release goes first, so the new
        // extraction never fights leftover files.
        if let Some(prev) = previous {
            progress.phase("removing stale files");
            remove_stale_paths(
                paths,
                prev,
                &planned_files,
                &planned_dirs,
                &binary_paths,
                cancel,
                snapshots,
                &mut skipped,
            )?;
        }

        cancel.check()?;
        progress.phase("installing agent files");
        guard_dir(snapshots, &paths.agents_dir)?;
        create_dir_all_tracked(&paths.agents_dir, &mut created_dirs).map_err(|err| {
            Error::io(
                format!("failed to create {}", paths.agents_dir.display()),
                err,
            )
        })?;
        let agent_files = extract_agents_archive(bundle.agents.path(), &paths.agents_dir)?;

        cancel.check()?;
        progress.phase("installing binaries");
        guard_missing_dir(snapshots, &paths.bin_dir)?;
        create_dir_all_tracked(&paths.bin_dir, &mut created_dirs).map_err(|err| {
            Error::io(format!("failed to create {}", paths.bin_dir.display()), err)
        })?;
        for (asset, dest) in [
            (&bundle.server, paths.server_binary()),
            (&bundle.mcp, paths.mcp_binary()),
        ] {
            snapshots.capture_file(&dest)?;
            self.binaries.install(asset.path(), &dest)?;
        }

        cancel.check()?;
        progress.phase("updating host configuration");
        for config in [&paths.settings_file, &paths.mcp_file] {
            if let Some(parent) = config.parent() {
                guard_missing_dir(snapshots, parent)?;
                create_dir_all_tracked(parent, &mut created_dirs).map_err(|err| {
                    Error::io(format!("failed to create {}", parent.display()), err)
                })?;
            }
        }
        snapshots.capture_file(&paths.settings_file)?;
        let agent_path = paths.agents_dir.display().to_string();
        let settings_edit =
            carry_settings_added(previous, apply_settings_edit(&paths.settings_file, &agent_path)?);
        snapshots.capture_file(&paths.mcp_file)?;
        let mcp_edit = apply_mcp_edit(
            &paths.mcp_file,
            &paths.mcp_binary().display().to_string(),
            previous.map(|prev| &prev.json_edits.mcp),
        )?;

        if let Some(parent) = paths.state_file.parent() {
            guard_missing_dir(snapshots, parent)?;
            create_dir_all_tracked(parent, &mut created_dirs)
                .map_err(|err| Error::io(format!("failed to create {}", parent.display()), err))?;
        }

        // Managed set: carried-forward directories, then everything this run
        // created or wrote, in encounter order.
        let mut managed = ManagedState::default();
        if let Some(prev) = previous {
            for dir in &prev.managed_state.dirs {
                if dir.exists() {
                    managed.add_dir(dir.clone());
                }
            }
        }
        for dir in &created_dirs {
            managed.add_dir(dir.clone());
        }
        for dir in &planned_dirs {
            managed.add_dir(dir.clone());
        }
        for file in &agent_files {
            managed.add_file(file.clone());
        }
        for file in &binary_paths {
            managed.add_file(file.clone());
        }

        cancel.check()?;
        let state = TrackedState {
            schema_version: STATE_SCHEMA_VERSION,
            repo: self.repo.clone(),
            release_id: release.id,
            release_tag: release.tag_name.clone(),
            installed_at: self.clock.unix_timestamp(),
            managed_state: managed,
            json_edits: JsonEdits {
                settings: settings_edit,
                mcp: mcp_edit,
            },
            asset_digests: BTreeMap::from([
                (bundle.agents.name.clone(), bundle.agents.sha256.clone()),
                (bundle.server.name.clone(), bundle.server.sha256.clone()),
                (bundle.mcp.name.clone(), bundle.mcp.sha256.clone()),
            ]),
        };
        write_tracked_state(&paths.state_file, &state)?;

        let outcome = if previous.is_some() {
            InstallOutcome::Updated
        } else {
            InstallOutcome::Installed
        };
        Ok(InstallReport {
            outcome,
            release_id: release.id,
            release_tag: release.tag_name.clone(),
            agent_files: agent_files.len(),
            skipped_paths: skipped,
        })
    }

    /// The tracked release already matches the latest one: skip downloads
    /// and attestation, re-apply the config edits idempotently, refresh the
    /// timestamp. `managedState` is carried over untouched.
    fn refresh_config(
        &self,
        paths: &InstallPaths,
        prev: &TrackedState,
        release: &Release,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<InstallReport, Error> {
        progress.phase("release already current; refreshing configuration");
        cancel.check()?;

        let mut snapshots = SnapshotSet::new()?;
        match self.reapply_config(paths, prev, release, cancel, &mut snapshots) {
            Ok(report) => Ok(report),
            Err(original) => Err(roll_back(&snapshots, original)),
        }
    }

    fn reapply_config(
        &self,
        paths: &InstallPaths,
        prev: &TrackedState,
        release: &Release,
        cancel: &CancelToken,
        snapshots: &mut SnapshotSet,
    ) -> Result<InstallReport, Error> {
        let mut created_dirs = Vec::new();
        for config in [&paths.settings_file, &paths.mcp_file] {
            if let Some(parent) = config.parent() {
                guard_missing_dir(snapshots, parent)?;
                create_dir_all_tracked(parent, &mut created_dirs).map_err(|err| {
                    Error::io(format!("failed to create {}", parent.display()), err)
                })?;
            }
        }

        snapshots.capture_file(&paths.settings_file)?;
        let agent_path = paths.agents_dir.display().to_string();
        let settings_edit = carry_settings_added(
            Some(prev),
            apply_settings_edit(&paths.settings_file, &agent_path)?,
        );
        snapshots.capture_file(&paths.mcp_file)?;
        let mcp_edit = apply_mcp_edit(
            &paths.mcp_file,
            &paths.mcp_binary().display().to_string(),
            Some(&prev.json_edits.mcp),
        )?;

        cancel.check()?;
        let mut managed = prev.managed_state.clone();
        for dir in &created_dirs {
            managed.add_dir(dir.clone());
        }
        let agent_file_count = managed
            .files
            .iter()
            .filter(|file| file.starts_with(&paths.agents_dir))
            .count();

        let state = TrackedState {
            schema_version: STATE_SCHEMA_VERSION,
            repo: self.repo.clone(),
            release_id: release.id,
            release_tag: release.tag_name.clone(),
            installed_at: self.clock.unix_timestamp(),
            managed_state: managed,
            json_edits: JsonEdits {
                settings: settings_edit,
                mcp: mcp_edit,
            },
            asset_digests: prev.asset_digests.clone(),
        };
        write_tracked_state(&paths.state_file, &state)?;

        Ok(InstallReport {
            outcome: InstallOutcome::AlreadyCurrent,
            release_id: release.id,
            release_tag: release.tag_name.clone(),
            agent_files: agent_file_count,
            skipped_paths: Vec::new(),
        })
    }

    /// Reverts both config edits first (both always run, outcomes reported
    /// distinctly), then removes managed paths behind the allowlist, and
    /// deletes the tracked-state file only after everything else succeeded.
    /// Any mid-way failure leaves the tracked-state file intact for a retry.
    pub fn uninstall(
        &self,
        paths: &InstallPaths,
        cancel: &CancelToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<UninstallReport, Error> {
        let Some(state) = read_tracked_state(&paths.state_file)? else {
            return Ok(UninstallReport {
                status: UninstallStatus::NotInstalled,
                settings_reverted: false,
                mcp_reverted: false,
                removed_files: 0,
                removed_dirs: 0,
                skipped_paths: Vec::new(),
            });
        };
        cancel.check()?;

        progress.phase("reverting host configuration");
        let mcp_result = revert_mcp_edit(&state.json_edits.mcp);
        let settings_result = revert_settings_edit(&state.json_edits.settings);
        match (mcp_result, settings_result) {
            (Ok(()), Ok(())) => {}
            (Err(err), Ok(())) | (Ok(()), Err(err)) => return Err(err),
            (Err(mcp_err), Err(settings_err)) => {
                return Err(Error::RevertFailed {
                    detail: format!(
                        "mcp revert: {mcp_err}; settings revert: {settings_err}"
                    ),
                });
            }
        }

        progress.phase("removing managed files");
        let binary_paths = paths.managed_binary_paths();
        let mut removed_files = 0_usize;
        let mut removed_dirs = 0_usize;
        let mut skipped = Vec::new();

        for file in &state.managed_state.files {
            if !is_allowed_managed_path(file, &paths.agents_dir, &binary_paths) {
                skipped.push(file.clone());
                continue;
            }
            cancel.check()?;
            remove_file_if_exists(file)
                .map_err(|err| Error::io(format!("failed to remove {}", file.display()), err))?;
            removed_files += 1;
        }

        let mut dirs: Vec<&PathBuf> = state.managed_state.dirs.iter().collect();
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        let mut deferred = Vec::new();
        for dir in dirs {
            cancel.check()?;
            if is_ancestor_of(dir, &paths.state_file) {
                // Still holds the tracked-state file; swept after the final
                // state deletion.
                deferred.push(dir);
                continue;
            }
            if is_allowed_managed_path(dir, &paths.agents_dir, &binary_paths) {
                if dir.exists() {
                    fs::remove_dir_all(dir).map_err(|err| {
                        Error::io(format!("failed to remove {}", dir.display()), err)
                    })?;
                    removed_dirs += 1;
                }
                continue;
            }
            if dir == &paths.bin_dir {
                if remove_dir_if_empty(dir)
                    .map_err(|err| Error::io(format!("failed to remove {}", dir.display()), err))?
                {
                    removed_dirs += 1;
                }
                continue;
            }
            if is_ancestor_of(dir, &paths.settings_file) || is_ancestor_of(dir, &paths.mcp_file) {
                if remove_config_owner_dir(dir, paths)? {
                    removed_dirs += 1;
                } else {
                    skipped.push(dir.clone());
                }
                continue;
            }
            skipped.push(dir.clone());
        }

        cancel.check()?;
        progress.phase("removing tracked state");
        delete_tracked_state(&paths.state_file)?;
        for dir in deferred {
            let _ = remove_dir_if_empty(dir);
        }
        if let Some(state_dir) = paths.state_file.parent() {
            let _ = remove_dir_if_empty(state_dir);
            if let Some(root) = state_dir.parent() {
                let _ = remove_dir_if_empty(root);
            }
        }

        Ok(UninstallReport {
            status: UninstallStatus::Uninstalled,
            settings_reverted: true,
            mcp_reverted: true,
            removed_files,
            removed_dirs,
            skipped_paths: skipped,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn remove_stale_paths(
    paths: &InstallPaths,
    prev: &TrackedState,
    planned_files: &[PathBuf],
    planned_dirs: &[PathBuf],
    binary_paths: &[PathBuf; 2],
    cancel: &CancelToken,
    snapshots: &mut SnapshotSet,
    skipped: &mut Vec<PathBuf>,
) -> Result<(), Error> {
    let keep_files: HashSet<&PathBuf> = planned_files.iter().chain(binary_paths.iter()).collect();
    for file in &prev.managed_state.files {
        if keep_files.contains(file) {
            continue;
        }
        if !is_allowed_managed_path(file, &paths.agents_dir, binary_paths) {
            skipped.push(file.clone());
            continue;
        }
        cancel.check()?;
        snapshots.capture_file(file)?;
        remove_file_if_exists(file).map_err(|err| {
            Error::io(format!("failed to remove stale file {}", file.display()), err)
        })?;
    }

    let keep_dirs: HashSet<&PathBuf> = planned_dirs.iter().collect();
    let mut stale_dirs: Vec<&PathBuf> = prev
        .managed_state
        .dirs
        .iter()
        .filter(|dir| !keep_dirs.contains(*dir))
        .filter(|dir| dir.starts_with(&paths.agents_dir) && **dir != paths.agents_dir)
        .collect();
    stale_dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
    for dir in stale_dirs {
        cancel.check()?;
        if !dir.exists() {
            continue;
        }
        snapshots.capture_dir(dir)?;
        remove_dir_if_empty(dir).map_err(|err| {
            Error::io(
                format!("failed to remove stale directory {}", dir.display()),
                err,
            )
        })?;
    }
    Ok(())
}

/// `added` is part of the baseline: once this system appended the entry, a
/// later re-apply that finds the entry already present (because we put it
/// there) must not flip `added` back to false, or uninstall would leave the
/// entry behind.
fn carry_settings_added(previous: Option<&TrackedState>, edit: SettingsEdit) -> SettingsEdit {
    match previous {
        Some(prev)
            if prev.json_edits.settings.added
                && prev.json_edits.settings.agent_path == edit.agent_path =>
        {
            SettingsEdit { added: true, ..edit }
        }
        _ => edit,
    }
}

fn roll_back(snapshots: &SnapshotSet, original: Error) -> Error {
    match snapshots.rollback() {
        Ok(()) => original,
        Err(detail) => Error::RollbackFailed {
            cause: Box::new(original),
            detail,
        },
    }
}

/// Deep-captures `path` when it exists; otherwise captures its topmost
/// missing ancestor so rollback removes every directory about to be created.
fn guard_dir(snapshots: &mut SnapshotSet, path: &Path) -> Result<(), Error> {
    match topmost_missing_ancestor(path) {
        Some(top) => snapshots.capture_dir(&top),
        None => snapshots.capture_dir(path),
    }
}

/// Like `guard_dir` but never deep-copies an existing directory; used for
/// directories we only add files into (their files are captured one by one).
fn guard_missing_dir(snapshots: &mut SnapshotSet, path: &Path) -> Result<(), Error> {
    if let Some(top) = topmost_missing_ancestor(path) {
        snapshots.capture_dir(&top)?;
    }
    Ok(())
}

fn is_ancestor_of(dir: &Path, file: &Path) -> bool {
    file != dir && file.starts_with(dir)
}

/// A managed directory that holds one of the config files may be removed
/// only when it contains nothing but those config files; anything else in it
/// belongs to the host and stays.
fn remove_config_owner_dir(dir: &Path, paths: &InstallPaths) -> Result<bool, Error> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(Error::io(format!("failed to read {}", dir.display()), err));
        }
    };
    for entry in entries {
        let entry =
            entry.map_err(|err| Error::io(format!("failed to read {}", dir.display()), err))?;
        let path = entry.path();
        if path != paths.settings_file && path != paths.mcp_file {
            return Ok(false);
        }
    }
    fs::remove_dir_all(dir)
        .map_err(|err| Error::io(format!("failed to remove {}", dir.display()), err))?;
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|err| {
        Error::io(
            format!("failed to set permissions on {}", path.display()),
            err,
        )
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}
