mod allowlist;
mod config_edits;
mod extract;
mod fs_utils;
mod layout;
mod orchestrate;
mod snapshots;
mod state;
mod types;

pub use allowlist::is_allowed_managed_path;
pub use config_edits::{apply_mcp_edit, apply_settings_edit, revert_mcp_edit, revert_settings_edit};
pub use extract::{extract_agents_archive, planned_archive_paths};
pub use fs_utils::remove_file_if_exists;
pub use layout::{
    resolve_install_paths, InstallPaths, PathOverrides, BIN_DIR_ENV, MCP_FILE_ENV,
    SETTINGS_FILE_ENV,
};
pub use orchestrate::{
    BinaryInstaller, Clock, FsBinaryInstaller, NullProgress, Orchestrator, ProgressSink,
    SystemClock,
};
pub use snapshots::SnapshotSet;
pub use state::{delete_tracked_state, read_tracked_state, write_tracked_state};
pub use types::{
    InstallOutcome, InstallReport, JsonEdits, ManagedState, McpEdit, SettingsEdit,
    SettingsEditMode, TrackedState, UninstallReport, UninstallStatus,
};
