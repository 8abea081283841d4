use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The persisted transaction record: everything the system has installed or
/// edited, read at the start of every operation and rewritten atomically at
/// the end of a successful one. Absence of the file means "not installed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedState {
    pub schema_version: u32,
    pub repo: String,
    pub release_id: i64,
    pub release_tag: String,
    pub installed_at: u64,
    pub managed_state: ManagedState,
    pub json_edits: JsonEdits,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_digests: BTreeMap<String, String>,
}

/// Insertion-ordered, duplicate-free sets of every path the system created
/// and is responsible for removing on uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedState {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

impl ManagedState {
    pub fn add_file(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn add_dir(&mut self, path: PathBuf) {
        if !self.dirs.contains(&path) {
            self.dirs.push(path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEdits {
    pub settings: SettingsEdit,
    pub mcp: McpEdit,
}

/// Where the agent-files array was edited and whether an entry was actually
/// appended. `added == false` means the value pre-existed and revert must
/// not remove it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsEdit {
    pub file: PathBuf,
    pub agent_path: String,
    pub mode: SettingsEditMode,
    pub added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsEditMode {
    Direct,
    Nested,
}

/// Baseline for the managed MCP server entry. `hadPrevious`/`previous`
/// always point at the last state that predates this system's own
/// management; re-applying the edit never overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpEdit {
    pub file: PathBuf,
    pub key: String,
    pub touched: bool,
    pub had_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Updated,
    AlreadyCurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub outcome: InstallOutcome,
    pub release_id: i64,
    pub release_tag: String,
    pub agent_files: usize,
    pub skipped_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallStatus {
    NotInstalled,
    Uninstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub status: UninstallStatus,
    pub settings_reverted: bool,
    pub mcp_reverted: bool,
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub skipped_paths: Vec<PathBuf>,
}
