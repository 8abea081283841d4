use std::path::{Path, PathBuf};

use agentpack_installer::{
    resolve_install_paths, InstallOutcome, InstallReport, JsonEdits, ManagedState, McpEdit,
    PathOverrides, SettingsEdit, SettingsEditMode, TrackedState, UninstallReport, UninstallStatus,
};
use clap::{CommandFactory, Parser};
use serde_json::json;

use crate::dispatch::{install_message, status_lines, uninstall_message};
use crate::{Cli, Commands};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_repo_override_on_any_subcommand() {
    let cli = Cli::parse_from(["agentpack", "update", "--repo", "example/bundle"]);
    assert_eq!(cli.repo.as_deref(), Some("example/bundle"));
    assert!(matches!(cli.command, Commands::Update));
}

#[test]
fn install_messages_cover_every_outcome() {
    let base = InstallReport {
        outcome: InstallOutcome::Installed,
        release_id: 42,
        release_tag: "v1.2.0".to_string(),
        agent_files: 3,
        skipped_paths: Vec::new(),
    };
    assert_eq!(
        install_message(&base),
        "installed bundle v1.2.0 (release 42)"
    );

    let updated = InstallReport {
        outcome: InstallOutcome::Updated,
        ..base.clone()
    };
    assert_eq!(
        install_message(&updated),
        "updated bundle to v1.2.0 (release 42)"
    );

    let current = InstallReport {
        outcome: InstallOutcome::AlreadyCurrent,
        ..base
    };
    assert_eq!(
        install_message(&current),
        "bundle already at v1.2.0; configuration refreshed"
    );
}

#[test]
fn uninstall_message_pluralizes_directories() {
    let report = UninstallReport {
        status: UninstallStatus::Uninstalled,
        settings_reverted: true,
        mcp_reverted: true,
        removed_files: 4,
        removed_dirs: 1,
        skipped_paths: Vec::new(),
    };
    assert_eq!(
        uninstall_message(&report),
        "uninstalled bundle: removed 4 file(s) and 1 directory and reverted both config edits"
    );

    let many = UninstallReport {
        removed_dirs: 3,
        ..report
    };
    assert!(uninstall_message(&many).contains("3 directories"));

    let absent = UninstallReport {
        status: UninstallStatus::NotInstalled,
        settings_reverted: false,
        mcp_reverted: false,
        removed_files: 0,
        removed_dirs: 0,
        skipped_paths: Vec::new(),
    };
    assert_eq!(uninstall_message(&absent), "nothing to uninstall");
}

#[test]
fn status_lines_summarize_tracked_state() {
    let home = Path::new("/home/dev");
    let paths = resolve_install_paths(home, &PathOverrides::default());
    let state = TrackedState {
        schema_version: 1,
        repo: "example/bundle".to_string(),
        release_id: 42,
        release_tag: "v1.2.0".to_string(),
        installed_at: 1_770_000_000,
        managed_state: ManagedState {
            files: vec![PathBuf::from("/home/dev/.agentpack/agents/root.agent.md")],
            dirs: vec![PathBuf::from("/home/dev/.agentpack/agents")],
        },
        json_edits: JsonEdits {
            settings: SettingsEdit {
                file: paths.settings_file.clone(),
                agent_path: paths.agents_dir.display().to_string(),
                mode: SettingsEditMode::Direct,
                added: true,
            },
            mcp: McpEdit {
                file: paths.mcp_file.clone(),
                key: "agentpack".to_string(),
                touched: true,
                had_previous: true,
                previous: Some(json!({"command": "/user/own"})),
            },
        },
        asset_digests: Default::default(),
    };

    let lines = status_lines(&state, &paths);
    assert_eq!(lines[0], "release: v1.2.0 (id 42)");
    assert_eq!(lines[1], "repo: example/bundle");
    assert_eq!(lines[3], "managed: 1 file(s), 1 dir(s)");
    assert!(lines[4].ends_with(".agentpack/agents"));
}
