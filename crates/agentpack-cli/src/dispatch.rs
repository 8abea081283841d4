use std::path::PathBuf;

use anyhow::{Context, Result};

use agentpack_core::{CancelToken, DEFAULT_REPO};
use agentpack_installer::{
    read_tracked_state, resolve_install_paths, FsBinaryInstaller, InstallOutcome, InstallPaths,
    InstallReport, Orchestrator, PathOverrides, SystemClock, TrackedState, UninstallReport,
    UninstallStatus,
};
use agentpack_release::ReqwestFetcher;
use agentpack_security::GhCliVerifier;

use crate::render::{current_output_style, PhaseProgress, TerminalRenderer};
use crate::{Cli, Commands};

pub fn run_cli(cli: Cli) -> Result<()> {
    let repo = cli.repo.unwrap_or_else(|| DEFAULT_REPO.to_string());

    match cli.command {
        Commands::Install => run_install(repo, false),
        Commands::Update => run_install(repo, true),
        Commands::Uninstall => run_uninstall(repo),
        Commands::Status => run_status(),
        Commands::Completions { shell } => {
            crate::completion::write_completions(shell);
            Ok(())
        }
    }
}

fn run_install(repo: String, update_requested: bool) -> Result<()> {
    let paths = resolve_paths()?;
    let renderer = TerminalRenderer::current();
    let orchestrator = build_orchestrator(repo)?;

    let cancel = CancelToken::new();
    let mut progress = PhaseProgress::new(current_output_style());
    let result = orchestrator.install(&paths, &cancel, &mut progress);
    progress.finish();
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if err.needs_manual_recovery() {
                renderer.print_error(
                    "rollback did not fully restore the previous state; manual inspection is required",
                );
            }
            return Err(err.into());
        }
    };

    if update_requested && report.outcome == InstallOutcome::Installed {
        renderer.print_warning("no previous installation was found; performed a fresh install");
    }
    renderer.print_status(&install_message(&report));
    renderer.print_status(&format!(
        "{} agent file(s) under {}",
        report.agent_files,
        paths.agents_dir.display()
    ));
    for path in &report.skipped_paths {
        renderer.print_warning(&format!("left unmanaged path alone: {}", path.display()));
    }
    Ok(())
}

fn run_uninstall(repo: String) -> Result<()> {
    let paths = resolve_paths()?;
    let renderer = TerminalRenderer::current();
    let orchestrator = build_orchestrator(repo)?;

    let cancel = CancelToken::new();
    let mut progress = PhaseProgress::new(current_output_style());
    let result = orchestrator.uninstall(&paths, &cancel, &mut progress);
    progress.finish();
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if err.needs_manual_recovery() {
                renderer.print_error(
                    "rollback did not fully restore the previous state; manual inspection is required",
                );
            }
            return Err(err.into());
        }
    };

    renderer.print_status(&uninstall_message(&report));
    for path in &report.skipped_paths {
        renderer.print_warning(&format!(
            "tracked path was outside the managed area and was left alone: {}",
            path.display()
        ));
    }
    Ok(())
}

fn run_status() -> Result<()> {
    let paths = resolve_paths()?;
    let renderer = TerminalRenderer::current();

    match read_tracked_state(&paths.state_file)? {
        None => renderer.print_status("agentpack is not installed"),
        Some(state) => {
            for line in status_lines(&state, &paths) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

pub(crate) fn install_message(report: &InstallReport) -> String {
    match report.outcome {
        InstallOutcome::Installed => format!(
            "installed bundle {} (release {})",
            report.release_tag, report.release_id
        ),
        InstallOutcome::Updated => format!(
            "updated bundle to {} (release {})",
            report.release_tag, report.release_id
        ),
        InstallOutcome::AlreadyCurrent => format!(
            "bundle already at {}; configuration refreshed",
            report.release_tag
        ),
    }
}

pub(crate) fn uninstall_message(report: &UninstallReport) -> String {
    match report.status {
        UninstallStatus::NotInstalled => "nothing to uninstall".to_string(),
        UninstallStatus::Uninstalled => format!(
            "uninstalled bundle: removed {} file(s) and {} director{} and reverted both config edits",
            report.removed_files,
            report.removed_dirs,
            if report.removed_dirs == 1 { "y" } else { "ies" },
        ),
    }
}

pub(crate) fn status_lines(state: &TrackedState, paths: &InstallPaths) -> Vec<String> {
    vec![
        format!("release: {} (id {})", state.release_tag, state.release_id),
        format!("repo: {}", state.repo),
        format!("installed at (unix): {}", state.installed_at),
        format!(
            "managed: {} file(s), {} dir(s)",
            state.managed_state.files.len(),
            state.managed_state.dirs.len()
        ),
        format!("agents: {}", paths.agents_dir.display()),
        format!("settings: {}", state.json_edits.settings.file.display()),
        format!("mcp config: {}", state.json_edits.mcp.file.display()),
    ]
}

fn resolve_paths() -> Result<InstallPaths> {
    let home = home_dir()?;
    Ok(resolve_install_paths(&home, &PathOverrides::from_env()))
}

fn home_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        let profile = std::env::var("USERPROFILE")
            .context("USERPROFILE is not set; cannot resolve home directory")?;
        return Ok(PathBuf::from(profile));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve home directory")?;
    Ok(PathBuf::from(home))
}

fn build_orchestrator(repo: String) -> Result<Orchestrator> {
    Ok(Orchestrator {
        http: Box::new(ReqwestFetcher::new()?),
        attestation: Box::new(GhCliVerifier::new(repo.clone())),
        clock: Box::new(SystemClock),
        binaries: Box::new(FsBinaryInstaller),
        repo,
    })
}
