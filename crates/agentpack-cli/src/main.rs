use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

mod completion;
mod dispatch;
mod render;

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(name = "agentpack")]
#[command(about = "Installs and maintains the agentpack tool bundle", long_about = None)]
struct Cli {
    /// Release repository in owner/name form.
    #[arg(long, global = true)]
    repo: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the latest bundle release.
    Install,
    /// Refresh an existing installation to the latest release.
    Update,
    /// Remove the bundle and revert the host configuration.
    Uninstall,
    /// Show what is currently installed.
    Status,
    /// Emit shell completions.
    Completions { shell: Shell },
}

fn main() -> Result<()> {
    dispatch::run_cli(Cli::parse())
}
