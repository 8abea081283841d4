use clap::CommandFactory;
use clap_complete::Shell;

pub fn write_completions(shell: Shell) {
    let mut command = crate::Cli::command();
    clap_complete::generate(shell, &mut command, "agentpack", &mut std::io::stdout());
}
