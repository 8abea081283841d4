use std::io::IsTerminal;
use std::time::Duration;

use agentpack_installer::ProgressSink;
use anstyle::{AnsiColor, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn colorize(style: Style, text: &str) -> String {
    format!("{style}{text}{style:#}")
}

fn status_style() -> Style {
    Style::new().bold().fg_color(Some(AnsiColor::Green.into()))
}

fn warn_style() -> Style {
    Style::new().bold().fg_color(Some(AnsiColor::Yellow.into()))
}

fn error_style() -> Style {
    Style::new().bold().fg_color(Some(AnsiColor::Red.into()))
}

#[derive(Copy, Clone, Debug)]
pub struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub fn print_status(&self, message: &str) {
        match self.style {
            OutputStyle::Plain => println!("{message}"),
            OutputStyle::Rich => println!("{} {message}", colorize(status_style(), "==>")),
        }
    }

    pub fn print_warning(&self, message: &str) {
        match self.style {
            OutputStyle::Plain => eprintln!("warning: {message}"),
            OutputStyle::Rich => {
                eprintln!("{} {message}", colorize(warn_style(), "warning:"));
            }
        }
    }

    pub fn print_error(&self, message: &str) {
        match self.style {
            OutputStyle::Plain => eprintln!("error: {message}"),
            OutputStyle::Rich => eprintln!("{} {message}", colorize(error_style(), "error:")),
        }
    }
}

/// Shows the orchestrator's phase labels either as a live spinner or as
/// plain lines when stdout is not a terminal.
pub struct PhaseProgress {
    spinner: Option<ProgressBar>,
}

impl PhaseProgress {
    pub fn new(style: OutputStyle) -> Self {
        let spinner = match style {
            OutputStyle::Plain => None,
            OutputStyle::Rich => {
                let bar = ProgressBar::new_spinner();
                if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                    bar.set_style(template);
                }
                bar.enable_steady_tick(Duration::from_millis(80));
                Some(bar)
            }
        };
        Self { spinner }
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for PhaseProgress {
    fn phase(&mut self, label: &str) {
        match &self.spinner {
            Some(bar) => bar.set_message(label.to_string()),
            None => println!("{label}"),
        }
    }
}

impl Drop for PhaseProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
