use std::io::IsTerminal;

use anstyle::{AnsiColor, Style};
use indicatif::{ProgressBar, ProgressStyle};
use instill_core::ProgressMonitor;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn status_style() -> Style {
    Style::new().bold().fg_color(Some(AnsiColor::Green.into()))
}

fn warn_style() -> Style {
    Style::new().bold().fg_color(Some(AnsiColor::Yellow.into()))
}

pub fn print_status(status: &str, message: &str) {
    match current_output_style() {
        OutputStyle::Plain => println!("{status}: {message}"),
        OutputStyle::Rich => {
            let style = status_style();
            println!("{style}{status}{style:#} {message}");
        }
    }
}

pub fn print_warning(message: &str) {
    match current_output_style() {
        OutputStyle::Plain => eprintln!("warning: {message}"),
        OutputStyle::Rich => {
            let style = warn_style();
            eprintln!("{style}warning{style:#} {message}");
        }
    }
}

/// Progress monitor backed by an indicatif bar on interactive terminals,
/// falling back to plain line output otherwise.
pub struct TerminalProgress {
    style: OutputStyle,
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            style: current_output_style(),
            bar: None,
        }
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressMonitor for TerminalProgress {
    fn begin_task(&mut self, name: &str, total: u32) {
        if self.style == OutputStyle::Rich {
            let bar = ProgressBar::new(u64::from(total.max(1)));
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<24} [{bar:24.cyan/blue}] {pos:>4}/{len:4}",
            ) {
                bar.set_style(template);
            }
            bar.set_message(name.to_string());
            self.bar = Some(bar);
        } else {
            println!("{name}");
        }
    }

    fn set_task(&mut self, name: &str) {
        match &self.bar {
            Some(bar) => bar.set_message(name.to_string()),
            None => println!("  {name}"),
        }
    }

    fn worked(&mut self, weight: u32) {
        if let Some(bar) = &self.bar {
            bar.inc(u64::from(weight));
        }
    }
}
