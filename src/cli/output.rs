//! Terminal rendering of pipeline events.
//!
//! Styled text with a progress bar when stderr is a terminal, plain lines
//! otherwise, or one JSON object per line with `--json`.

use console::{StyledObject, Term, style};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

use crate::error::Result;
use crate::metadata::MetadataRecord;
use crate::pipeline::{LogEntry, Outcome, PipelineEvent, Severity, Stage};

fn bright_green(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

fn bright_red(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

fn cyan(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

fn dim(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// Final line of `--json` output.
#[derive(Serialize)]
struct JsonOutcome<'a> {
    outcome: &'a Outcome,
}

/// Renders events as they arrive.
pub struct OutputManager {
    json: bool,
    bar: Option<ProgressBar>,
}

impl OutputManager {
    pub fn new(json: bool) -> Self {
        let bar = (!json && Term::stderr().is_term()).then(create_bar);
        Self { json, bar }
    }

    /// Prints one event.
    pub fn event(&self, event: &PipelineEvent) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(event.progress));
            bar.set_message(stage_label(event.stage).to_string());
        }
        if let Some(entry) = &event.entry {
            self.entry(entry);
        }
        Ok(())
    }

    fn entry(&self, entry: &LogEntry) {
        let line = match entry.severity {
            Severity::Info => format!("{} {}", cyan("==>"), entry.text),
            Severity::Detail => indent(&entry.text),
            Severity::Error => format!("{} {}", bright_red("error:"), entry.text),
        };

        match (&self.bar, entry.severity) {
            (Some(bar), _) => bar.println(line),
            (None, Severity::Error) => eprintln!("{}", line),
            (None, _) => println!("{}", line),
        }
    }

    /// Prints the end result of a run.
    pub fn outcome(&self, outcome: &Outcome) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&JsonOutcome { outcome })?);
            return Ok(());
        }

        match outcome {
            Outcome::Complete { output_dir, artifact } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(bright_green("complete ✓").to_string());
                }
                println!("{} {}", bright_green("Output:"), output_dir.display());
                if let Some(artifact) = artifact {
                    println!("{} {}", dim("sha256:"), artifact.sha256);
                }
            }
            Outcome::Failed(failure) => {
                if let Some(bar) = &self.bar {
                    bar.abandon_with_message(
                        bright_red(format!("{} failed", failure.stage)).to_string(),
                    );
                }
                eprintln!(
                    "{} {:?} during {}",
                    bright_red("Release failed:"),
                    failure.kind,
                    failure.stage
                );
            }
        }
        Ok(())
    }

    /// Prints the version metadata found in a project.
    pub fn metadata(&self, record: &MetadataRecord) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{} {}", cyan("CFBundleShortVersionString:"), record.short_version);
            println!("{} {}", cyan("CFBundleVersion:"), record.build_number);
        }
        Ok(())
    }
}

fn create_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

fn stage_label(stage: Stage) -> StyledObject<String> {
    match stage {
        Stage::Complete => bright_green(stage),
        Stage::Failed => bright_red(stage),
        _ => style(stage.to_string()).bright().yellow(),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", dim(line)))
        .collect::<Vec<_>>()
        .join("\n")
}
