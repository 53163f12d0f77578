//! Stages, log entries and the events a run emits.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a run in the pipeline state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Idle,
    ValidatingInput,
    UpdatingMetadata,
    Building,
    Packaging,
    Complete,
    Failed,
}

impl Stage {
    /// Progress announced when the stage starts.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Stage::Idle | Stage::ValidatingInput => 0,
            Stage::UpdatingMetadata => 10,
            Stage::Building => 30,
            Stage::Packaging => 70,
            Stage::Complete => 100,
            // Failing never moves the bar.
            Stage::Failed => 0,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ValidatingInput => "validating input",
            Stage::UpdatingMetadata => "updating metadata",
            Stage::Building => "building",
            Stage::Packaging => "packaging",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How prominently a log entry should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Stage announcements
    Info,
    /// Tool transcripts and secondary details
    Detail,
    /// Anything that failed
    Error,
}

/// One line of the run transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub text: String,
}

impl LogEntry {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            text: text.into(),
        }
    }
}

/// Emitted on every stage change and every appended log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub stage: Stage,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<LogEntry>,
}

/// Failure categories a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    ValidationError,
    MetadataReadError,
    MetadataWriteError,
    LaunchError,
    ToolExecutionFailure,
    /// Preparing the output directory or an artifact failed
    FilesystemError,
    Cancelled,
}

/// Why a run ended in [`Stage::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Stage that was running when the failure happened
    pub stage: Stage,
    pub kind: FailureKind,
    /// Last entry appended to the log, always an `Error` entry
    pub last_entry: LogEntry,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.last_entry.text)
    }
}

/// Produced disk image or app bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Complete {
        /// Directory the caller may reveal to the user
        output_dir: PathBuf,
        /// Disk image when packaging ran, otherwise the app bundle if present
        artifact: Option<Artifact>,
    },
    Failed(Failure),
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete { .. })
    }

    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            Outcome::Complete { output_dir, .. } => Some(output_dir),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            Outcome::Complete { .. } => None,
        }
    }
}

/// Read-only copy of a run's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub stage: Stage,
    pub progress: u8,
    pub log: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_rise_through_the_happy_path() {
        let path = [
            Stage::ValidatingInput,
            Stage::UpdatingMetadata,
            Stage::Building,
            Stage::Packaging,
            Stage::Complete,
        ];
        assert!(path.windows(2).all(|w| w[0].checkpoint() <= w[1].checkpoint()));
        assert_eq!(Stage::Complete.checkpoint(), 100);
    }

    #[test]
    fn events_serialize_without_empty_entry() {
        let event = PipelineEvent {
            stage: Stage::Building,
            progress: 30,
            entry: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"stage":"Building","progress":30}"#);
    }
}
