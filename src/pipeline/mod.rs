//! Release pipeline for Xcode projects.
//!
//! This module takes a project or workspace from "source + version" to a built
//! app and, optionally, a compressed disk image:
//!
//! - [`version`] - version and build-number validation
//! - [`request`] - the immutable [`BuildRequest`] and its derived paths
//! - [`process`] - the [`ProcessRunner`] seam and its tokio implementation
//! - [`tools`] - xcodebuild / hdiutil discovery and command lines
//! - [`settings`] - [`PipelineSettings`] and its builder
//! - [`events`] - stages, log entries, events and outcomes
//! - [`orchestrator`] - the [`BuildPipeline`] state machine
//!
//! Info.plist access lives in [`crate::metadata`].

pub mod checksum;
pub mod error;
pub mod events;
mod fs;
pub mod orchestrator;
pub mod process;
pub mod request;
pub mod settings;
pub mod tools;
pub mod version;

pub use error::{Context, Error, ErrorExt, Result};
pub use events::{
    Artifact, Failure, FailureKind, LogEntry, Outcome, PipelineEvent, RunSnapshot, Severity, Stage,
};
pub use orchestrator::{BuildPipeline, PipelineHandle, RunReport};
pub use process::{Invocation, ProcessOutput, ProcessRunner, RunnerError, TokioProcessRunner};
pub use request::{BuildRequest, Configuration, ProjectKind, ValidationError};
pub use settings::{ExitCodePolicy, PipelineSettings, SettingsBuilder};
pub use version::{BuildStamp, validate_build, validate_version};
