//! Error types for pipeline stages.
//!
//! Every stage returns [`Result`]; the orchestrator converts the error into a
//! [`FailureKind`](super::FailureKind) and an `Error`-severity log entry so that
//! nothing escapes a run as an unhandled fault.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::request::ValidationError;
use super::process::RunnerError;
use crate::metadata::MetadataError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while running a pipeline stage
#[derive(Error, Debug)]
pub enum Error {
    /// The build request failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reading or writing the Info.plist failed
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// An external tool could not be launched or awaited
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// An external tool exited unsuccessfully under the strict exit-code policy
    #[error("{program} exited with {}", describe_exit(.code))]
    ToolFailed {
        /// Tool that failed
        program: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// Filesystem operation failed
    #[error("{context} {}: {source}", .path.display())]
    Fs {
        /// What was being attempted
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled by the caller
    #[error("run cancelled")]
    Cancelled,

    /// Anything else
    #[error("{0}")]
    GenericError(String),
}

pub(crate) fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Attaches path context to IO results.
pub trait ErrorExt<T> {
    /// Wraps an IO error with a description of the operation and the path.
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Attaches a lazily built message to any displayable error.
pub trait Context<T> {
    /// Converts the error into [`Error::GenericError`] prefixed with `f()`.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::GenericError(format!("{}: {}", f(), e)))
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::pipeline::Error::GenericError(format!($($arg)*)))
    };
}
