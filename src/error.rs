//! Crate-level error types.
//!
//! Pipeline stages have their own [`crate::pipeline::Error`]; those never reach
//! the caller as errors because a run always ends in an outcome. The types here
//! cover everything around a run: arguments, configuration and terminal output.

use thiserror::Error;

/// Result type alias for CLI and configuration operations
pub type Result<T> = std::result::Result<T, UnleashError>;

/// Main error type outside the pipeline
#[derive(Error, Debug)]
pub enum UnleashError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Pipeline task errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::Error),

    /// Info.plist errors outside a run
    #[error("Metadata error: {0}")]
    Metadata(#[from] crate::metadata::MetadataError),

    /// Ad-hoc errors with context attached at the CLI edge
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn anyhow_context_keeps_the_cause() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("cwd removed"));
        let err: UnleashError = result
            .context("resolving project path Demo.xcodeproj")
            .unwrap_err()
            .into();
        assert_eq!(
            err.to_string(),
            "resolving project path Demo.xcodeproj: cwd removed"
        );
    }

    #[test]
    fn invalid_arguments_name_the_reason() {
        let err = UnleashError::from(CliError::InvalidArguments {
            reason: "--show-metadata cannot be combined with build options".into(),
        });
        assert!(err.to_string().contains("--show-metadata"));
    }
}
