//! Release tooling for Xcode projects.
//!
//! This library stamps a version and build number into a project's Info.plist,
//! builds it with `xcodebuild` and optionally packages the app into a disk image
//! with `hdiutil`, reporting progress as a stream of events.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod session;

// Re-export commonly used types
pub use error::{CliError, Result, UnleashError};
pub use metadata::{MetadataRecord, MetadataStore};
pub use pipeline::{BuildPipeline, BuildRequest, Outcome, PipelineEvent, Stage};
pub use session::{InputEvent, Session, SessionResponse};
