//! Optional `unleash.toml` configuration.
//!
//! ```toml
//! exit_code_policy = "strict"
//! xcodebuild = "/Applications/Xcode-15.app/Contents/Developer/usr/bin/xcodebuild"
//! hdiutil = "/usr/bin/hdiutil"
//! image_format = "UDBZ"
//! image_extension = "dmg"
//! quiet = false
//! ```
//!
//! Every key is optional. Command-line flags win over the file, and the file
//! wins over built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CliError, Result, UnleashError};
use crate::pipeline::{ExitCodePolicy, SettingsBuilder};

/// File name looked up next to the project when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "unleash.toml";

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub exit_code_policy: Option<ExitCodePolicy>,
    #[serde(default)]
    pub xcodebuild: Option<PathBuf>,
    #[serde(default)]
    pub hdiutil: Option<PathBuf>,
    #[serde(default)]
    pub image_format: Option<String>,
    #[serde(default)]
    pub image_extension: Option<String>,
    #[serde(default)]
    pub quiet: Option<bool>,
}

impl ConfigFile {
    /// Parses a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            UnleashError::Cli(CliError::ExecutionFailed {
                command: "read_config".to_string(),
                reason: format!("Failed to read {}: {}", path.display(), e),
            })
        })?;
        let config: ConfigFile = toml::from_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given, else `unleash.toml` in `project_dir` if it
    /// exists, else the empty configuration.
    pub fn discover(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies the values present in the file onto `builder`.
    pub fn apply(&self, mut builder: SettingsBuilder) -> SettingsBuilder {
        if let Some(policy) = self.exit_code_policy {
            builder = builder.exit_code_policy(policy);
        }
        if let Some(path) = &self.xcodebuild {
            builder = builder.xcodebuild(path);
        }
        if let Some(path) = &self.hdiutil {
            builder = builder.hdiutil(path);
        }
        if let Some(format) = &self.image_format {
            builder = builder.image_format(format.clone());
        }
        if let Some(extension) = &self.image_extension {
            builder = builder.image_extension(extension.clone());
        }
        if let Some(quiet) = self.quiet {
            builder = builder.quiet(quiet);
        }
        builder
    }
}
