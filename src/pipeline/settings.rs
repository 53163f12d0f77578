//! Pipeline settings and their builder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::tools::{self, HDIUTIL, XCODEBUILD};

/// How a non-zero exit from xcodebuild or hdiutil is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCodePolicy {
    /// Log the failure and carry on to the next stage. This matches how the
    /// tool has always behaved: the transcript is the only signal.
    #[default]
    Lenient,
    /// Fail the run with a tool execution failure.
    Strict,
}

impl std::str::FromStr for ExitCodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(ExitCodePolicy::Lenient),
            "strict" => Ok(ExitCodePolicy::Strict),
            other => Err(format!(
                "unknown exit code policy '{other}' (expected lenient or strict)"
            )),
        }
    }
}

/// Resolved configuration for [`BuildPipeline`](super::BuildPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    xcodebuild: PathBuf,
    hdiutil: PathBuf,
    exit_code_policy: ExitCodePolicy,
    image_format: String,
    image_extension: String,
    quiet: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        SettingsBuilder::new().build()
    }
}

impl PipelineSettings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    pub fn xcodebuild(&self) -> &Path {
        &self.xcodebuild
    }

    pub fn hdiutil(&self) -> &Path {
        &self.hdiutil
    }

    pub fn exit_code_policy(&self) -> ExitCodePolicy {
        self.exit_code_policy
    }

    /// hdiutil `-format` value.
    pub fn image_format(&self) -> &str {
        &self.image_format
    }

    /// Disk image file extension, without the dot.
    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }

    /// Whether xcodebuild gets `-quiet`.
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for [`PipelineSettings`].
///
/// Unset tool paths are resolved on `PATH` when [`build`](Self::build) runs.
///
/// ```
/// use unleash::pipeline::{ExitCodePolicy, PipelineSettings};
///
/// let settings = PipelineSettings::builder()
///     .xcodebuild("/Applications/Xcode.app/Contents/Developer/usr/bin/xcodebuild")
///     .exit_code_policy(ExitCodePolicy::Strict)
///     .build();
/// assert_eq!(settings.exit_code_policy(), ExitCodePolicy::Strict);
/// assert_eq!(settings.image_format(), "UDZO");
/// ```
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    xcodebuild: Option<PathBuf>,
    hdiutil: Option<PathBuf>,
    exit_code_policy: Option<ExitCodePolicy>,
    image_format: Option<String>,
    image_extension: Option<String>,
    quiet: Option<bool>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn xcodebuild<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.xcodebuild = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn hdiutil<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.hdiutil = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn exit_code_policy(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_code_policy = Some(policy);
        self
    }

    /// Default: `UDZO`
    pub fn image_format(mut self, format: impl Into<String>) -> Self {
        self.image_format = Some(format.into());
        self
    }

    /// Default: `dmg`
    pub fn image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = Some(extension.into());
        self
    }

    /// Default: `true`
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = Some(quiet);
        self
    }

    /// Fills in defaults for everything not set.
    pub fn build(self) -> PipelineSettings {
        PipelineSettings {
            xcodebuild: self
                .xcodebuild
                .unwrap_or_else(|| tools::resolve_tool(XCODEBUILD)),
            hdiutil: self.hdiutil.unwrap_or_else(|| tools::resolve_tool(HDIUTIL)),
            exit_code_policy: self.exit_code_policy.unwrap_or_default(),
            image_format: self.image_format.unwrap_or_else(|| "UDZO".to_string()),
            image_extension: self
                .image_extension
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|| "dmg".to_string()),
            quiet: self.quiet.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_historic_behaviour() {
        let settings = SettingsBuilder::new()
            .xcodebuild("/usr/bin/xcodebuild")
            .hdiutil("/usr/bin/hdiutil")
            .build();
        assert_eq!(settings.exit_code_policy(), ExitCodePolicy::Lenient);
        assert_eq!(settings.image_format(), "UDZO");
        assert_eq!(settings.image_extension(), "dmg");
        assert!(settings.quiet());
    }

    #[test]
    fn extension_loses_leading_dot() {
        let settings = SettingsBuilder::new().image_extension(".sparseimage").build();
        assert_eq!(settings.image_extension(), "sparseimage");
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("STRICT".parse::<ExitCodePolicy>(), Ok(ExitCodePolicy::Strict));
        assert_eq!("lenient".parse::<ExitCodePolicy>(), Ok(ExitCodePolicy::Lenient));
        assert!("loose".parse::<ExitCodePolicy>().is_err());
    }
}
