//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{Configuration, ExitCodePolicy};

/// Version-stamp, build and package an Xcode project
#[derive(Parser, Debug)]
#[command(
    name = "unleash",
    version,
    about = "Version-stamp, build and package an Xcode project",
    long_about = "Writes the version and build number into the project's Info.plist, builds \
the scheme named after the project with xcodebuild, and optionally packages the app into a \
compressed disk image.

Usage:
  unleash MyApp/MyApp.xcodeproj --app-version 1.4.0 --build-number 231005
  unleash MyApp/MyApp.xcworkspace --app-version 1.4 --dmg --image-name \"MyApp Installer\"
  unleash MyApp/MyApp.xcodeproj --show-metadata

Products land in <project dir>/Builds/<version>-<build>/<configuration>.
Exit code 0 = the run completed."
)]
pub struct Args {
    /// Path to the .xcodeproj or .xcworkspace
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Marketing version (CFBundleShortVersionString), e.g. 1.4.0
    ///
    /// Defaults to the value already in the project's Info.plist.
    #[arg(short = 'a', long, value_name = "VERSION", env = "UNLEASH_APP_VERSION")]
    pub app_version: Option<String>,

    /// Build number (CFBundleVersion) in yymmdd form, e.g. 231005
    ///
    /// Defaults to the value in Info.plist, or today's date.
    #[arg(short = 'b', long, value_name = "YYMMDD", env = "UNLEASH_BUILD_NUMBER")]
    pub build_number: Option<String>,

    /// Build configuration: debug or release
    #[arg(short, long, default_value = "release", value_parser = parse_configuration)]
    pub configuration: Configuration,

    /// Package the built app into a disk image
    #[arg(long)]
    pub dmg: bool,

    /// Volume name of the disk image (implies --dmg)
    #[arg(long, value_name = "NAME")]
    pub image_name: Option<String>,

    /// Fail the run when xcodebuild or hdiutil exit non-zero
    #[arg(long, env = "UNLEASH_STRICT")]
    pub strict: bool,

    /// Configuration file (default: unleash.toml next to the project)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print events as JSON lines instead of styled text
    #[arg(long)]
    pub json: bool,

    /// Open the output directory when the run completes
    #[arg(long)]
    pub reveal: bool,

    /// Print the project's current version and build number, then exit
    #[arg(long)]
    pub show_metadata: bool,
}

fn parse_configuration(s: &str) -> Result<Configuration, String> {
    s.parse()
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.project.as_os_str().is_empty() {
            return Err("Project path cannot be empty".to_string());
        }
        if self.show_metadata && (self.dmg || self.image_name.is_some() || self.reveal) {
            return Err("--show-metadata cannot be combined with build options".to_string());
        }
        Ok(())
    }

    /// Whether a disk image was requested
    pub fn wants_disk_image(&self) -> bool {
        self.dmg || self.image_name.is_some()
    }

    /// Exit code policy forced on the command line, if any
    pub fn exit_code_policy(&self) -> Option<ExitCodePolicy> {
        self.strict.then_some(ExitCodePolicy::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "unleash",
            "Demo/Demo.xcodeproj",
            "--app-version",
            "1.4.0",
            "-b",
            "231005",
            "-c",
            "debug",
            "--image-name",
            "Demo Installer",
            "--strict",
        ])
        .unwrap();

        assert_eq!(args.app_version.as_deref(), Some("1.4.0"));
        assert_eq!(args.build_number.as_deref(), Some("231005"));
        assert_eq!(args.configuration, Configuration::Debug);
        assert!(args.wants_disk_image());
        assert_eq!(args.exit_code_policy(), Some(ExitCodePolicy::Strict));
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn defaults_to_release_without_image() {
        let args = Args::try_parse_from(["unleash", "Demo.xcworkspace"]).unwrap();
        assert_eq!(args.configuration, Configuration::Release);
        assert!(!args.wants_disk_image());
        assert_eq!(args.exit_code_policy(), None);
    }

    #[test]
    fn show_metadata_conflicts_with_packaging() {
        let args = Args::try_parse_from(["unleash", "Demo.xcodeproj", "--show-metadata", "--dmg"])
            .unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_unknown_configuration() {
        assert!(Args::try_parse_from(["unleash", "Demo.xcodeproj", "-c", "profile"]).is_err());
    }
}
