//! Immutable build request and the paths derived from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::{self, BUILD_HINT, VERSION_HINT};

/// Project file extension accepted by xcodebuild `-project`.
pub const PROJECT_EXTENSION: &str = "xcodeproj";

/// Workspace file extension accepted by xcodebuild `-workspace`.
pub const WORKSPACE_EXTENSION: &str = "xcworkspace";

/// Directory, next to the project, that receives build products.
pub const BUILDS_DIR: &str = "Builds";

/// Build variant passed to `-configuration`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Configuration {
    Debug,
    #[default]
    Release,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "Debug",
            Configuration::Release => "Release",
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Configuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Configuration::Debug),
            "release" => Ok(Configuration::Release),
            other => Err(format!("unknown configuration '{other}' (expected Debug or Release)")),
        }
    }
}

/// Kind of Xcode container, derived from the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Project,
    Workspace,
}

impl ProjectKind {
    /// Classifies `path` by extension, `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            PROJECT_EXTENSION => Some(ProjectKind::Project),
            WORKSPACE_EXTENSION => Some(ProjectKind::Workspace),
            _ => None,
        }
    }

    /// xcodebuild flag selecting this container kind.
    pub fn flag(&self) -> &'static str {
        match self {
            ProjectKind::Project => "-project",
            ProjectKind::Workspace => "-workspace",
        }
    }
}

/// Reasons a [`BuildRequest`] is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project path does not exist: {}", .0.display())]
    MissingProject(PathBuf),

    #[error(
        "not an Xcode project or workspace (expected .xcodeproj or .xcworkspace): {}",
        .0.display()
    )]
    UnsupportedProject(PathBuf),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid build number '{0}'")]
    InvalidBuild(String),

    #[error("invalid image name '{0}'")]
    InvalidImageName(String),
}

impl ValidationError {
    /// Constraint text shown alongside the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ValidationError::InvalidVersion(_) => Some(VERSION_HINT),
            ValidationError::InvalidBuild(_) => Some(BUILD_HINT),
            ValidationError::InvalidImageName(_) => {
                Some("image names must not be empty or contain '/'")
            }
            _ => None,
        }
    }
}

/// Everything one pipeline run needs.
///
/// Fields are private: changing any input means building a new request, which
/// the pipeline validates again before doing any work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    project_path: PathBuf,
    version: String,
    build: String,
    configuration: Configuration,
    package_as_image: bool,
    image_name: Option<String>,
}

impl BuildRequest {
    pub fn new(
        project_path: impl Into<PathBuf>,
        version: impl Into<String>,
        build: impl Into<String>,
        configuration: Configuration,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            version: version.into(),
            build: build.into(),
            configuration,
            package_as_image: false,
            image_name: None,
        }
    }

    /// Requests a disk image after the build, optionally with a volume name.
    pub fn with_disk_image(mut self, image_name: Option<String>) -> Self {
        self.package_as_image = true;
        self.image_name = image_name;
        self
    }

    /// Checks the project path, version and build number.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.project_path.exists() {
            return Err(ValidationError::MissingProject(self.project_path.clone()));
        }
        if ProjectKind::from_path(&self.project_path).is_none() || self.project_name().is_empty() {
            return Err(ValidationError::UnsupportedProject(self.project_path.clone()));
        }
        if !version::validate_version(&self.version) {
            return Err(ValidationError::InvalidVersion(self.version.clone()));
        }
        if !version::validate_build(&self.build) {
            return Err(ValidationError::InvalidBuild(self.build.clone()));
        }
        if let Some(name) = &self.image_name {
            if name.trim().is_empty() || name.contains('/') {
                return Err(ValidationError::InvalidImageName(name.clone()));
            }
        }
        Ok(())
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    pub fn configuration(&self) -> Configuration {
        self.configuration
    }

    pub fn package_as_image(&self) -> bool {
        self.package_as_image
    }

    pub fn is_workspace(&self) -> bool {
        ProjectKind::from_path(&self.project_path) == Some(ProjectKind::Workspace)
    }

    pub fn kind(&self) -> ProjectKind {
        if self.is_workspace() {
            ProjectKind::Workspace
        } else {
            ProjectKind::Project
        }
    }

    /// Project name, used as scheme, app name and plist directory.
    pub fn project_name(&self) -> &str {
        self.project_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Volume name for the disk image.
    pub fn volume_name(&self) -> &str {
        self.image_name.as_deref().unwrap_or(self.project_name())
    }

    /// Directory containing the project or workspace.
    pub fn project_dir(&self) -> &Path {
        self.project_path.parent().unwrap_or(Path::new("."))
    }

    /// `<projectDir>/<projectName>/Info.plist`
    pub fn info_plist_path(&self) -> PathBuf {
        info_plist_path(&self.project_path)
    }

    /// SYMROOT passed to xcodebuild: `<projectDir>/Builds/<version>-<build>`.
    pub fn symroot(&self) -> PathBuf {
        self.project_dir()
            .join(BUILDS_DIR)
            .join(format!("{}-{}", self.version, self.build))
    }

    /// Where xcodebuild places products: `<SYMROOT>/<configuration>`.
    pub fn build_dir(&self) -> PathBuf {
        self.symroot().join(self.configuration.as_str())
    }

    /// Built application bundle inside [`Self::build_dir`].
    pub fn app_bundle_path(&self) -> PathBuf {
        self.build_dir().join(format!("{}.app", self.project_name()))
    }

    /// `<projectName>-<version>.<build>-<configuration>.<extension>`
    pub fn image_file_name(&self, extension: &str) -> String {
        format!(
            "{}-{}.{}-{}.{}",
            self.project_name(),
            self.version,
            self.build,
            self.configuration,
            extension
        )
    }
}

/// Info.plist location for a project or workspace path.
pub fn info_plist_path(project_path: &Path) -> PathBuf {
    let name = project_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    project_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(name)
        .join("Info.plist")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_project(ext: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("Demo.{ext}"));
        std::fs::create_dir(&path).unwrap();
        (dir, path)
    }

    #[test]
    fn derives_paths_from_project() {
        let request = BuildRequest::new(
            "/work/Demo/Demo.xcodeproj",
            "1.4.0",
            "231005",
            Configuration::Release,
        );
        assert_eq!(request.project_name(), "Demo");
        assert!(!request.is_workspace());
        assert_eq!(
            request.info_plist_path(),
            PathBuf::from("/work/Demo/Demo/Info.plist")
        );
        assert_eq!(
            request.symroot(),
            PathBuf::from("/work/Demo/Builds/1.4.0-231005")
        );
        assert_eq!(
            request.build_dir(),
            PathBuf::from("/work/Demo/Builds/1.4.0-231005/Release")
        );
        assert_eq!(
            request.app_bundle_path(),
            PathBuf::from("/work/Demo/Builds/1.4.0-231005/Release/Demo.app")
        );
        assert_eq!(
            request.image_file_name("dmg"),
            "Demo-1.4.0.231005-Release.dmg"
        );
    }

    #[test]
    fn workspace_is_detected_from_extension() {
        let request =
            BuildRequest::new("/w/App.xcworkspace", "1.0", "230101", Configuration::Debug);
        assert!(request.is_workspace());
        assert_eq!(request.kind().flag(), "-workspace");
        assert_eq!(request.volume_name(), "App");
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let (_dir, path) = scratch_project(PROJECT_EXTENSION);
        let request = BuildRequest::new(&path, "1.4.0", "231005", Configuration::Release)
            .with_disk_image(Some("Demo Installer".into()));
        assert_eq!(request.validate(), Ok(()));
        assert_eq!(request.volume_name(), "Demo Installer");
    }

    #[test]
    fn validate_reports_first_problem() {
        let (_dir, path) = scratch_project(PROJECT_EXTENSION);

        let bad_version = BuildRequest::new(&path, "1", "231005", Configuration::Release);
        assert_eq!(
            bad_version.validate(),
            Err(ValidationError::InvalidVersion("1".into()))
        );
        assert_eq!(
            bad_version.validate().unwrap_err().hint(),
            Some(VERSION_HINT)
        );

        let bad_build = BuildRequest::new(&path, "1.4", "23100", Configuration::Release);
        assert_eq!(
            bad_build.validate(),
            Err(ValidationError::InvalidBuild("23100".into()))
        );
    }

    #[test]
    fn validate_rejects_missing_or_foreign_paths() {
        let (dir, _path) = scratch_project("sln");
        let foreign = BuildRequest::new(
            dir.path().join("Demo.sln"),
            "1.0",
            "230101",
            Configuration::Debug,
        );
        assert!(matches!(
            foreign.validate(),
            Err(ValidationError::UnsupportedProject(_))
        ));

        let missing = BuildRequest::new(
            dir.path().join("Nope.xcodeproj"),
            "1.0",
            "230101",
            Configuration::Debug,
        );
        assert!(matches!(
            missing.validate(),
            Err(ValidationError::MissingProject(_))
        ));
    }

    #[test]
    fn configuration_parses_case_insensitively() {
        assert_eq!("debug".parse::<Configuration>(), Ok(Configuration::Debug));
        assert_eq!("Release".parse::<Configuration>(), Ok(Configuration::Release));
        assert!("profile".parse::<Configuration>().is_err());
    }
}
