//! External tool discovery and command lines.
//!
//! xcodebuild and hdiutil ship with macOS under `/usr/bin`. They are looked up on
//! `PATH` first so that `xcode-select` shims or wrappers win, falling back to the
//! stock location. A missing tool is not an error here: the launch itself fails
//! later and the run reports a launch error for the stage that needed it.

use std::path::{Path, PathBuf};

use super::process::Invocation;
use super::request::BuildRequest;
use super::settings::PipelineSettings;

/// Xcode command line build tool.
pub const XCODEBUILD: &str = "xcodebuild";

/// macOS disk image tool.
pub const HDIUTIL: &str = "hdiutil";

/// Finder reveal helper.
pub const OPEN: &str = "open";

/// Resolves `name` on `PATH`, falling back to `/usr/bin/<name>`.
pub fn resolve_tool(name: &str) -> PathBuf {
    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            path
        }
        Err(e) => {
            let fallback = Path::new("/usr/bin").join(name);
            log::debug!(
                "{} not found in PATH: {}. Falling back to {}",
                name,
                e,
                fallback.display()
            );
            fallback
        }
    }
}

/// `xcodebuild (-workspace|-project) <path> -scheme <name> -configuration <cfg>
/// SYMROOT=<dir> [-quiet]`
pub fn build_invocation(request: &BuildRequest, settings: &PipelineSettings) -> Invocation {
    let mut invocation = Invocation::new(settings.xcodebuild()).args([
        request.kind().flag().to_string(),
        request.project_path().display().to_string(),
        "-scheme".to_string(),
        request.project_name().to_string(),
        "-configuration".to_string(),
        request.configuration().to_string(),
        format!("SYMROOT={}", request.symroot().display()),
    ]);
    if settings.quiet() {
        invocation = invocation.arg("-quiet");
    }
    invocation
}

/// `hdiutil create -volname <name> -srcfolder <buildDir>/<name>.app -ov -format <fmt> <image>`,
/// run from the build directory.
pub fn package_invocation(request: &BuildRequest, settings: &PipelineSettings) -> Invocation {
    Invocation::new(settings.hdiutil())
        .args([
            "create".to_string(),
            "-volname".to_string(),
            request.volume_name().to_string(),
            "-srcfolder".to_string(),
            request.app_bundle_path().display().to_string(),
            "-ov".to_string(),
            "-format".to_string(),
            settings.image_format().to_string(),
            request.image_file_name(settings.image_extension()),
        ])
        .current_dir(request.build_dir())
}

/// `open <dir>`: shows a directory in Finder.
pub fn reveal_invocation(dir: &Path) -> Invocation {
    Invocation::new(resolve_tool(OPEN)).arg(dir.display().to_string())
}
