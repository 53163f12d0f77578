//! Command line behaviour of the `unleash` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use unleash::metadata::{MetadataRecord, MetadataStore};

fn unleash() -> Command {
    let mut cmd = Command::cargo_bin("unleash").unwrap();
    cmd.env_remove("UNLEASH_APP_VERSION")
        .env_remove("UNLEASH_BUILD_NUMBER")
        .env_remove("UNLEASH_STRICT")
        .env_remove("RUST_LOG");
    cmd
}

/// `<tmp>/Demo.xcodeproj` with `<tmp>/Demo/Info.plist` at 1.0.0 (230101).
fn project() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("Demo.xcodeproj");
    std::fs::create_dir(&project).unwrap();
    std::fs::create_dir(dir.path().join("Demo")).unwrap();
    MetadataStore::new()
        .write(
            &dir.path().join("Demo/Info.plist"),
            &MetadataRecord::new("1.0.0", "230101"),
        )
        .unwrap();
    (dir, project)
}

fn plist(dir: &Path) -> MetadataRecord {
    MetadataStore::new().read(&dir.join("Demo/Info.plist")).unwrap()
}

#[test]
fn invalid_version_exits_with_failure() {
    let (dir, project) = project();

    unleash()
        .arg(&project)
        .args(["--app-version", "1.4.0.0", "--build-number", "231005"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1.4.0.0").and(predicate::str::contains("expected form")));

    assert_eq!(plist(dir.path()), MetadataRecord::new("1.0.0", "230101"));
}

#[test]
fn invalid_build_number_names_the_format() {
    let (_dir, project) = project();

    unleash()
        .arg(&project)
        .args(["-a", "1.4.0", "-b", "23-10-05"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("yymmdd"));
}

#[test]
fn foreign_project_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let solution = dir.path().join("Demo.sln");
    std::fs::write(&solution, b"").unwrap();

    unleash()
        .arg(&solution)
        .args(["-a", "1.4.0", "-b", "231005"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid file format"));
}

#[test]
fn show_metadata_prints_current_values() {
    let (_dir, project) = project();

    unleash()
        .arg(&project)
        .arg("--show-metadata")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0").and(predicate::str::contains("230101")));
}

#[test]
fn show_metadata_as_json() {
    let (_dir, project) = project();

    let output = unleash()
        .arg(&project)
        .args(["--show-metadata", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let record: MetadataRecord = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record, MetadataRecord::new("1.0.0", "230101"));
}

#[test]
fn json_mode_emits_one_object_per_line() {
    let (_dir, project) = project();

    let output = unleash()
        .arg(&project)
        .args(["--json", "-a", "nope", "-b", "231005"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines[0]["stage"], "ValidatingInput");
    let last = lines.last().unwrap();
    assert_eq!(last["outcome"]["Failed"]["kind"], "ValidationError");
}

#[test]
fn unknown_config_keys_are_errors() {
    let (dir, project) = project();
    std::fs::write(dir.path().join("unleash.toml"), "policy = \"strict\"\n").unwrap();

    unleash()
        .arg(&project)
        .args(["-a", "1.4.0", "-b", "231005"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[cfg(unix)]
mod with_fake_xcodebuild {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Points `unleash.toml` at a shell script standing in for xcodebuild.
    fn configure(dir: &Path, exit_code: i32) {
        let script = dir.join("xcodebuild");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"** BUILD OUTPUT ** $*\"\nexit {exit_code}\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(
            dir.join("unleash.toml"),
            format!("xcodebuild = \"{}\"\n", script.display()),
        )
        .unwrap();
    }

    #[test]
    fn completes_and_stamps_the_plist() {
        let (dir, project) = project();
        configure(dir.path(), 0);

        unleash()
            .arg(&project)
            .args(["-a", "1.4.0", "-b", "231005"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("BUILD OUTPUT")
                    .and(predicate::str::contains("-scheme Demo"))
                    .and(predicate::str::contains("Builds/1.4.0-231005/Release")),
            );

        assert_eq!(plist(dir.path()), MetadataRecord::new("1.4.0", "231005"));
    }

    #[test]
    fn failed_build_is_tolerated_unless_strict() {
        let (dir, project) = project();
        configure(dir.path(), 65);

        unleash()
            .arg(&project)
            .args(["-a", "1.4.0", "-b", "231005"])
            .assert()
            .success()
            .stdout(predicate::str::contains("continuing"));

        unleash()
            .arg(&project)
            .args(["-a", "1.4.0", "-b", "231005", "--strict"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("ToolExecutionFailure"));
    }

    #[test]
    fn version_and_build_default_to_plist_values() {
        let (dir, project) = project();
        configure(dir.path(), 0);

        unleash()
            .arg(&project)
            .assert()
            .success()
            .stdout(predicate::str::contains("Builds/1.0.0-230101/Release"));

        assert_eq!(plist(dir.path()), MetadataRecord::new("1.0.0", "230101"));
    }
}
