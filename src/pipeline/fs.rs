//! Small idempotent filesystem helpers used around packaging.

use std::io;
use std::path::Path;

use tokio::fs;

use super::error::{ErrorExt, Result};

/// Creates `path` and its parents; succeeds if it already exists.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the file at `path`, returning whether something was removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).fs_context("removing stale file", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn helpers_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Builds/1.0-230101/Release");
        create_dir_all(&nested).await.unwrap();
        create_dir_all(&nested).await.unwrap();

        let image = nested.join("Demo.dmg");
        std::fs::write(&image, b"old").unwrap();
        assert!(remove_file_if_exists(&image).await.unwrap());
        assert!(!remove_file_if_exists(&image).await.unwrap());
    }
}
