//! Artifact size and SHA-256.
//!
//! Disk images are hashed as a single file. App bundles are directories, so their
//! files are hashed in sorted path order with each relative path mixed in ahead
//! of the contents, which makes the digest independent of directory iteration
//! order.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use super::error::{ErrorExt, Result};
use super::events::Artifact;
use crate::bail;

/// Size in bytes and hex SHA-256 of a file or directory tree.
pub async fn describe_artifact(path: &Path) -> Result<Artifact> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;

    let (size, sha256) = if metadata.is_file() {
        (metadata.len(), file_sha256(path).await?)
    } else if metadata.is_dir() {
        directory_sha256(path).await?
    } else {
        bail!("Artifact is neither file nor directory: {}", path.display())
    };

    Ok(Artifact {
        path: path.to_path_buf(),
        size,
        sha256,
    })
}

async fn file_sha256(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_into(&mut hasher, path).await?;
    Ok(format!("{:x}", hasher.finalize()))
}

async fn directory_sha256(dir: &Path) -> Result<(u64, String)> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    for entry in entries {
        if let Ok(rel_path) = entry.path().strip_prefix(dir) {
            hasher.update(rel_path.to_string_lossy().as_bytes());
        }
        size += hash_into(&mut hasher, entry.path()).await?;
    }

    Ok((size, format!("{:x}", hasher.finalize())))
}

/// Streams `path` into `hasher` in 8 KiB chunks, returning the byte count.
async fn hash_into(hasher: &mut Sha256, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut buffer = vec![0u8; 8192];
    let mut total = 0u64;

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Demo.dmg");
        std::fs::write(&path, b"abc").unwrap();

        let artifact = describe_artifact(&path).await.unwrap();
        assert_eq!(artifact.size, 3);
        assert_eq!(
            artifact.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn directory_digest_depends_on_layout() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("Demo.app");
        std::fs::create_dir_all(app.join("Contents/MacOS")).unwrap();
        std::fs::write(app.join("Contents/Info.plist"), b"plist").unwrap();
        std::fs::write(app.join("Contents/MacOS/Demo"), b"binary").unwrap();

        let first = describe_artifact(&app).await.unwrap();
        assert_eq!(first.size, 11);

        std::fs::rename(app.join("Contents/MacOS/Demo"), app.join("Contents/MacOS/Other")).unwrap();
        let second = describe_artifact(&app).await.unwrap();
        assert_eq!(second.size, 11);
        assert_ne!(first.sha256, second.sha256);
    }

    #[tokio::test]
    async fn missing_path_names_the_operation() {
        let err = describe_artifact(Path::new("/no/such/artifact.dmg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reading artifact metadata"));
    }
}
