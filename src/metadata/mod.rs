//! Version metadata stored in a project's Info.plist.
//!
//! Only two keys are interpreted (`CFBundleShortVersionString` and
//! `CFBundleVersion`); every other key is carried through a write untouched and
//! in its original order. Writes are read-merge-write and land atomically: the
//! new document is written to a temporary file in the same directory and renamed
//! over the old one, so a failure leaves the previous file intact.
//!
//! The store assumes a single writer per path. Two concurrent writers to the
//! same plist can lose one update; callers serialize runs per project.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marketing version key.
pub const SHORT_VERSION_KEY: &str = "CFBundleShortVersionString";

/// Build number key.
pub const BUILD_NUMBER_KEY: &str = "CFBundleVersion";

const BINARY_MAGIC: &[u8] = b"bplist";

/// The two version fields the pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// `CFBundleShortVersionString`
    pub short_version: String,
    /// `CFBundleVersion`
    pub build_number: String,
}

impl MetadataRecord {
    pub fn new(short_version: impl Into<String>, build_number: impl Into<String>) -> Self {
        Self {
            short_version: short_version.into(),
            build_number: build_number.into(),
        }
    }
}

impl std::fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.short_version, self.build_number)
    }
}

/// Info.plist read/write failures
#[derive(Error, Debug)]
pub enum MetadataError {
    /// No file at the path
    #[error("Info.plist not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a property list
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    /// The root of the property list is not a dictionary
    #[error("{} does not contain a dictionary", .0.display())]
    NotADictionary(PathBuf),

    /// A version key is absent or not a string
    #[error("{} has no string value for {key}", .path.display())]
    MissingKey { path: PathBuf, key: &'static str },

    /// Serializing or replacing the file failed
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MetadataError {
    /// `true` for failures that happened while writing.
    pub fn is_write(&self) -> bool {
        matches!(self, MetadataError::Write { .. })
    }
}

/// On-disk encoding of a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    Xml,
    Binary,
}

/// A parsed Info.plist together with the encoding it was read in.
#[derive(Debug, Clone)]
struct PlistDocument {
    entries: plist::Dictionary,
    format: PlistFormat,
}

impl PlistDocument {
    fn empty() -> Self {
        Self {
            entries: plist::Dictionary::new(),
            format: PlistFormat::Xml,
        }
    }

    fn load(path: &Path) -> Result<Self, MetadataError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MetadataError::NotFound(path.to_path_buf())
            } else {
                MetadataError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let format = if bytes.starts_with(BINARY_MAGIC) {
            PlistFormat::Binary
        } else {
            PlistFormat::Xml
        };

        let value = plist::Value::from_reader(Cursor::new(bytes)).map_err(|source| {
            MetadataError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let entries = value
            .into_dictionary()
            .ok_or_else(|| MetadataError::NotADictionary(path.to_path_buf()))?;

        Ok(Self { entries, format })
    }

    fn string(&self, path: &Path, key: &'static str) -> Result<String, MetadataError> {
        self.entries
            .get(key)
            .and_then(|v| v.as_string())
            .map(String::from)
            .ok_or_else(|| MetadataError::MissingKey {
                path: path.to_path_buf(),
                key,
            })
    }

    fn record(&self, path: &Path) -> Result<MetadataRecord, MetadataError> {
        Ok(MetadataRecord {
            short_version: self.string(path, SHORT_VERSION_KEY)?,
            build_number: self.string(path, BUILD_NUMBER_KEY)?,
        })
    }

    fn apply(&mut self, record: &MetadataRecord) {
        self.entries.insert(
            SHORT_VERSION_KEY.to_string(),
            plist::Value::String(record.short_version.clone()),
        );
        self.entries.insert(
            BUILD_NUMBER_KEY.to_string(),
            plist::Value::String(record.build_number.clone()),
        );
    }

    fn encode(&self) -> Result<Vec<u8>, plist::Error> {
        let value = plist::Value::Dictionary(self.entries.clone());
        let mut buf = Vec::new();
        match self.format {
            PlistFormat::Xml => value.to_writer_xml(&mut buf)?,
            PlistFormat::Binary => value.to_writer_binary(&mut buf)?,
        }
        Ok(buf)
    }

    /// Writes to a sibling temp file and renames it over `path`.
    fn persist(&self, path: &Path) -> Result<(), MetadataError> {
        let write_err = |source: std::io::Error| MetadataError::Write {
            path: path.to_path_buf(),
            source,
        };

        let bytes = self
            .encode()
            .map_err(|e| write_err(std::io::Error::other(e.to_string())))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = tempfile::Builder::new()
            .prefix(".Info.plist.")
            .tempfile_in(dir)
            .map_err(write_err)?;
        staged.write_all(&bytes).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;

        // Keep the mode of the file being replaced; temp files are created 0600.
        if let Ok(existing) = std::fs::metadata(path) {
            std::fs::set_permissions(staged.path(), existing.permissions()).map_err(write_err)?;
        }

        staged.persist(path).map_err(|e| write_err(e.error))?;
        log::debug!("Replaced {}", path.display());
        Ok(())
    }
}

/// Reads and atomically updates Info.plist version metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataStore;

impl MetadataStore {
    pub fn new() -> Self {
        Self
    }

    /// Reads the version fields from `path`.
    pub fn read(&self, path: &Path) -> Result<MetadataRecord, MetadataError> {
        PlistDocument::load(path)?.record(path)
    }

    /// Merges `record` into the plist at `path`, creating it when absent.
    pub fn write(&self, path: &Path, record: &MetadataRecord) -> Result<(), MetadataError> {
        self.update(path, record).map(|_| ())
    }

    /// Like [`Self::write`], returning the version fields that were replaced
    /// when the existing file carried both of them.
    pub fn update(
        &self,
        path: &Path,
        record: &MetadataRecord,
    ) -> Result<Option<MetadataRecord>, MetadataError> {
        let mut document = match PlistDocument::load(path) {
            Ok(document) => document,
            Err(MetadataError::NotFound(_)) => PlistDocument::empty(),
            Err(e) => return Err(e),
        };
        let previous = document.record(path).ok();
        document.apply(record);
        document.persist(path)?;
        Ok(previous)
    }
}
