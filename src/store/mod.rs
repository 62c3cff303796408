//! Content store boundary
//!
//! The delivery engine reads day folders from a remote content store. This
//! module defines the store interface and its error classification; the
//! concrete HTTP client lives in [`disk`].
//!
//! The one distinction the engine cares about is "the folder/file does not
//! exist" versus every other failure: missing day folders are expected and
//! silent, anything else is a real error.

pub mod disk;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use disk::{DiskConfig, DiskStore};

/// Errors raised at the content store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested file or folder does not exist
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// The store API rejected or failed the request
    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure while saving a download
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text content could not be decoded
    #[error("Decoding error: {0}")]
    Decode(String),
}

impl StoreError {
    /// True when the failure means the resource simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures worth retrying (timeouts, rate limits, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) => true,
            Self::NotFound { .. } | Self::Decode(_) => false,
        }
    }
}

/// Kind of a listed store entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a store directory listing
#[derive(Debug, Clone)]
pub struct Entry {
    /// Entry name (file name with extension)
    pub name: String,

    /// File or directory
    pub kind: EntryKind,

    /// Full store path of the entry
    pub path: String,

    /// Size in bytes (files only)
    pub size: Option<u64>,
}

impl Entry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Remote content store interface
///
/// `download_file` must be idempotent: when the local artifact for a store
/// path already exists it is returned without re-fetching.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// List the entries of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, StoreError>;

    /// Download a text file and return its content as UTF-8.
    async fn get_text_content(&self, path: &str) -> Result<String, StoreError>;

    /// Download a file to local storage and return the local path.
    async fn download_file(&self, path: &str) -> Result<PathBuf, StoreError>;
}
