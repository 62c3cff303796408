//! Cloud-disk REST client
//!
//! Concrete [`ContentStore`] implementation over a cloud-disk HTTP API. The
//! API shape is the usual two-step one: a metadata endpoint that lists
//! directory entries, and a download endpoint that returns a short-lived
//! `href` which is then fetched for the file bytes.
//!
//! All store paths are rooted under a configurable folder, so the delivery
//! engine works with program-relative paths like `course_a/1_day` while the
//! remote disk sees `disk:/bot/course_a/1_day`.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ContentStore, Entry, EntryKind, StoreError};

/// Configuration for the cloud-disk client
#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// Base URL of the disk REST API
    pub base_url: String,

    /// OAuth token for the disk account
    pub token: String,

    /// Folder on the disk that all paths are rooted under
    pub root_folder: String,

    /// Local directory downloads are saved into
    pub download_dir: PathBuf,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl DiskConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            root_folder: "bot".to_string(),
            download_dir: PathBuf::from("downloads"),
            timeout_secs: 30,
        }
    }

    pub fn with_root_folder(mut self, folder: impl Into<String>) -> Self {
        self.root_folder = folder.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Disk base URL cannot be empty".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Disk base URL must start with http:// or https://".to_string());
        }
        if self.token.is_empty() {
            return Err("Disk API token is empty".to_string());
        }
        Ok(())
    }
}

/// Download-link response from the disk API
#[derive(Debug, Deserialize)]
struct DownloadLink {
    href: String,
}

/// Directory listing response from the disk API
#[derive(Debug, Deserialize)]
struct ResourceMeta {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedItems>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedItems {
    items: Vec<ResourceItem>,
}

#[derive(Debug, Deserialize)]
struct ResourceItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    path: String,
    size: Option<u64>,
}

/// Cloud-disk content store client
pub struct DiskStore {
    config: DiskConfig,
    client: Client,
}

impl DiskStore {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Api` when the configuration is invalid and
    /// `StoreError::Http` when the HTTP client cannot be built.
    pub fn new(config: DiskConfig) -> Result<Self, StoreError> {
        config.validate().map_err(|message| StoreError::Api {
            status: 0,
            message,
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self { config, client })
    }

    /// Normalize a path to the disk's `disk:/<root>/...` form.
    ///
    /// Accepts program-relative paths (`course_a/1_day`), absolute paths
    /// (`/course_a/1_day`) and already-normalized paths; never double-prefixes
    /// the root folder.
    fn normalize_path(&self, path: &str) -> String {
        let root = &self.config.root_folder;

        if path.is_empty() || path == "/" {
            return format!("disk:/{root}");
        }

        let stripped = path
            .strip_prefix("disk:/")
            .or_else(|| path.strip_prefix('/'))
            .unwrap_or(path);

        if stripped == root.as_str() || stripped.starts_with(&format!("{root}/")) {
            return format!("disk:/{stripped}");
        }

        format!("disk:/{root}/{stripped}")
    }

    /// Map a store path to the local download path, preserving the folder
    /// hierarchy so files with equal names in different day folders cannot
    /// collide.
    fn local_path(&self, path: &str) -> PathBuf {
        let normalized = self.normalize_path(path);
        let relative = normalized
            .strip_prefix("disk:/")
            .unwrap_or(&normalized)
            .trim_start_matches('/');
        self.config.download_dir.join(relative)
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.config.token)
    }

    /// Translate an error response into the store error taxonomy.
    async fn error_from_response(path: &str, response: reqwest::Response) -> StoreError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StoreError::NotFound {
                path: path.to_string(),
            };
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());
        StoreError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Fetch the short-lived download URL for a file.
    async fn download_href(&self, path: &str) -> Result<String, StoreError> {
        let normalized = self.normalize_path(path);
        let url = format!("{}/resources/download", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .query(&[("path", normalized.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(path, response).await);
        }

        let link: DownloadLink = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("download link response: {e}")))?;
        Ok(link.href)
    }

    /// Fetch the raw bytes of a file.
    async fn fetch_bytes(&self, path: &str) -> Result<bytes::Bytes, StoreError> {
        let href = self.download_href(path).await?;

        let response = self
            .client
            .get(&href)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(path, response).await);
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl ContentStore for DiskStore {
    async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, StoreError> {
        let normalized = self.normalize_path(path);
        let url = format!("{}/resources", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .query(&[("path", normalized.as_str()), ("limit", "200")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(path, response).await);
        }

        let meta: ResourceMeta = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("listing response: {e}")))?;

        let items = meta.embedded.map(|e| e.items).unwrap_or_default();
        let entries = items
            .into_iter()
            .map(|item| Entry {
                kind: if item.kind == "dir" {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                },
                name: item.name,
                path: item.path,
                size: item.size,
            })
            .collect();

        Ok(entries)
    }

    async fn get_text_content(&self, path: &str) -> Result<String, StoreError> {
        let bytes = self.fetch_bytes(path).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Decode(format!("text file is not valid UTF-8: {e}")))
    }

    async fn download_file(&self, path: &str) -> Result<PathBuf, StoreError> {
        let local = self.local_path(path);

        // Already downloaded on a previous run; large media files make this
        // check worthwhile.
        if local.exists() {
            tracing::debug!(path = %local.display(), "Reusing existing download");
            return Ok(local);
        }

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = self.fetch_bytes(path).await?;
        write_atomic(&local, &bytes).await?;

        tracing::debug!(remote = path, local = %local.display(), "Downloaded file");
        Ok(local)
    }
}

/// Write to a temp file then rename, so a crash mid-download never leaves a
/// truncated artifact that the idempotence check would later trust.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("part");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
