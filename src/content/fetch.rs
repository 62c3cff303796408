//! Day folder fetching
//!
//! Pulls one day folder out of the content store and assembles it into a
//! [`ContentPackage`]: the first text file becomes the message body, every
//! other file is downloaded and bucketed by [`FileKind`].
//!
//! A missing day folder is an expected condition, not an error; the fetch
//! outcome keeps the two apart so the delivery loop can skip missing days
//! silently and record everything else.

use std::sync::Arc;

use crate::calendar;
use crate::store::{ContentStore, Entry, StoreError};
use crate::utils::retry::{with_retry_if, RetryConfig};

use super::{ContentPackage, FileKind, MediaItem};

/// Result of fetching one day folder
#[derive(Debug)]
pub enum FetchOutcome {
    /// The folder exists and its content was assembled
    Package(ContentPackage),

    /// The folder does not exist in the store
    NotFound,

    /// The folder exists but fetching its content failed
    Failed(String),
}

/// Assembles day packages from a content store
pub struct ContentFetcher {
    store: Arc<dyn ContentStore>,
    retry: RetryConfig,
}

impl ContentFetcher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch one day folder and assemble its package.
    ///
    /// Transient store failures are retried under the configured budget;
    /// a missing folder is never retried.
    pub async fn fetch_day(&self, folder: &str) -> FetchOutcome {
        let listing = with_retry_if(
            &self.retry,
            || self.store.list_directory(folder),
            StoreError::is_transient,
        )
        .await;
        let entries = match listing {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return FetchOutcome::NotFound,
            Err(e) => return FetchOutcome::Failed(format!("listing {folder}: {e}")),
        };

        let files: Vec<Entry> = entries.into_iter().filter(Entry::is_file).collect();
        if files.is_empty() {
            return FetchOutcome::Failed(format!("day folder {folder} is empty"));
        }

        let mut package = ContentPackage::default();

        for entry in &files {
            let kind = FileKind::from_path(&entry.name);

            if kind == FileKind::Text {
                // Only the first text file becomes the message body.
                if package.text.is_some() {
                    tracing::warn!(file = %entry.name, "Ignoring extra text file");
                    continue;
                }
                let text = with_retry_if(
                    &self.retry,
                    || self.store.get_text_content(&entry.path),
                    StoreError::is_transient,
                )
                .await;
                match text {
                    Ok(text) => package.text = Some(text),
                    Err(e) => {
                        return FetchOutcome::Failed(format!("reading {}: {e}", entry.name))
                    }
                }
                continue;
            }

            let media_kind = match kind.media_kind() {
                Some(media_kind) => media_kind,
                None => continue,
            };

            let download = with_retry_if(
                &self.retry,
                || self.store.download_file(&entry.path),
                StoreError::is_transient,
            )
            .await;
            let local_path = match download {
                Ok(path) => path,
                Err(e) => {
                    return FetchOutcome::Failed(format!("downloading {}: {e}", entry.name))
                }
            };

            let item = MediaItem {
                local_path,
                kind: media_kind,
            };
            if kind.is_protected_media() {
                package.media.push(item);
            } else {
                package.documents.push(item);
            }
        }

        tracing::debug!(
            folder,
            has_text = package.text.is_some(),
            media = package.media.len(),
            documents = package.documents.len(),
            "Day package assembled"
        );
        FetchOutcome::Package(package)
    }

    /// Probe which day folders exist for a program, in ascending order.
    ///
    /// Used when a subscriber record carries no delivery state and the full
    /// backlog has to be reconstructed from the store. Missing folders and
    /// per-day listing errors are skipped; a failed probe day just does not
    /// appear in the result.
    pub async fn available_days(&self, program_key: &str, ceiling: u32) -> Vec<u32> {
        let mut days = Vec::new();

        for day in 1..=ceiling {
            let folder = calendar::folder_path(program_key, day);
            match self.store.list_directory(&folder).await {
                Ok(_) => days.push(day),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::debug!(day, error = %e, "Skipping unprobeable day folder");
                }
            }
        }

        days
    }
}
