//! Bounded failure ledger
//!
//! Record of recent per-subscriber delivery failures, kept for operator
//! review and manual retry. The buffer is capped; once full, the oldest
//! entry is evicted. When opened with a backing file the ledger persists on
//! every change, so failures recorded by a scheduler process are visible to
//! a later inspection process. Persistence failures only warn, since a lost
//! entry just means the failed day resurfaces as pending.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::channel::ChannelId;

/// Maximum number of retained failure entries.
const LEDGER_CAPACITY: usize = 100;

/// One recorded delivery failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Subscriber handle the failure belongs to
    pub subscriber: String,

    /// Channel the delivery was addressed to
    pub channel_id: ChannelId,

    /// Human-readable failure reason
    pub message: String,

    /// Unix timestamp the failure was recorded at
    pub timestamp: i64,
}

/// Bounded ring buffer of delivery failures
#[derive(Default)]
pub struct ErrorLedger {
    path: Option<PathBuf>,
    entries: Mutex<VecDeque<LedgerEntry>>,
}

impl ErrorLedger {
    /// An in-memory ledger with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a ledger backed by a JSON file, loading any existing entries.
    ///
    /// A missing or corrupt file is not fatal: the ledger starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut entries: VecDeque<LedgerEntry> = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failure ledger is corrupt, starting empty"
                    );
                    VecDeque::new()
                }
            },
            Err(_) => VecDeque::new(),
        };

        while entries.len() > LEDGER_CAPACITY {
            entries.pop_front();
        }

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// Record a failure, evicting the oldest entry when full.
    pub async fn record(&self, subscriber: &str, channel_id: ChannelId, message: impl Into<String>) {
        let entry = LedgerEntry {
            subscriber: subscriber.to_string(),
            channel_id,
            message: message.into(),
            timestamp: Utc::now().timestamp(),
        };
        tracing::warn!(
            subscriber = %entry.subscriber,
            channel = entry.channel_id,
            reason = %entry.message,
            "Delivery failure recorded"
        );

        let mut entries = self.entries.lock().await;
        if entries.len() == LEDGER_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
        self.persist(&entries).await;
    }

    /// Snapshot of the current entries, oldest first.
    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Drain all entries, oldest first.
    pub async fn take_all(&self) -> Vec<LedgerEntry> {
        let mut entries = self.entries.lock().await;
        let taken = entries.drain(..).collect();
        self.persist(&entries).await;
        taken
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.persist(&entries).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn persist(&self, entries: &VecDeque<LedgerEntry>) {
        let Some(path) = &self.path else {
            return;
        };

        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Could not serialize failure ledger");
                return;
            }
        };

        let tmp = path.with_extension("tmp");
        let result = async {
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not persist failure ledger"
            );
        }
    }
}
