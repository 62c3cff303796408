//! Subscriber roster
//!
//! One JSON document holds every program and its subscribers:
//!
//! ```json
//! {
//!     "course_a": {
//!         "begin_date": "2024-01-01",
//!         "@alice": { "name": "Alice", "channel_id": 100, "last_delivered": 1704236399 }
//!     }
//! }
//! ```
//!
//! Earlier deployments stored subscribers as bare name strings and some
//! records predate the `last_delivered` field; loading migrates both shapes
//! in place and rewrites the document once. Every write goes through an
//! atomic temp-file rename, and a tokio `RwLock` serializes access.
//!
//! `commit_day` is the only writer of `last_delivered` and never moves it
//! backwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::calendar;
use crate::channel::ChannelId;

/// Errors raised by roster operations
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Roster file not found: {0}")]
    Missing(PathBuf),

    #[error("Roster I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Roster document is malformed: {0}")]
    Malformed(String),

    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    #[error("Subscriber name cannot be empty")]
    EmptyName,

    #[error("Program {0} has no begin date")]
    NoBeginDate(String),
}

/// Stored per-subscriber record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriberRecord {
    /// Display name, empty until the subscriber provides one
    #[serde(default)]
    pub name: String,

    /// Messaging channel id, `None` until the subscriber first makes contact
    #[serde(default)]
    pub channel_id: Option<ChannelId>,

    /// Unix timestamp of the last fully delivered day, `None` for never
    #[serde(default)]
    pub last_delivered: Option<i64>,
}

/// Stored per-program record
#[derive(Debug, Clone, Serialize)]
struct ProgramRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    begin_date: Option<NaiveDate>,

    #[serde(flatten)]
    subscribers: BTreeMap<String, SubscriberRecord>,
}

/// Snapshot of one deliverable subscriber, handed to the delivery loop
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub handle: String,
    pub program_key: String,
    pub begin_date: Option<NaiveDate>,
    pub name: String,
    pub channel_id: ChannelId,
    pub last_delivered: Option<i64>,
}

type RosterData = BTreeMap<String, ProgramRecord>;

/// The subscriber roster document
pub struct Roster {
    path: PathBuf,
    data: RwLock<RosterData>,
}

impl Roster {
    /// Load the roster from disk, migrating legacy records if present.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RosterError> {
        let path = path.into();
        if !path.exists() {
            return Err(RosterError::Missing(path));
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| RosterError::Malformed(e.to_string()))?;

        let (data, migrated) = parse_document(&value)?;
        let roster = Self {
            path,
            data: RwLock::new(data),
        };

        if migrated {
            roster.persist().await?;
            tracing::info!(path = %roster.path.display(), "Migrated roster to current format");
        }

        Ok(roster)
    }

    async fn persist(&self) -> Result<(), RosterError> {
        let data = self.data.read().await;
        write_atomic(&self.path, &*data).await
    }

    /// Program key the subscriber belongs to.
    pub async fn program_for(&self, handle: &str) -> Option<String> {
        let handle = normalize_handle(handle);
        let data = self.data.read().await;
        data.iter()
            .find(|(_, program)| program.subscribers.contains_key(&handle))
            .map(|(key, _)| key.clone())
    }

    /// Begin date of a program.
    pub async fn begin_date(&self, program_key: &str) -> Option<NaiveDate> {
        let data = self.data.read().await;
        data.get(program_key).and_then(|p| p.begin_date)
    }

    /// Snapshot of one subscriber, if registered and reachable.
    pub async fn subscriber(&self, handle: &str) -> Option<Subscriber> {
        let handle = normalize_handle(handle);
        let data = self.data.read().await;
        for (program_key, program) in data.iter() {
            if let Some(record) = program.subscribers.get(&handle) {
                let channel_id = record.channel_id?;
                return Some(Subscriber {
                    handle,
                    program_key: program_key.clone(),
                    begin_date: program.begin_date,
                    name: record.name.clone(),
                    channel_id,
                    last_delivered: record.last_delivered,
                });
            }
        }
        None
    }

    /// Every subscriber with a channel id, across all programs.
    ///
    /// Subscribers that never made contact have no channel id and cannot be
    /// delivered to; they are silently excluded.
    pub async fn subscribers_with_channel(&self) -> Vec<Subscriber> {
        let data = self.data.read().await;
        let mut result = Vec::new();
        for (program_key, program) in data.iter() {
            for (handle, record) in &program.subscribers {
                if let Some(channel_id) = record.channel_id {
                    result.push(Subscriber {
                        handle: handle.clone(),
                        program_key: program_key.clone(),
                        begin_date: program.begin_date,
                        name: record.name.clone(),
                        channel_id,
                        last_delivered: record.last_delivered,
                    });
                }
            }
        }
        result
    }

    /// Record the channel id a subscriber made contact from.
    pub async fn set_channel(&self, handle: &str, channel_id: ChannelId) -> Result<(), RosterError> {
        self.update(handle, |record| record.channel_id = Some(channel_id))
            .await
    }

    /// Set the subscriber's display name; empty names are rejected.
    pub async fn set_name(&self, handle: &str, name: &str) -> Result<(), RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }
        let name = name.to_string();
        self.update(handle, move |record| record.name = name).await
    }

    /// Commit a fully delivered day.
    ///
    /// Stores the end-of-day timestamp of the delivered day; an older day
    /// never overwrites a newer one, so out-of-order commits within one
    /// catch-up window are harmless.
    pub async fn commit_day(&self, handle: &str, day: u32) -> Result<(), RosterError> {
        let handle = normalize_handle(handle);
        let mut data = self.data.write().await;

        let (program_key, program) = data
            .iter_mut()
            .find(|(_, p)| p.subscribers.contains_key(&handle))
            .ok_or_else(|| RosterError::UnknownSubscriber(handle.clone()))?;

        let begin = program
            .begin_date
            .ok_or_else(|| RosterError::NoBeginDate(program_key.clone()))?;

        let ts = calendar::delivered_at(begin, day);
        let record = program
            .subscribers
            .get_mut(&handle)
            .ok_or_else(|| RosterError::UnknownSubscriber(handle.clone()))?;

        if record.last_delivered.is_some_and(|prev| prev >= ts) {
            return Ok(());
        }
        record.last_delivered = Some(ts);

        write_atomic(&self.path, &*data).await
    }

    async fn update<F>(&self, handle: &str, apply: F) -> Result<(), RosterError>
    where
        F: FnOnce(&mut SubscriberRecord),
    {
        let handle = normalize_handle(handle);
        let mut data = self.data.write().await;

        let record = data
            .values_mut()
            .find_map(|program| program.subscribers.get_mut(&handle))
            .ok_or_else(|| RosterError::UnknownSubscriber(handle.clone()))?;
        apply(record);

        write_atomic(&self.path, &*data).await
    }
}

/// Handles are stored with a leading `@`.
fn normalize_handle(handle: &str) -> String {
    if handle.starts_with('@') {
        handle.to_string()
    } else {
        format!("@{handle}")
    }
}

/// Parse the document, tolerating the legacy shapes; returns whether
/// anything was migrated.
fn parse_document(value: &Value) -> Result<(RosterData, bool), RosterError> {
    let programs = value
        .as_object()
        .ok_or_else(|| RosterError::Malformed("top level must be an object".to_string()))?;

    let mut data = RosterData::new();
    let mut migrated = false;

    for (program_key, program_value) in programs {
        let Some(fields) = program_value.as_object() else {
            tracing::warn!(program = program_key, "Skipping non-object program entry");
            migrated = true;
            continue;
        };

        let begin_date = fields
            .get("begin_date")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        let mut subscribers = BTreeMap::new();
        for (key, entry) in fields {
            if key == "begin_date" {
                continue;
            }
            let handle = normalize_handle(key);
            let (record, entry_migrated) = parse_subscriber(entry);
            migrated |= entry_migrated || handle != *key;
            subscribers.insert(handle, record);
        }

        data.insert(
            program_key.clone(),
            ProgramRecord {
                begin_date,
                subscribers,
            },
        );
    }

    Ok((data, migrated))
}

fn parse_subscriber(entry: &Value) -> (SubscriberRecord, bool) {
    match entry {
        // Legacy shape: the whole record is the subscriber's name.
        Value::String(name) => (
            SubscriberRecord {
                name: name.clone(),
                ..Default::default()
            },
            true,
        ),
        Value::Object(fields) => {
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let channel_id = fields.get("channel_id").and_then(Value::as_i64);
            let last_delivered = fields.get("last_delivered").and_then(Value::as_i64);
            let migrated = !fields.contains_key("last_delivered");
            (
                SubscriberRecord {
                    name,
                    channel_id,
                    last_delivered,
                },
                migrated,
            )
        }
        _ => (SubscriberRecord::default(), true),
    }
}

/// Write the whole document to a temp file, then rename over the original.
async fn write_atomic(path: &Path, data: &RosterData) -> Result<(), RosterError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| RosterError::Malformed(e.to_string()))?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
