//! Delivery engine
//!
//! Turns one subscriber's backlog into channel sends. For each pending day:
//! fetch the day folder, send the text message, then the protected media,
//! then the plain documents, and only after everything succeeded commit the
//! day to the roster. Days are independent: a failed day is recorded in the
//! ledger and later days still run, so partial progress is never lost.
//!
//! Binary sends are cache-assisted: a fingerprint hit reuses the channel's
//! native transfer id instead of re-uploading, and a rejected id falls back
//! to a fresh upload that repopulates the cache.

pub mod ledger;

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TransferCache;
use crate::calendar;
use crate::channel::{ChannelError, ChannelId, DeliveryChannel, MediaSource};
use crate::content::{ContentFetcher, ContentPackage, FetchOutcome, MediaItem};
use crate::roster::{Roster, Subscriber};
use crate::store::ContentStore;
use crate::utils::retry::RetryConfig;

pub use ledger::{ErrorLedger, LedgerEntry};

/// Probe at least this many days when reconstructing a backlog from the
/// store, so content published ahead of the calendar window is still found.
const BACKLOG_PROBE_FLOOR: u32 = 100;

/// Outcome of one day's delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// Every item went out and the day was committed
    Delivered,

    /// The day folder does not exist yet; expected and silent
    SkippedNotFound,

    /// The day could not be delivered; no state was committed
    Failed(String),
}

/// Delivery behavior knobs
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Delay between consecutive binary sends, in milliseconds
    pub pacing_delay_ms: u64,

    /// Retry budget for transient failures
    pub retry: RetryConfig,

    /// Channel uploads go to first, to obtain a reusable native transfer id.
    /// Without one, items upload directly to the subscriber and the receipt's
    /// id still populates the cache.
    pub cache_channel: Option<ChannelId>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: 500,
            retry: RetryConfig::default(),
            cache_channel: None,
        }
    }
}

/// Delivers day packages to subscribers
pub struct Deliverer {
    fetcher: ContentFetcher,
    channel: Arc<dyn DeliveryChannel>,
    cache: Arc<TransferCache>,
    roster: Arc<Roster>,
    ledger: Arc<ErrorLedger>,
    config: DeliveryConfig,
}

impl Deliverer {
    pub fn new(
        store: Arc<dyn ContentStore>,
        channel: Arc<dyn DeliveryChannel>,
        cache: Arc<TransferCache>,
        roster: Arc<Roster>,
        ledger: Arc<ErrorLedger>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            fetcher: ContentFetcher::new(store).with_retry(config.retry.clone()),
            channel,
            cache,
            roster,
            ledger,
            config,
        }
    }

    /// Deliver every day the subscriber is still owed, in ascending order.
    ///
    /// Pending days come from date arithmetic; when that yields nothing, the
    /// store itself is probed for day folders published ahead of the
    /// calendar window. Each day commits independently; failed days are
    /// ledgered and later days still run.
    pub async fn deliver_backlog(
        &self,
        subscriber: &Subscriber,
        as_of: NaiveDate,
    ) -> Vec<(u32, DayOutcome)> {
        let Some(begin) = subscriber.begin_date else {
            self.ledger
                .record(
                    &subscriber.handle,
                    subscriber.channel_id,
                    "program has no begin date",
                )
                .await;
            return Vec::new();
        };

        let current = calendar::day_number(begin, as_of);

        // Before the program start the calendar window is empty, but content
        // published ahead of it must still go out, so the store probe runs
        // in both cases.
        let mut days = if current >= 1 {
            calendar::pending_days(begin, subscriber.last_delivered, as_of)
        } else {
            Vec::new()
        };
        if days.is_empty() {
            days = self
                .probe_ahead(subscriber, begin, current.max(0) as u32)
                .await;
        }

        if days.is_empty() {
            tracing::debug!(subscriber = %subscriber.handle, "Nothing to deliver");
            return Vec::new();
        }

        tracing::info!(
            subscriber = %subscriber.handle,
            days = ?days,
            "Delivering backlog"
        );

        let mut outcomes = Vec::with_capacity(days.len());
        for day in days {
            let outcome = self.deliver_day(subscriber, day).await;
            match &outcome {
                DayOutcome::Delivered => {
                    tracing::info!(subscriber = %subscriber.handle, day, "Day delivered");
                }
                DayOutcome::SkippedNotFound => {
                    tracing::debug!(subscriber = %subscriber.handle, day, "Day not published yet");
                }
                DayOutcome::Failed(reason) => {
                    self.ledger
                        .record(
                            &subscriber.handle,
                            subscriber.channel_id,
                            format!("day {day}: {reason}"),
                        )
                        .await;
                }
            }
            outcomes.push((day, outcome));
        }
        outcomes
    }

    /// Deliver one day to one subscriber and commit it on success.
    pub async fn deliver_day(&self, subscriber: &Subscriber, day: u32) -> DayOutcome {
        let folder = calendar::folder_path(&subscriber.program_key, day);

        let package = match self.fetcher.fetch_day(&folder).await {
            FetchOutcome::Package(package) => package,
            FetchOutcome::NotFound => return DayOutcome::SkippedNotFound,
            FetchOutcome::Failed(reason) => return DayOutcome::Failed(reason),
        };

        if let Err(reason) = self.send_package(subscriber, &package).await {
            return DayOutcome::Failed(reason);
        }

        if let Err(e) = self.roster.commit_day(&subscriber.handle, day).await {
            return DayOutcome::Failed(format!("recording delivery state: {e}"));
        }
        DayOutcome::Delivered
    }

    /// Days present in the store beyond the subscriber's last recorded day.
    async fn probe_ahead(&self, subscriber: &Subscriber, begin: NaiveDate, current: u32) -> Vec<u32> {
        let last_day = subscriber
            .last_delivered
            .and_then(|ts| calendar::day_of_timestamp(begin, ts))
            .unwrap_or(0);

        let ceiling = current.max(BACKLOG_PROBE_FLOOR);
        self.fetcher
            .available_days(&subscriber.program_key, ceiling)
            .await
            .into_iter()
            .filter(|&day| i64::from(day) > last_day)
            .collect()
    }

    /// Send a whole package: text, protected media, plain documents.
    async fn send_package(
        &self,
        subscriber: &Subscriber,
        package: &ContentPackage,
    ) -> Result<(), String> {
        if let Some(text) = &package.text {
            self.channel_retry(|| self.channel.send_text(subscriber.channel_id, text))
                .await
                .map_err(|e| format!("sending text: {e}"))?;
        }

        let mut sent_binary = false;
        for (item, protected) in package
            .media
            .iter()
            .map(|item| (item, true))
            .chain(package.documents.iter().map(|item| (item, false)))
        {
            if sent_binary && self.config.pacing_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.pacing_delay_ms)).await;
            }
            self.send_binary(subscriber.channel_id, item, protected)
                .await
                .map_err(|e| format!("sending {}: {e}", item.local_path.display()))?;
            sent_binary = true;
        }

        Ok(())
    }

    /// Cache-assisted binary send.
    async fn send_binary(
        &self,
        channel: ChannelId,
        item: &MediaItem,
        protected: bool,
    ) -> Result<(), ChannelError> {
        let key = self.cache.key_for(&item.local_path).await;

        if let Some(id) = self.cache.get(&key).await {
            let source = MediaSource::Native(id);
            match self
                .channel_retry(|| self.channel.send_media(channel, item.kind, &source, protected))
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if e.is_invalid_identifier() => {
                    // The channel no longer honors the cached id; upload
                    // fresh within the same attempt.
                    self.cache.remove(&key).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.upload_and_send(channel, item, protected, &key).await
    }

    async fn upload_and_send(
        &self,
        channel: ChannelId,
        item: &MediaItem,
        protected: bool,
        key: &str,
    ) -> Result<(), ChannelError> {
        // Upload to the cache channel first when one is configured, so the
        // subscriber send itself is a cheap native-id send.
        if let Some(cache_channel) = self.config.cache_channel {
            let upload = MediaSource::Upload(item.local_path.clone());
            match self
                .channel_retry(|| {
                    self.channel.send_media(cache_channel, item.kind, &upload, false)
                })
                .await
            {
                Ok(receipt) => {
                    if let Some(id) = receipt.native_id {
                        self.cache.set(key, &id).await;
                        let source = MediaSource::Native(id);
                        self.channel_retry(|| {
                            self.channel.send_media(channel, item.kind, &source, protected)
                        })
                        .await?;
                        return Ok(());
                    }
                    tracing::warn!(
                        file = %item.local_path.display(),
                        "Cache channel returned no transfer id, uploading directly"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        file = %item.local_path.display(),
                        error = %e,
                        "Cache channel upload failed, uploading directly"
                    );
                }
            }
        }

        let upload = MediaSource::Upload(item.local_path.clone());
        let receipt = self
            .channel_retry(|| self.channel.send_media(channel, item.kind, &upload, protected))
            .await?;

        if let Some(id) = receipt.native_id {
            self.cache.set(key, &id).await;
        }
        Ok(())
    }

    /// Run a channel operation under the retry budget.
    ///
    /// Transient failures back off exponentially; connection resets get the
    /// extra flat delay on top. Everything else returns immediately.
    async fn channel_retry<T, F, Fut>(&self, operation: F) -> Result<T, ChannelError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    attempt += 1;
                    let mut delay = retry.calculate_delay(attempt);
                    if e.is_connection_reset() {
                        delay += retry.reset_extra_delay();
                    }
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying channel send"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MediaKind, SendReceipt};
    use crate::store::{Entry, EntryKind, StoreError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap, VecDeque};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeStore {
        folders: HashMap<String, Vec<String>>,
        texts: HashMap<String, String>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                folders: HashMap::new(),
                texts: HashMap::new(),
            }
        }

        fn with_day(mut self, folder: &str, files: &[&str]) -> Self {
            for file in files {
                if file.ends_with(".txt") {
                    self.texts
                        .insert(format!("{folder}/{file}"), format!("text of {folder}"));
                }
            }
            self.folders
                .insert(folder.to_string(), files.iter().map(|f| f.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, StoreError> {
            let files = self.folders.get(path).ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })?;
            Ok(files
                .iter()
                .map(|name| Entry {
                    name: name.clone(),
                    kind: EntryKind::File,
                    path: format!("{path}/{name}"),
                    size: Some(1),
                })
                .collect())
        }

        async fn get_text_content(&self, path: &str) -> Result<String, StoreError> {
            self.texts
                .get(path)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })
        }

        async fn download_file(&self, path: &str) -> Result<PathBuf, StoreError> {
            Ok(PathBuf::from("downloads").join(path))
        }
    }

    /// Channel mock: logs every call, pops scripted media results, and
    /// otherwise succeeds with a generated native id.
    struct MockChannel {
        log: Mutex<Vec<String>>,
        media_results: Mutex<VecDeque<Result<SendReceipt, ChannelError>>>,
        next_id: AtomicU32,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                media_results: Mutex::new(VecDeque::new()),
                next_id: AtomicU32::new(1),
            }
        }

        fn script(self, results: Vec<Result<SendReceipt, ChannelError>>) -> Self {
            *self.media_results.lock().unwrap() = results.into();
            self
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryChannel for MockChannel {
        async fn send_text(&self, channel: ChannelId, _text: &str) -> Result<(), ChannelError> {
            self.log.lock().unwrap().push(format!("text:{channel}"));
            Ok(())
        }

        async fn send_media(
            &self,
            channel: ChannelId,
            kind: MediaKind,
            source: &MediaSource,
            protected: bool,
        ) -> Result<SendReceipt, ChannelError> {
            let source_tag = match source {
                MediaSource::Upload(_) => "upload".to_string(),
                MediaSource::Native(id) => format!("native={id}"),
            };
            self.log.lock().unwrap().push(format!(
                "media:{channel}:{}:{source_tag}:protected={protected}",
                kind.field()
            ));

            if let Some(result) = self.media_results.lock().unwrap().pop_front() {
                return result;
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(SendReceipt {
                native_id: Some(format!("id-{id}")),
            })
        }
    }

    const ROSTER: &str = r#"{
        "course_a": {
            "begin_date": "2024-01-01",
            "@alice": { "name": "Alice", "channel_id": 100, "last_delivered": null }
        }
    }"#;

    struct Fixture {
        _dir: TempDir,
        deliverer: Deliverer,
        channel: Arc<MockChannel>,
        cache: Arc<TransferCache>,
        roster: Arc<Roster>,
        ledger: Arc<ErrorLedger>,
    }

    async fn fixture(store: FakeStore, channel: MockChannel, config: DeliveryConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let roster_path = dir.path().join("roster.json");
        tokio::fs::write(&roster_path, ROSTER).await.unwrap();

        let channel = Arc::new(channel);
        let cache = Arc::new(TransferCache::open(dir.path().join("cache.json")).await);
        let roster = Arc::new(Roster::load(&roster_path).await.unwrap());
        let ledger = Arc::new(ErrorLedger::new());

        let deliverer = Deliverer::new(
            Arc::new(store),
            channel.clone(),
            cache.clone(),
            roster.clone(),
            ledger.clone(),
            config,
        );
        Fixture {
            _dir: dir,
            deliverer,
            channel,
            cache,
            roster,
            ledger,
        }
    }

    fn fast_config() -> DeliveryConfig {
        DeliveryConfig {
            pacing_delay_ms: 0,
            retry: RetryConfig::with_delays(2, 1, 5),
            cache_channel: None,
        }
    }

    async fn alice(fx: &Fixture) -> Subscriber {
        fx.roster.subscriber("@alice").await.unwrap()
    }

    fn begin() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_day_sends_text_media_documents_in_order() {
        let store = FakeStore::new().with_day("course_a/1_day", &["1.txt", "a.jpg", "b.pdf"]);
        let fx = fixture(store, MockChannel::new(), fast_config()).await;
        let subscriber = alice(&fx).await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert_eq!(outcome, DayOutcome::Delivered);

        let calls = fx.channel.calls();
        assert_eq!(calls[0], "text:100");
        assert_eq!(calls[1], "media:100:photo:upload:protected=true");
        assert_eq!(calls[2], "media:100:document:upload:protected=false");

        // The day was committed with the canonical end-of-day timestamp.
        let updated = alice(&fx).await;
        assert_eq!(
            updated.last_delivered,
            Some(calendar::delivered_at(begin(), 1))
        );
        // The upload receipt populated the cache.
        assert_eq!(fx.cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_missing_day_is_silent_and_commits_nothing() {
        let fx = fixture(FakeStore::new(), MockChannel::new(), fast_config()).await;
        let subscriber = alice(&fx).await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert_eq!(outcome, DayOutcome::SkippedNotFound);
        assert!(fx.channel.calls().is_empty());
        assert!(alice(&fx).await.last_delivered.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_sends_native_id_without_upload() {
        let store = FakeStore::new().with_day("course_a/1_day", &["a.jpg"]);
        let fx = fixture(store, MockChannel::new(), fast_config()).await;
        let subscriber = alice(&fx).await;

        // The mock store's download path does not exist locally, so the
        // fingerprint falls back to the path key.
        fx.cache
            .set("path:downloads/course_a/1_day/a.jpg", "cached-id")
            .await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert_eq!(outcome, DayOutcome::Delivered);
        assert_eq!(
            fx.channel.calls(),
            vec!["media:100:photo:native=cached-id:protected=true"]
        );
    }

    #[tokio::test]
    async fn test_invalid_identifier_evicts_and_falls_back_to_upload() {
        let store = FakeStore::new().with_day("course_a/1_day", &["a.jpg"]);
        let channel = MockChannel::new().script(vec![
            Err(ChannelError::InvalidIdentifier("stale".to_string())),
            Ok(SendReceipt {
                native_id: Some("fresh-id".to_string()),
            }),
        ]);
        let fx = fixture(store, channel, fast_config()).await;
        let subscriber = alice(&fx).await;

        let key = "path:downloads/course_a/1_day/a.jpg";
        fx.cache.set(key, "stale-id").await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert_eq!(outcome, DayOutcome::Delivered);

        let calls = fx.channel.calls();
        assert_eq!(calls[0], "media:100:photo:native=stale-id:protected=true");
        assert_eq!(calls[1], "media:100:photo:upload:protected=true");
        // Fallback repopulated the cache with the fresh id.
        assert_eq!(fx.cache.get(key).await.as_deref(), Some("fresh-id"));
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_retry_budget() {
        let store = FakeStore::new().with_day("course_a/1_day", &["a.jpg"]);
        let channel = MockChannel::new().script(vec![
            Err(ChannelError::transient("timeout")),
            Err(ChannelError::transient("timeout")),
            Err(ChannelError::transient("timeout")),
        ]);
        let fx = fixture(store, channel, fast_config()).await;
        let subscriber = alice(&fx).await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert!(matches!(outcome, DayOutcome::Failed(_)));
        // max_retries = 2: one initial attempt plus two retries.
        assert_eq!(fx.channel.calls().len(), 3);
        assert!(alice(&fx).await.last_delivered.is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_attempts_once() {
        let store = FakeStore::new().with_day("course_a/1_day", &["a.jpg"]);
        let channel = MockChannel::new().script(vec![Err(ChannelError::Permanent(
            "unsupported content".to_string(),
        ))]);
        let fx = fixture(store, channel, fast_config()).await;
        let subscriber = alice(&fx).await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert!(matches!(outcome, DayOutcome::Failed(_)));
        assert_eq!(fx.channel.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_channel_receives_upload_then_subscriber_gets_native_send() {
        let store = FakeStore::new().with_day("course_a/1_day", &["a.jpg"]);
        let mut config = fast_config();
        config.cache_channel = Some(999);
        let fx = fixture(store, MockChannel::new(), config).await;
        let subscriber = alice(&fx).await;

        let outcome = fx.deliverer.deliver_day(&subscriber, 1).await;
        assert_eq!(outcome, DayOutcome::Delivered);

        let calls = fx.channel.calls();
        assert_eq!(calls[0], "media:999:photo:upload:protected=false");
        assert_eq!(calls[1], "media:100:photo:native=id-1:protected=true");
    }

    #[tokio::test]
    async fn test_backlog_catches_up_and_skips_unpublished_day() {
        // Store has days 1 and 2; as-of day 3 the folder is not there yet.
        let store = FakeStore::new()
            .with_day("course_a/1_day", &["1.txt"])
            .with_day("course_a/2_day", &["2.txt"]);
        let fx = fixture(store, MockChannel::new(), fast_config()).await;
        let subscriber = alice(&fx).await;

        let as_of = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let outcomes = fx.deliverer.deliver_backlog(&subscriber, as_of).await;

        assert_eq!(
            outcomes,
            vec![
                (1, DayOutcome::Delivered),
                (2, DayOutcome::Delivered),
                (3, DayOutcome::SkippedNotFound),
            ]
        );
        assert_eq!(
            alice(&fx).await.last_delivered,
            Some(calendar::delivered_at(begin(), 2))
        );
        assert!(fx.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_backlog_failed_day_is_ledgered_and_later_days_proceed() {
        let store = FakeStore::new()
            .with_day("course_a/1_day", &["a.jpg"])
            .with_day("course_a/2_day", &["2.txt"]);
        // Day 1's only item fails permanently; day 2 succeeds.
        let channel = MockChannel::new().script(vec![Err(ChannelError::Permanent(
            "unsupported content".to_string(),
        ))]);
        let fx = fixture(store, channel, fast_config()).await;
        let subscriber = alice(&fx).await;

        let as_of = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let outcomes = fx.deliverer.deliver_backlog(&subscriber, as_of).await;

        assert!(matches!(outcomes[0], (1, DayOutcome::Failed(_))));
        assert_eq!(outcomes[1], (2, DayOutcome::Delivered));

        let entries = fx.ledger.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subscriber, "@alice");
        assert!(entries[0].message.starts_with("day 1:"));

        // Day 2 committed even though day 1 failed.
        assert_eq!(
            alice(&fx).await.last_delivered,
            Some(calendar::delivered_at(begin(), 2))
        );
    }

    #[tokio::test]
    async fn test_backlog_probes_store_before_program_start() {
        // The program has not begun, so the calendar window is empty, but
        // day 1 is already published and must go out.
        let store = FakeStore::new().with_day("course_a/1_day", &["1.txt"]);
        let fx = fixture(store, MockChannel::new(), fast_config()).await;
        let subscriber = alice(&fx).await;

        let as_of = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let outcomes = fx.deliverer.deliver_backlog(&subscriber, as_of).await;

        assert_eq!(outcomes, vec![(1, DayOutcome::Delivered)]);
        assert_eq!(
            alice(&fx).await.last_delivered,
            Some(calendar::delivered_at(begin(), 1))
        );
    }

    #[tokio::test]
    async fn test_backlog_probes_store_for_days_published_ahead() {
        // Subscriber is up to date by date arithmetic, but the store already
        // has folders beyond the calendar window.
        let store = FakeStore::new()
            .with_day("course_a/3_day", &["3.txt"])
            .with_day("course_a/4_day", &["4.txt"])
            .with_day("course_a/5_day", &["5.txt"]);
        let fx = fixture(store, MockChannel::new(), fast_config()).await;

        let as_of = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        fx.roster.commit_day("@alice", 3).await.unwrap();
        let subscriber = alice(&fx).await;

        let outcomes = fx.deliverer.deliver_backlog(&subscriber, as_of).await;
        assert_eq!(
            outcomes,
            vec![(4, DayOutcome::Delivered), (5, DayOutcome::Delivered)]
        );
    }
}
