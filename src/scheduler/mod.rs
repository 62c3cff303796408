//! Daily delivery orchestration
//!
//! One background poll loop wakes on a fixed interval and asks two
//! questions: is the wall clock past today's trigger time, and has a run
//! already completed today? When both answer yes it takes the run lock,
//! re-checks under the lock, delivers every subscriber's backlog, and
//! stamps today as done, so a full run happens at most once per calendar day.
//!
//! An immediate check fires once at startup (after a short settle delay) so
//! a process that was down through the trigger time still catches up today
//! instead of waiting for tomorrow. Manual forced runs go through the same
//! run lock but never stamp the date.

pub mod error;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::delivery::{DayOutcome, Deliverer};
use crate::roster::Roster;

pub use error::{SchedulerError, SchedulerResult};

/// How long `stop` waits for the loop to finish before detaching it.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the daily delivery trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Time of day the delivery run fires (24h format, e.g. "09:00")
    pub trigger_time: String,

    /// Poll loop wake interval in seconds
    pub poll_interval_secs: u64,

    /// Delay before the startup immediate check, in seconds
    pub settle_delay_secs: u64,

    /// Whether to run the immediate check at startup
    pub startup_check: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_time: "09:00".to_string(),
            poll_interval_secs: 60,
            settle_delay_secs: 5,
            startup_check: true,
        }
    }
}

impl TriggerConfig {
    /// Create a new config builder
    pub fn builder() -> TriggerConfigBuilder {
        TriggerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        if NaiveTime::parse_from_str(&self.trigger_time, "%H:%M").is_err() {
            return Err(SchedulerError::trigger_config(
                "trigger_time",
                format!("Invalid time format '{}'. Expected HH:MM", self.trigger_time),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(SchedulerError::trigger_config(
                "poll_interval_secs",
                "Poll interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parse the trigger time
    pub fn parse_trigger_time(&self) -> SchedulerResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.trigger_time, "%H:%M").map_err(|_| {
            SchedulerError::trigger_config(
                "trigger_time",
                format!("Invalid time: {}", self.trigger_time),
            )
        })
    }
}

/// Builder for TriggerConfig
#[derive(Debug, Default)]
pub struct TriggerConfigBuilder {
    trigger_time: Option<String>,
    poll_interval_secs: Option<u64>,
    settle_delay_secs: Option<u64>,
    startup_check: Option<bool>,
}

impl TriggerConfigBuilder {
    pub fn trigger_time(mut self, time: impl Into<String>) -> Self {
        self.trigger_time = Some(time.into());
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        self
    }

    pub fn settle_delay_secs(mut self, secs: u64) -> Self {
        self.settle_delay_secs = Some(secs);
        self
    }

    pub fn startup_check(mut self, value: bool) -> Self {
        self.startup_check = Some(value);
        self
    }

    /// Build and validate the config
    pub fn build(self) -> SchedulerResult<TriggerConfig> {
        let defaults = TriggerConfig::default();
        let config = TriggerConfig {
            trigger_time: self.trigger_time.unwrap_or(defaults.trigger_time),
            poll_interval_secs: self.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            settle_delay_secs: self.settle_delay_secs.unwrap_or(defaults.settle_delay_secs),
            startup_check: self.startup_check.unwrap_or(defaults.startup_check),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Aggregate result of one delivery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Subscribers processed in the run
    pub subscribers: usize,

    /// Days delivered and committed
    pub delivered: usize,

    /// Days skipped because their folder is not published yet
    pub skipped: usize,

    /// Days that failed and were ledgered
    pub failed: usize,
}

impl DeliveryStats {
    fn absorb(&mut self, outcomes: &[(u32, DayOutcome)]) {
        self.subscribers += 1;
        for (_, outcome) in outcomes {
            match outcome {
                DayOutcome::Delivered => self.delivered += 1,
                DayOutcome::SkippedNotFound => self.skipped += 1,
                DayOutcome::Failed(_) => self.failed += 1,
            }
        }
    }
}

/// The daily delivery scheduler
pub struct DeliveryScheduler {
    deliverer: Arc<Deliverer>,
    roster: Arc<Roster>,
    config: RwLock<TriggerConfig>,
    run_lock: Mutex<()>,
    last_run_date: RwLock<Option<NaiveDate>>,
    running: RwLock<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryScheduler {
    pub fn new(
        deliverer: Arc<Deliverer>,
        roster: Arc<Roster>,
        config: TriggerConfig,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            deliverer,
            roster,
            config: RwLock::new(config),
            run_lock: Mutex::new(()),
            last_run_date: RwLock::new(None),
            running: RwLock::new(false),
            loop_handle: Mutex::new(None),
        })
    }

    /// Start the background poll loop.
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(SchedulerError::AlreadyRunning);
            }
            *running = true;
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move { scheduler.poll_loop().await });
        *self.loop_handle.lock().await = Some(handle);

        tracing::info!("Delivery scheduler started");
        Ok(())
    }

    /// Stop the poll loop.
    ///
    /// Flips the running flag and joins the loop with a bounded timeout; an
    /// in-flight delivery run is allowed to finish in the background.
    pub async fn stop(&self) {
        *self.running.write().await = false;

        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Scheduler loop still busy after stop timeout, detaching");
            }
        }
        tracing::info!("Delivery scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Change the trigger time.
    ///
    /// When the time actually changes the completed-run date is cleared, so
    /// a newly-earlier time that has already passed today fires a catch-up
    /// run on the next poll. Setting the same time is a no-op.
    pub async fn set_trigger_time(&self, time: &str) -> SchedulerResult<()> {
        if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
            return Err(SchedulerError::trigger_config(
                "trigger_time",
                format!("Invalid time format '{time}'. Expected HH:MM"),
            ));
        }

        let mut config = self.config.write().await;
        if config.trigger_time == time {
            return Ok(());
        }
        tracing::info!(from = %config.trigger_time, to = time, "Trigger time changed");
        config.trigger_time = time.to_string();
        *self.last_run_date.write().await = None;
        Ok(())
    }

    /// Run delivery now, outside the normal cadence.
    ///
    /// With a subset, only those subscribers are processed (used to retry
    /// ledgered failures); without one, everybody is. Serializes through
    /// the same run lock as the scheduled run and never stamps the
    /// completed-run date.
    pub async fn force_delivery(&self, subset: Option<&[String]>) -> DeliveryStats {
        let _guard = self.run_lock.lock().await;
        let as_of = Local::now().date_naive();

        let Some(handles) = subset else {
            return self.run_all(as_of).await;
        };

        let mut stats = DeliveryStats::default();
        for handle in handles {
            match self.roster.subscriber(handle).await {
                Some(subscriber) => {
                    let outcomes = self.deliverer.deliver_backlog(&subscriber, as_of).await;
                    stats.absorb(&outcomes);
                }
                None => {
                    tracing::warn!(subscriber = %handle, "Not registered or unreachable, skipping");
                }
            }
        }
        stats
    }

    async fn poll_loop(self: Arc<Self>) {
        let (startup_check, settle, poll) = {
            let config = self.config.read().await;
            (
                config.startup_check,
                Duration::from_secs(config.settle_delay_secs),
                Duration::from_secs(config.poll_interval_secs),
            )
        };

        if startup_check {
            tokio::time::sleep(settle).await;
            if *self.running.read().await {
                tracing::debug!("Startup delivery check");
                self.check_and_run().await;
            }
        }

        while *self.running.read().await {
            tokio::select! {
                _ = tokio::time::sleep(poll) => {
                    self.check_and_run().await;
                }
                _ = self.wait_for_stop() => break,
            }
        }
    }

    async fn wait_for_stop(&self) {
        while *self.running.read().await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Run a full delivery if due, re-checking under the run lock.
    async fn check_and_run(&self) {
        if !self.is_due(Local::now()).await {
            return;
        }

        let _guard = self.run_lock.lock().await;
        // A concurrent entry may have completed the run between the wake
        // and the lock acquisition.
        let now = Local::now();
        if !self.is_due(now).await {
            return;
        }

        let today = now.date_naive();
        let stats = self.run_all(today).await;
        *self.last_run_date.write().await = Some(today);

        tracing::info!(
            subscribers = stats.subscribers,
            delivered = stats.delivered,
            skipped = stats.skipped,
            failed = stats.failed,
            "Scheduled delivery run complete"
        );
    }

    /// Past today's trigger time and no completed run today.
    async fn is_due(&self, now: DateTime<Local>) -> bool {
        let trigger_time = {
            let config = self.config.read().await;
            match config.parse_trigger_time() {
                Ok(time) => time,
                // Validated on every write; reaching this means a bug.
                Err(e) => {
                    tracing::error!(error = %e, "Unparseable trigger time, skipping run");
                    return false;
                }
            }
        };

        if now.time() < trigger_time {
            return false;
        }
        *self.last_run_date.read().await != Some(now.date_naive())
    }

    /// Deliver every subscriber's backlog; one subscriber's failure never
    /// aborts the rest.
    async fn run_all(&self, as_of: NaiveDate) -> DeliveryStats {
        let subscribers = self.roster.subscribers_with_channel().await;
        tracing::info!(count = subscribers.len(), "Starting delivery run");

        let mut stats = DeliveryStats::default();
        for subscriber in subscribers {
            let outcomes = self.deliverer.deliver_backlog(&subscriber, as_of).await;
            stats.absorb(&outcomes);
        }
        stats
    }
}
