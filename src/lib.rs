//! dripfeed - Incremental catch-up content delivery engine
//!
//! Delivers dated content packages (one per program "day") to subscribers
//! over a messaging channel, catching up every day a subscriber is owed
//! across restarts, partial failures, and out-of-order publishing.
//!
//! # Architecture
//!
//! - [`calendar`] - Program-day date arithmetic and pending-day windows
//! - [`store`] - Content store boundary and the cloud-disk client
//! - [`channel`] - Messaging channel boundary and the bot API client
//! - [`content`] - File classification and day-package fetching
//! - [`roster`] - Durable per-subscriber delivery state
//! - [`cache`] - Fingerprint -> native transfer id cache
//! - [`delivery`] - The deliverer and the failure ledger
//! - [`scheduler`] - Daily trigger loop and forced runs
//! - [`config`] - Configuration management and settings
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use dripfeed::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let store = Arc::new(DiskStore::new(config.disk_config())?);
//!     let channel = Arc::new(BotChannel::new(config.bot_config())?);
//!     let cache = Arc::new(TransferCache::open(&config.state.cache_path).await);
//!     let roster = Arc::new(Roster::load(&config.state.roster_path).await?);
//!     let ledger = Arc::new(ErrorLedger::open(&config.state.ledger_path).await);
//!
//!     let deliverer = Arc::new(Deliverer::new(
//!         store,
//!         channel,
//!         cache,
//!         roster.clone(),
//!         ledger,
//!         config.delivery_config(),
//!     ));
//!     let scheduler = Arc::new(DeliveryScheduler::new(
//!         deliverer,
//!         roster,
//!         config.scheduler.clone(),
//!     )?);
//!     scheduler.start().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod calendar;
pub mod channel;
pub mod config;
pub mod content;
pub mod delivery;
pub mod error;
pub mod roster;
pub mod scheduler;
pub mod store;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::TransferCache;
    pub use crate::channel::{BotChannel, BotConfig, ChannelId, DeliveryChannel};
    pub use crate::config::Config;
    pub use crate::delivery::{DayOutcome, Deliverer, DeliveryConfig, ErrorLedger};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::roster::{Roster, Subscriber};
    pub use crate::scheduler::{DeliveryScheduler, DeliveryStats, TriggerConfig};
    pub use crate::store::{ContentStore, DiskConfig, DiskStore};
}
