use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dripfeed::cache::TransferCache;
use dripfeed::channel::BotChannel;
use dripfeed::config::Config;
use dripfeed::delivery::{Deliverer, ErrorLedger};
use dripfeed::roster::Roster;
use dripfeed::scheduler::DeliveryScheduler;
use dripfeed::store::DiskStore;

#[derive(Parser)]
#[command(
    name = "dripfeed",
    version,
    about = "Incremental catch-up delivery of dated content packages",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (environment variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config's logging section
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the delivery scheduler until interrupted
    Run,

    /// Force a delivery run now, outside the normal cadence
    Deliver {
        /// Limit the run to specific subscribers (repeatable)
        #[arg(short, long)]
        subscriber: Vec<String>,
    },

    /// Show recorded delivery failures
    Errors {
        /// Clear the ledger after printing
        #[arg(long)]
        clear: bool,
    },
}

struct Engine {
    scheduler: Arc<DeliveryScheduler>,
    ledger: Arc<ErrorLedger>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    let verbose = cli.verbose || config.logging.level == "debug";
    setup_tracing(format, verbose)?;

    match cli.command {
        Commands::Run => run(&config).await?,
        Commands::Deliver { subscriber } => deliver(&config, subscriber).await?,
        Commands::Errors { clear } => errors(&config, clear).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("dripfeed=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("dripfeed=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let store = Arc::new(DiskStore::new(config.disk_config())?);
    let channel = Arc::new(BotChannel::new(config.bot_config())?);
    let cache = Arc::new(TransferCache::open(&config.state.cache_path).await);
    let roster = Arc::new(Roster::load(&config.state.roster_path).await?);
    let ledger = Arc::new(ErrorLedger::open(&config.state.ledger_path).await);

    let deliverer = Arc::new(Deliverer::new(
        store,
        channel,
        cache,
        roster.clone(),
        ledger.clone(),
        config.delivery_config(),
    ));
    let scheduler = Arc::new(DeliveryScheduler::new(
        deliverer,
        roster,
        config.scheduler.clone(),
    )?);

    Ok(Engine { scheduler, ledger })
}

async fn run(config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;

    engine.scheduler.start().await?;
    tracing::info!(
        trigger_time = %config.scheduler.trigger_time,
        "Scheduler running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    engine.scheduler.stop().await;

    print_ledger(&engine.ledger, false).await;
    Ok(())
}

async fn deliver(config: &Config, subscribers: Vec<String>) -> Result<()> {
    let engine = build_engine(config).await?;

    let subset = if subscribers.is_empty() {
        None
    } else {
        Some(subscribers.as_slice())
    };
    let stats = engine.scheduler.force_delivery(subset).await;

    println!("Delivery run complete");
    println!("  Subscribers: {}", stats.subscribers);
    println!("  Days delivered: {}", stats.delivered);
    println!("  Days not yet published: {}", stats.skipped);
    println!("  Days failed: {}", stats.failed);

    print_ledger(&engine.ledger, false).await;
    Ok(())
}

async fn errors(config: &Config, clear: bool) -> Result<()> {
    // Reads the ledger file directly; no store or channel client is needed.
    let ledger = ErrorLedger::open(&config.state.ledger_path).await;
    print_ledger(&ledger, clear).await;
    Ok(())
}

async fn print_ledger(ledger: &ErrorLedger, clear: bool) {
    let entries = if clear {
        ledger.take_all().await
    } else {
        ledger.entries().await
    };

    if entries.is_empty() {
        println!("No delivery failures recorded");
        return;
    }

    println!("Delivery failures ({}):", entries.len());
    for entry in entries {
        println!(
            "  {} (channel {}): {}",
            entry.subscriber, entry.channel_id, entry.message
        );
    }
}
