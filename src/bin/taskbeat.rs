//! Runs the beat loop against a `PostgreSQL` task table.
//!
//! Usage:
//!
//! ```text
//! taskbeat --database-url postgres://localhost/taskbeat --cadence-secs 60
//! ```
//!
//! Every flag can also be supplied through its environment variable. The
//! process runs until interrupted with Ctrl-C; the cycle in progress is
//! allowed to finish first.

use clap::Parser;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use std::sync::Arc;
use std::time::Duration;
use taskbeat::config::SchedulerConfig;
use taskbeat::scheduler::adapters::postgres::{PostgresTaskStore, PostgresWorkQueue};
use taskbeat::scheduler::services::{BeatCycle, BeatLoop, SchedulerContext};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "taskbeat", version, about = "Database-backed periodic task dispatcher")]
struct Args {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Seconds between beat cycles
    #[arg(long, env = "TASKBEAT_CADENCE_SECS", default_value_t = 60)]
    cadence_secs: u64,

    /// Cron tolerance in seconds; defaults to the cadence
    #[arg(long, env = "TASKBEAT_POLLING_WINDOW_SECS")]
    polling_window_secs: Option<u64>,

    /// Maximum concurrent publishes per cycle
    #[arg(long, env = "TASKBEAT_PUBLISH_CONCURRENCY", default_value_t = 8)]
    publish_concurrency: usize,

    /// Upper bound in seconds on one evaluation transaction
    #[arg(long, env = "TASKBEAT_PHASE_ONE_TIMEOUT_SECS", default_value_t = 30)]
    phase_one_timeout_secs: u64,

    /// Maximum pooled database connections
    #[arg(long, env = "TASKBEAT_POOL_SIZE", default_value_t = 4)]
    pool_size: u32,

    /// Emit logs as JSON lines
    #[arg(long, env = "TASKBEAT_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn scheduler_config(&self) -> Result<SchedulerConfig, BoxError> {
        let cadence = Duration::from_secs(self.cadence_secs);
        let polling_window = self
            .polling_window_secs
            .map_or(cadence, Duration::from_secs);
        Ok(SchedulerConfig::new(
            cadence,
            polling_window,
            self.publish_concurrency,
            Duration::from_secs(self.phase_one_timeout_secs),
        )?)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    init_tracing(args.log_json);
    let config = args.scheduler_config()?;

    let pool = Pool::builder()
        .max_size(args.pool_size)
        .build(ConnectionManager::<PgConnection>::new(&args.database_url))?;
    let context = SchedulerContext::new(
        Arc::new(PostgresTaskStore::new(pool.clone())),
        Arc::new(PostgresWorkQueue::new(pool)),
        Arc::new(DefaultClock),
        config,
    );
    let beat = BeatLoop::new(BeatCycle::new(context));

    let shutdown = CancellationToken::new();
    let on_interrupt = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for interrupt");
            return;
        }
        info!("interrupt received, stopping after the current cycle");
        on_interrupt.cancel();
    });

    beat.run(shutdown).await;
    Ok(())
}
