//! Mockva Simulator
//!
//! Drives concurrent transfers through the engine and checks that the
//! ledger still adds up afterwards.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mockva_common::{constants, Money};
use mockva_ledger::{EngineConfig, InMemoryStore, PgStore};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// Mockva Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Concurrent load driver for the Mockva transfer engine")]
struct Args {
    /// Number of accounts to seed
    #[arg(short, long, default_value = "10")]
    accounts: usize,

    /// Number of transfers to issue
    #[arg(short, long, default_value = "1000")]
    transfers: usize,

    /// Maximum transfers in flight
    #[arg(short, long, default_value = "16")]
    concurrency: usize,

    /// Traffic shape
    #[arg(short, long, value_enum, default_value = "random")]
    scenario: Scenario,

    /// Opening balance of every seeded account
    #[arg(long, default_value = "1000.00", value_parser = parse_money)]
    initial_balance: Money,

    /// Largest single transfer
    #[arg(long, default_value = "250.00", value_parser = parse_money)]
    max_amount: Money,

    /// Bound on each transfer in milliseconds, row-lock waits included
    #[arg(long)]
    transfer_timeout_ms: Option<u64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run against PostgreSQL instead of in-memory storage
    #[arg(long)]
    database_url: Option<String>,
}

impl Args {
    fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(constants::default_transfer_timeout)
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_timeout: Some(self.transfer_timeout()),
        }
    }
}

fn parse_money(value: &str) -> Result<Money, String> {
    Money::parse(value).map_err(|e| e.to_string())
}

/// The server aborts a row-lock wait after the transfer timeout, so a
/// cancelled transfer never waits on PostgreSQL longer than that.
fn bound_lock_waits(store: PgStore, args: &Args) -> PgStore {
    store.with_lock_timeout(args.transfer_timeout())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,mockva_ledger=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Mockva Simulator");
    info!("Accounts: {}", args.accounts);
    info!("Scenario: {:?}", args.scenario);

    let mut controller = match &args.database_url {
        Some(url) => {
            let store = PgStore::connect(url, args.concurrency.max(1) as u32).await?;
            let store = bound_lock_waits(store, &args);
            store.migrate().await?;
            info!(lock_timeout = ?store.lock_timeout(), "Using PostgreSQL storage");
            SimulationController::over_store(Arc::new(store), args.engine_config(), args.seed)
        }
        None => {
            info!("Using in-memory storage");
            SimulationController::over_store(
                Arc::new(InMemoryStore::new()),
                args.engine_config(),
                args.seed,
            )
        }
    };

    controller
        .seed_accounts(args.accounts, args.initial_balance)
        .await?;
    let total_before = controller.total_balance().await?;
    info!(
        "Seeded {} accounts holding {} in total",
        controller.accounts().len(),
        total_before
    );

    let (metrics, elapsed) = controller
        .run(args.scenario, args.transfers, args.max_amount, args.concurrency)
        .await?;

    info!("Simulation complete in {:?}", elapsed);
    info!("Total transfers: {}", metrics.total_transfers);
    info!("Committed: {}", metrics.committed);
    info!("Rejected: {}", metrics.rejected);
    info!("Failed: {}", metrics.failed);
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Throughput: {:.0} transfers/s", metrics.throughput(elapsed));
    info!(
        "Latency avg/p50/p99: {}/{}/{} us",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );
    info!("Engine counters: {:?}", controller.engine_metrics());

    let verification = controller.verify(total_before).await?;
    if !verification.passed() {
        error!(
            total_before = %verification.total_before,
            total_after = %verification.total_after,
            overdrawn = ?verification.overdrawn,
            "Ledger verification failed"
        );
        anyhow::bail!("ledger verification failed");
    }

    info!("Ledger verified: total {} conserved, no overdrawn accounts", verification.total_after);
    Ok(())
}
