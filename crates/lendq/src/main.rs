//! LendQ - collateralized lending core
//!
//! Binary entry point: run the engine with its background interest
//! worker, or walk through a scripted demo scenario.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lendq::{
    engine::{EngineConfig, LendingEngine},
    scheduler::InterestWorker,
    DEFAULT_TICK_SECONDS,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lendq")]
#[command(about = "LendQ - collateralized lending core with continuous interest accrual")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Run the engine with the background accrual worker
    Run {
        /// Accrual tick interval in seconds
        #[arg(short, long, default_value_t = DEFAULT_TICK_SECONDS)]
        tick: u64,

        /// Pool liquidity seeded at genesis
        #[arg(short, long, default_value_t = 1_000_000.0)]
        liquidity: f64,
    },

    /// Walk through a scripted deposit/borrow/supply/withdraw scenario
    Demo,

    /// Show protocol parameters and defaults
    Info,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("lendq=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { tick, liquidity } => run_engine(tick, liquidity).await,
        Command::Demo => run_demo().await,
        Command::Info => show_info(),
    }
}

async fn run_engine(tick: u64, liquidity: f64) {
    let mut config = EngineConfig {
        bootstrap_liquidity: liquidity,
        ..Default::default()
    };
    config.params.tick_seconds = tick;
    let engine = Arc::new(LendingEngine::new(config));

    tracing::info!("LendQ engine started");
    tracing::info!("Bootstrap liquidity: {liquidity}");
    tracing::info!("Accrual tick: {tick}s");

    let worker = InterestWorker::from_params(engine.clone()).await;
    let handle = worker.spawn();

    // Periodically report pool state while the worker runs
    let mut report = tokio::time::interval(Duration::from_secs(30));
    report.tick().await;
    loop {
        report.tick().await;
        let stats = engine.pool_stats().await;
        tracing::info!(
            supplied = stats.total_supplied,
            borrowed = stats.total_borrowed,
            available = stats.available_liquidity,
            utilization = format!("{:.2}%", stats.utilization * 100.0),
            "pool"
        );
        if handle.is_finished() {
            tracing::error!("interest worker stopped unexpectedly");
            return;
        }
    }
}

async fn run_demo() {
    let engine = Arc::new(LendingEngine::new(EngineConfig::default()));
    let worker = InterestWorker::new(engine.clone(), Duration::from_secs(DEFAULT_TICK_SECONDS));

    println!("=== LendQ demo ===\n");

    let alice = engine.get_or_create_user("demo-alice").await;
    let bob = engine.get_or_create_user("demo-bob").await;

    // Bob supplies liquidity in two lots
    engine.supply(bob.id, 100.0).await.expect("supply");
    let pos = engine.supply(bob.id, 50.0).await.expect("supply");
    println!(
        "bob supplied 100 + 50 QUSD   (pool available: {:.2})",
        pos.pool.available_liquidity
    );

    // Alice deposits collateral and borrows against it
    let pos = engine.deposit(alice.id, "QX", 1000.0).await.expect("deposit");
    println!(
        "alice deposited 1000 QX      (collateral value ${:.2}, max borrow ${:.2})",
        pos.collateral.value_usd, pos.max_borrow
    );

    let pos = engine.borrow(alice.id, 5000.0).await.expect("borrow");
    println!(
        "alice borrowed 5000 QUSD     (health factor {:.3})",
        pos.health_factor.unwrap_or(f64::NAN)
    );

    // Over-borrowing is rejected with the permitted maximum
    if let Err(e) = engine.borrow(alice.id, 10_000.0).await {
        println!("alice borrowing 10000 more:  rejected ({e})");
    }

    // One manual accrual pass (elapsed time is near zero here)
    let summary = worker.run_once().await.expect("tick");
    println!(
        "manual tick:                 {} loans, {} lots accrued, {} liquidated",
        summary.loans.updated,
        summary.supplies.updated,
        summary.liquidated.len()
    );

    // Bob withdraws across his lots FIFO
    let pos = engine.withdraw(bob.id, 120.0).await.expect("withdraw");
    println!(
        "bob withdrew 120 QUSD        (remaining supplied: {:.2})",
        pos.supplied.total
    );

    // Alice repays more than she owes; the engine caps it
    let pos = engine.repay(alice.id, 10_000.0).await.expect("repay");
    println!(
        "alice repaid (capped):       status {:?}, debt {:.2}",
        pos.status, pos.borrowed.total
    );

    println!("\nAudit trail:");
    for event in engine.get_events(None).await {
        println!(
            "  [{}] user {} {:?} {}",
            event.timestamp, event.user_id, event.kind, event.payload
        );
    }
}

fn show_info() {
    let config = EngineConfig::default();
    println!("LendQ - collateralized lending core");
    println!();
    println!("Assets:");
    println!(
        "  Collateral:            {} (${})",
        config.collateral.symbol, config.collateral.price_usd
    );
    println!(
        "  Borrow/supply:         {} (${})",
        config.stable.symbol, config.stable.price_usd
    );
    println!();
    println!("Protocol parameters:");
    println!("  LTV ratio:             {}", config.params.ltv_ratio);
    println!(
        "  Liquidation threshold: {}",
        config.params.liquidation_threshold
    );
    println!("  Borrow APY:            {}", config.params.borrow_apy);
    println!("  Supply APY:            {}", config.params.supply_apy);
    println!("  Accrual tick:          {}s", config.params.tick_seconds);
    println!();
    println!("Tolerances:");
    println!(
        "  Withdraw epsilon:      ${}",
        config.tolerances.withdraw_epsilon_usd
    );
    println!("  Dust threshold:        {}", config.tolerances.dust);
}
