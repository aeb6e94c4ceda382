//! Interest accrual scheduler.
//!
//! One global tick: accrue loan interest, accrue supply interest, then
//! sweep for liquidations. The worker runs for the lifetime of the
//! process on a fixed `tokio` interval; a failing tick is logged and the
//! next tick runs as scheduled. The same pass is invocable on demand via
//! [`InterestWorker::run_once`], and is idempotent with respect to
//! elapsed time - a second call right after the first accrues over a
//! near-zero window.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::LendingEngine;
use crate::error::Result;
use crate::types::{AccrualOutcome, LiquidationOutcome};

/// What one tick did
#[derive(Clone, Debug, Default)]
pub struct TickSummary {
    pub loans: AccrualOutcome,
    pub supplies: AccrualOutcome,
    pub liquidated: Vec<LiquidationOutcome>,
}

/// Background accrual/liquidation worker
pub struct InterestWorker {
    engine: Arc<LendingEngine>,
    interval: Duration,
}

impl InterestWorker {
    pub fn new(engine: Arc<LendingEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Worker ticking at the engine's configured `tick_seconds`
    pub async fn from_params(engine: Arc<LendingEngine>) -> Self {
        let tick = engine.protocol_params().await.tick_seconds;
        Self::new(engine, Duration::from_secs(tick))
    }

    /// Run one accrual + liquidation pass (the manual trigger)
    pub async fn run_once(&self) -> Result<TickSummary> {
        let loans = self.engine.accrue_all_interest().await;
        if loans.updated > 0 {
            tracing::info!(
                loans = loans.updated,
                accrued = loans.total_accrued,
                "accrued loan interest"
            );
        }

        let supplies = self.engine.accrue_all_supply_interest().await;
        if supplies.updated > 0 {
            tracing::debug!(
                lots = supplies.updated,
                earned = supplies.total_accrued,
                "accrued supply interest"
            );
        }

        let liquidated = self.engine.check_liquidations().await?;
        if !liquidated.is_empty() {
            tracing::warn!(count = liquidated.len(), "liquidated positions");
        }

        Ok(TickSummary {
            loans,
            supplies,
            liquidated,
        })
    }

    /// Tick forever. A failed pass never stops the loop.
    pub async fn run(self) {
        tracing::info!(tick = ?self.interval, "interest worker started");
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip straight to steady state
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::error!("interest worker tick failed: {e}");
            }
        }
    }

    /// Run the loop on a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
