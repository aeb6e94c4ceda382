//! LendQ - collateralized lending core
//!
//! Users deposit a collateral asset, borrow a stable asset against it,
//! and separately supply the stable asset to a shared pool to earn
//! yield. This crate is the accounting and risk engine that keeps those
//! books consistent; transport, wallets, price feeds, and persistence
//! are external collaborators.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      LendingEngine                        │
//! │  one lock: validate -> mutate ledger+pool -> audit event  │
//! ├───────────────────────────────────────────────────────────┤
//! │  risk.rs       pure valuation: LTV, health factor         │
//! │  ledger.rs     users / deposits / loans / lots / events   │
//! │  pool.rs       total supplied / borrowed / available      │
//! │  allocator.rs  FIFO withdrawal + interest-first repayment │
//! │  accrual.rs    simple interest per loan and per lot       │
//! │  liquidation.rs sweep: health factor < 1 closes all loans │
//! └───────────────────────────────────────────────────────────┘
//!            ▲                                 ▲
//!   caller requests                  InterestWorker (scheduler.rs)
//!   deposit/borrow/repay/            ticks every `tick_seconds`:
//!   supply/withdraw                  accrue, accrue, sweep
//! ```
//!
//! The scheduler and request handlers serialize through the engine's
//! single lock, so pool scalars and loan rows never see interleaved
//! updates. All risk checks re-run under that lock immediately before
//! the write they guard.

pub mod accrual;
pub mod allocator;
pub mod clock;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod liquidation;
pub mod pool;
pub mod risk;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AssetConfig, EngineConfig, LendingEngine};
pub use error::{EngineError, Result};
pub use ledger::Ledger;
pub use pool::LiquidityPool;
pub use scheduler::{InterestWorker, TickSummary};
pub use types::*;

/// Seconds in the interest-accrual year (365 days)
pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Default accrual tick interval in seconds
pub const DEFAULT_TICK_SECONDS: u64 = 60;
