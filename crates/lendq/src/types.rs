//! Core types for the lending ledger.
//!
//! Everything here is plain data: rows owned by the position ledger, the
//! protocol parameters, and the snapshot types handed back to callers.
//! The engine in `engine.rs` is the only writer.

use serde::{Deserialize, Serialize};

/// Row identifier (unique per table, monotonically assigned)
pub type RowId = u64;

/// User identifier
pub type UserId = u64;

/// Asset identifier
pub type AssetId = u64;

/// Unix timestamp in milliseconds
pub type TimestampMs = i64;

// ============================================================================
// Ledger rows
// ============================================================================

/// A user, keyed externally by wallet address
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub wallet_address: String,
    pub created_at: TimestampMs,
}

/// An asset known to the registry
///
/// Exactly two exist in practice: the collateral asset and the
/// borrow/supply asset. `price_usd` is mutated only via the external
/// price-update call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub decimals: u8,
}

/// A collateral movement. Withdrawals are negative-amount rows; a user's
/// net balance for an asset is the sum of their rows for that asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub id: RowId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub amount: f64,
    pub timestamp: TimestampMs,
}

/// Loan status lifecycle. Terminal states are immutable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Repaid,
    Liquidated,
}

/// A single loan. A user may hold several concurrent active loans;
/// total debt is the sum of `principal + interest_accrued` over them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Loan {
    pub id: RowId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub principal: f64,
    pub interest_accrued: f64,
    pub status: LoanStatus,
    pub created_at: TimestampMs,
    pub last_accrual_ts: TimestampMs,
}

impl Loan {
    /// Outstanding debt on this loan
    pub fn total_debt(&self) -> f64 {
        self.principal + self.interest_accrued
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// One supply lot. Each `supply` call creates a new lot; lots accrue
/// interest independently and are drained oldest-first on withdrawal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplyLot {
    pub id: RowId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub amount: f64,
    pub interest_earned: f64,
    pub created_at: TimestampMs,
    pub last_accrual_ts: TimestampMs,
}

impl SupplyLot {
    /// Principal plus earned interest
    pub fn total(&self) -> f64 {
        self.amount + self.interest_earned
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Admin-mutable protocol parameters.
///
/// Constraint: `0 < ltv_ratio < liquidation_threshold <= 1`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Max fraction of collateral USD value that may be borrowed
    pub ltv_ratio: f64,
    /// Fraction of collateral value in the health-factor numerator
    pub liquidation_threshold: f64,
    /// Annual borrow rate (simple interest)
    pub borrow_apy: f64,
    /// Annual supply rate (simple interest)
    pub supply_apy: f64,
    /// Accrual tick interval for the background worker
    pub tick_seconds: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            ltv_ratio: 0.75,
            liquidation_threshold: 0.85,
            borrow_apy: 0.05,
            supply_apy: 0.03,
            tick_seconds: crate::DEFAULT_TICK_SECONDS,
        }
    }
}

impl ProtocolParams {
    /// Check the parameter constraints
    pub fn is_valid(&self) -> bool {
        self.ltv_ratio > 0.0
            && self.ltv_ratio < self.liquidation_threshold
            && self.liquidation_threshold <= 1.0
            && self.borrow_apy >= 0.0
            && self.supply_apy >= 0.0
            && self.tick_seconds > 0
    }
}

/// Numeric tolerances. Implementation-chosen, not protocol parameters,
/// so they are configurable rather than hard-coded.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Tolerances {
    /// Slack (USD) allowed past the LTV boundary on collateral withdrawal,
    /// absorbing float round-off
    pub withdraw_epsilon_usd: f64,
    /// Residual at or below this is treated as zero
    pub dust: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            withdraw_epsilon_usd: 0.001,
            dust: 1e-6,
        }
    }
}

// ============================================================================
// Audit events
// ============================================================================

/// Audit event kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserCreated,
    Deposit,
    WithdrawCollateral,
    Borrow,
    Repay,
    Supply,
    Withdraw,
    Liquidation,
    ParamsUpdated,
}

/// Append-only audit log entry. Never mutated or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: RowId,
    pub user_id: UserId,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub timestamp: TimestampMs,
}

// ============================================================================
// Snapshot types returned to callers
// ============================================================================

/// Position status tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    NoLoan,
    Active,
    Liquidated,
}

/// Collateral side of a position snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollateralPosition {
    /// Net deposited amount in collateral asset units
    pub amount: f64,
    pub value_usd: f64,
}

/// Per-loan line in a position snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoanBreakdown {
    pub id: RowId,
    pub principal: f64,
    pub interest: f64,
    pub total: f64,
}

/// Borrow side of a position snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BorrowedPosition {
    pub total: f64,
    pub loans: Vec<LoanBreakdown>,
}

/// Supply side of a position snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuppliedPosition {
    pub total: f64,
    pub principal: f64,
    pub interest_earned: f64,
    pub apy: f64,
}

/// Pool aggregates as seen by callers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_supplied: f64,
    pub total_borrowed: f64,
    pub available_liquidity: f64,
    /// `total_borrowed / total_supplied`, 0 when nothing is supplied
    pub utilization: f64,
}

/// Full position snapshot, returned by every mutating call and by
/// `get_user_position`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserPosition {
    pub collateral: CollateralPosition,
    pub borrowed: BorrowedPosition,
    pub supplied: SuppliedPosition,
    pub pool: PoolStats,
    pub params: ProtocolParams,
    pub max_borrow: f64,
    /// `min(max_borrow - borrowed, available_liquidity)`, floored at 0
    pub available_to_borrow: f64,
    /// `None` when the user has no outstanding debt
    pub health_factor: Option<f64>,
    pub status: PositionStatus,
}

// ============================================================================
// Sweep outcomes
// ============================================================================

/// Result of one accrual pass over loans or supply lots
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    /// Rows the pass touched
    pub updated: usize,
    /// Interest added across all rows
    pub total_accrued: f64,
}

/// One liquidated user from a liquidation sweep
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub user_id: UserId,
    /// The health factor that triggered the liquidation
    pub health_factor: f64,
}
