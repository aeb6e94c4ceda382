//! Risk engine - pure valuation and limit math.
//!
//! Every function here is a read-only function of current ledger state.
//! The engine re-runs the relevant check under its lock immediately before
//! mutating, so a stale unsynchronized read can never commit.

use crate::ledger::Ledger;
use crate::types::{Asset, UserId};

/// USD value of a user's net collateral balance
pub fn collateral_value(ledger: &Ledger, collateral: &Asset, user_id: UserId) -> f64 {
    ledger.net_deposited(user_id, collateral.id) * collateral.price_usd
}

/// Total outstanding debt: principal plus accrued interest over active loans
pub fn borrowed_value(ledger: &Ledger, user_id: UserId) -> f64 {
    ledger
        .user_active_loans(user_id)
        .iter()
        .map(|l| l.total_debt())
        .sum()
}

/// Maximum borrowable USD value at the configured LTV
pub fn max_borrow(ledger: &Ledger, collateral: &Asset, user_id: UserId) -> f64 {
    collateral_value(ledger, collateral, user_id) * ledger.params.ltv_ratio
}

/// Health factor: `collateral * liquidation_threshold / debt`.
///
/// `None` when the user has no outstanding debt - there is nothing to be
/// liquidated, so the ratio is undefined rather than infinite.
pub fn health_factor(ledger: &Ledger, collateral: &Asset, user_id: UserId) -> Option<f64> {
    let borrowed = borrowed_value(ledger, user_id);
    if borrowed == 0.0 {
        return None;
    }
    let threshold_value =
        collateral_value(ledger, collateral, user_id) * ledger.params.liquidation_threshold;
    Some(threshold_value / borrowed)
}

/// A position is liquidatable when its health factor has dropped below 1.0
pub fn is_liquidatable(ledger: &Ledger, collateral: &Asset, user_id: UserId) -> bool {
    health_factor(ledger, collateral, user_id).is_some_and(|hf| hf < 1.0)
}

/// Collateral (asset units) removable while keeping the position within
/// its LTV limit: `collateralValue - borrowedValue / ltv_ratio` converted
/// at the collateral price. Clamped to `[0, net balance]`.
pub fn max_safe_withdrawal(ledger: &Ledger, collateral: &Asset, user_id: UserId) -> f64 {
    let balance = ledger.net_deposited(user_id, collateral.id);
    let borrowed = borrowed_value(ledger, user_id);
    if borrowed == 0.0 {
        return balance;
    }
    let removable_usd =
        collateral_value(ledger, collateral, user_id) - borrowed / ledger.params.ltv_ratio;
    (removable_usd / collateral.price_usd).clamp(0.0, balance)
}
