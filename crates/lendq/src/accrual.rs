//! Interest accrual.
//!
//! Simple (non-compounding) interest: each pass adds
//! `principal * apy * secondsElapsed / secondsPerYear` to the row's
//! interest field and stamps `last_accrual_ts`. Accrual is applied
//! independently per loan and per supply lot - never scaled by pool
//! utilization - and interest never earns interest within a pass.
//!
//! Because the increment is proportional to elapsed time, back-to-back
//! passes are idempotent: the second pass sees a near-zero elapsed window
//! and adds a correspondingly near-zero increment.

use crate::ledger::Ledger;
use crate::types::{AccrualOutcome, Loan, SupplyLot, TimestampMs};
use crate::SECONDS_PER_YEAR;

fn simple_interest(principal: f64, apy: f64, last_ts: TimestampMs, now: TimestampMs) -> f64 {
    // Clamp negative elapsed time (clock moved backwards) to zero
    let seconds_elapsed = ((now - last_ts) as f64 / 1000.0).max(0.0);
    principal * apy * seconds_elapsed / SECONDS_PER_YEAR
}

/// Accrue one loan up to `now`. Returns the interest added.
pub fn accrue_loan(loan: &mut Loan, apy: f64, now: TimestampMs) -> f64 {
    let increment = simple_interest(loan.principal, apy, loan.last_accrual_ts, now);
    loan.interest_accrued += increment;
    loan.last_accrual_ts = now;
    increment
}

/// Accrue one supply lot up to `now`. Interest is earned on principal
/// only. Returns the interest added.
pub fn accrue_supply(lot: &mut SupplyLot, apy: f64, now: TimestampMs) -> f64 {
    let increment = simple_interest(lot.amount, apy, lot.last_accrual_ts, now);
    lot.interest_earned += increment;
    lot.last_accrual_ts = now;
    increment
}

/// Accrue every active loan up to `now`
pub fn accrue_all_loans(ledger: &mut Ledger, now: TimestampMs) -> AccrualOutcome {
    let apy = ledger.params.borrow_apy;
    let mut outcome = AccrualOutcome::default();
    for loan in ledger.all_active_loans_mut() {
        outcome.total_accrued += accrue_loan(loan, apy, now);
        outcome.updated += 1;
    }
    outcome
}

/// Accrue every supply lot up to `now`
pub fn accrue_all_supplies(ledger: &mut Ledger, now: TimestampMs) -> AccrualOutcome {
    let apy = ledger.params.supply_apy;
    let mut outcome = AccrualOutcome::default();
    for lot in ledger.all_supplies_mut() {
        outcome.total_accrued += accrue_supply(lot, apy, now);
        outcome.updated += 1;
    }
    outcome
}
