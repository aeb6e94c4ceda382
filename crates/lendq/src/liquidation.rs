//! Liquidation sweep.
//!
//! After each accrual pass the scheduler walks every user holding active
//! loans, computes their health factor, and - when it has dropped below
//! 1.0 - flips all of that user's active loans to `Liquidated` in one
//! step. There is no partial liquidation. Liquidated loans stop accruing
//! and stop counting toward debt; collateral seizure is not this core's
//! concern.

use serde_json::json;

use crate::ledger::Ledger;
use crate::risk;
use crate::types::{Asset, EventKind, LiquidationOutcome, LoanStatus, TimestampMs};

/// Run one liquidation sweep. Returns the users liquidated this pass,
/// each with the health factor that triggered it.
pub fn sweep(ledger: &mut Ledger, collateral: &Asset, now: TimestampMs) -> Vec<LiquidationOutcome> {
    let mut liquidated = Vec::new();

    for user_id in ledger.users_with_active_loans() {
        let Some(hf) = risk::health_factor(ledger, collateral, user_id) else {
            continue;
        };
        if hf >= 1.0 {
            continue;
        }

        for loan in ledger.user_active_loans_mut(user_id) {
            loan.status = LoanStatus::Liquidated;
        }
        ledger.record_event(
            user_id,
            EventKind::Liquidation,
            json!({ "health_factor": hf }),
            now,
        );

        tracing::warn!(user_id, health_factor = hf, "position liquidated");
        liquidated.push(LiquidationOutcome {
            user_id,
            health_factor: hf,
        });
    }

    liquidated
}
