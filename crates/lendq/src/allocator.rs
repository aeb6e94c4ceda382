//! Withdrawal and repayment allocators.
//!
//! Both walk a user's rows in creation order and split each row's
//! reduction between its interest field and its principal. The orders
//! matter and are load-bearing:
//!
//! - pool withdrawal drains supply lots FIFO (oldest first), taking each
//!   lot's interest before its principal on a partial deduction, and
//!   removing a lot only when fully drained;
//! - repayment walks active loans in ledger order, paying interest first,
//!   then principal, closing a loan as `Repaid` once its principal falls
//!   to the dust threshold.
//!
//! Callers validate balances and cap amounts before invoking; allocators
//! assume the amount is already payable.

use crate::types::{Loan, LoanStatus, RowId, SupplyLot, UserId};

/// Deduct `amount` across a user's supply lots, oldest first.
///
/// Fully drained lots are removed from `supplies`. Partial deductions
/// come out of `interest_earned` first, principal second.
pub fn allocate_withdrawal(supplies: &mut Vec<SupplyLot>, user_id: UserId, amount: f64) {
    let mut remaining = amount;
    let mut drained: Vec<RowId> = Vec::new();

    for lot in supplies.iter_mut().filter(|s| s.user_id == user_id) {
        if remaining <= 0.0 {
            break;
        }

        let lot_total = lot.total();
        let deduction = remaining.min(lot_total);

        if deduction >= lot_total {
            drained.push(lot.id);
        } else if deduction <= lot.interest_earned {
            lot.interest_earned -= deduction;
        } else {
            let principal_cut = deduction - lot.interest_earned;
            lot.interest_earned = 0.0;
            lot.amount -= principal_cut;
        }

        remaining -= deduction;
    }

    supplies.retain(|s| !drained.contains(&s.id));
}

/// Apply a repayment across loans in ledger order, interest first.
///
/// `amount` must already be capped to the user's total debt. Returns the
/// total actually repaid (what the pool gets back).
pub fn allocate_repayment<'a>(
    loans: impl Iterator<Item = &'a mut Loan>,
    amount: f64,
    dust: f64,
) -> f64 {
    let mut remaining = amount;
    let mut total_repaid = 0.0;

    for loan in loans {
        if remaining <= 0.0 {
            break;
        }

        let payment = remaining.min(loan.total_debt());

        let mut new_interest = loan.interest_accrued - payment;
        let mut new_principal = loan.principal;
        if new_interest < 0.0 {
            new_principal += new_interest;
            new_interest = 0.0;
        }

        if new_principal <= dust {
            // Residual below the dust threshold would otherwise leave the
            // loan permanently active with near-zero debt
            loan.principal = 0.0;
            loan.interest_accrued = 0.0;
            loan.status = LoanStatus::Repaid;
        } else {
            loan.principal = new_principal;
            loan.interest_accrued = new_interest;
        }

        remaining -= payment;
        total_repaid += payment;
    }

    total_repaid
}
