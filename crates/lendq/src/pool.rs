//! Liquidity pool accumulator.
//!
//! A singleton aggregate of what the pool holds. Every mutation keeps the
//! identity `available_liquidity == total_supplied - total_borrowed`; the
//! engine updates the pool under the same lock as the ledger rows so the
//! three scalars are never observed mid-update.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::PoolStats;

/// The singleton liquidity pool.
///
/// Invariant: `available_liquidity == total_supplied - total_borrowed`
/// and `available_liquidity >= 0` at all times.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub total_supplied: f64,
    pub total_borrowed: f64,
    pub available_liquidity: f64,
}

impl LiquidityPool {
    /// Pool seeded with bootstrap liquidity not attributed to any lot
    pub fn seeded(bootstrap_liquidity: f64) -> Self {
        Self {
            total_supplied: bootstrap_liquidity,
            total_borrowed: 0.0,
            available_liquidity: bootstrap_liquidity,
        }
    }

    /// `total_borrowed / total_supplied`, 0 when nothing is supplied
    pub fn utilization(&self) -> f64 {
        if self.total_supplied > 0.0 {
            self.total_borrowed / self.total_supplied
        } else {
            0.0
        }
    }

    /// Record a supply: raises total supplied and available liquidity
    pub fn apply_supply(&mut self, amount: f64) {
        self.total_supplied += amount;
        self.available_liquidity += amount;
    }

    /// Record a supply withdrawal. Rejects when the pool cannot cover it.
    pub fn apply_withdraw(&mut self, amount: f64) -> Result<()> {
        if amount > self.available_liquidity {
            return Err(EngineError::InsufficientLiquidity {
                available: self.available_liquidity,
            });
        }
        self.total_supplied -= amount;
        self.available_liquidity -= amount;
        Ok(())
    }

    /// Record a borrow. Rejects when the pool cannot cover it.
    pub fn apply_borrow(&mut self, amount: f64) -> Result<()> {
        if amount > self.available_liquidity {
            return Err(EngineError::InsufficientLiquidity {
                available: self.available_liquidity,
            });
        }
        self.total_borrowed += amount;
        self.available_liquidity -= amount;
        Ok(())
    }

    /// Record a repayment by the amount actually repaid (after capping),
    /// not the amount requested
    pub fn apply_repay(&mut self, amount_repaid: f64) {
        self.total_borrowed -= amount_repaid;
        self.available_liquidity += amount_repaid;
    }

    /// The pool identity, modulo float round-off
    pub fn invariant_holds(&self) -> bool {
        (self.available_liquidity - (self.total_supplied - self.total_borrowed)).abs() < 1e-6
            && self.available_liquidity >= -1e-6
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_supplied: self.total_supplied,
            total_borrowed: self.total_borrowed,
            available_liquidity: self.available_liquidity,
            utilization: self.utilization(),
        }
    }
}
