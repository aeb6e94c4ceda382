//! Error types for the lending core.
//!
//! Every engine operation either completes its transaction fully or
//! returns one of these without any observable state change.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("insufficient collateral: max permitted is {max:.6} {symbol}")]
    InsufficientCollateral { max: f64, symbol: String },

    #[error("insufficient liquidity in pool: available {available:.2}")]
    InsufficientLiquidity { available: f64 },

    #[error("insufficient balance: you have {balance:.6} {symbol}")]
    InsufficientBalance { balance: f64, symbol: String },

    #[error("no active loans to repay")]
    NoActiveLoans,

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid protocol parameters: require 0 < ltv < liquidation_threshold <= 1")]
    InvalidParams,
}

pub type Result<T> = std::result::Result<T, EngineError>;
