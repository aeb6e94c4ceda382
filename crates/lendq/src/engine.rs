//! The lending engine - transactional facade over ledger, pool, and risk.
//!
//! Every user-facing operation locks the ledger once, validates against
//! the state it just read, applies the ledger mutation and the pool
//! update under that same guard, and appends an audit event. Validation
//! and mutation are one atomic unit: an operation either commits fully
//! or returns an error with no observable change. The background accrual
//! worker serializes through the same lock, so a tick and a user
//! operation never interleave on the pool scalars or on a loan row.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;

use crate::accrual;
use crate::allocator;
use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::ledger::Ledger;
use crate::liquidation;
use crate::pool::LiquidityPool;
use crate::risk;
use crate::types::*;

/// System actor id for admin events (price/parameter updates)
const SYSTEM_USER: UserId = 0;

/// Seed definition for one registry asset
#[derive(Clone, Debug)]
pub struct AssetConfig {
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub decimals: u8,
}

/// Engine construction parameters
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub params: ProtocolParams,
    pub tolerances: Tolerances,
    /// The single collateral asset
    pub collateral: AssetConfig,
    /// The single borrow/supply asset
    pub stable: AssetConfig,
    /// Pool liquidity present at genesis, not attributed to any lot
    pub bootstrap_liquidity: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: ProtocolParams::default(),
            tolerances: Tolerances::default(),
            collateral: AssetConfig {
                symbol: "QX".into(),
                name: "Qubic".into(),
                price_usd: 10.0,
                decimals: 18,
            },
            stable: AssetConfig {
                symbol: "QUSD".into(),
                name: "Qubic Dollar".into(),
                price_usd: 1.0,
                decimals: 18,
            },
            bootstrap_liquidity: 1_000_000.0,
        }
    }
}

/// The lending core. Cheap to share: wrap in `Arc` and hand a clone to
/// the scheduler and to each caller.
pub struct LendingEngine {
    ledger: Mutex<Ledger>,
    clock: Arc<dyn Clock>,
    tolerances: Tolerances,
    collateral_symbol: String,
    stable_symbol: String,
}

impl LendingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Engine with an injected clock, for deterministic tests
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let mut ledger = Ledger::new(config.params);
        for seed in [&config.collateral, &config.stable] {
            ledger.register_asset(&seed.symbol, &seed.name, seed.price_usd, seed.decimals);
        }
        ledger.pool = LiquidityPool::seeded(config.bootstrap_liquidity);

        Self {
            ledger: Mutex::new(ledger),
            clock,
            tolerances: config.tolerances,
            collateral_symbol: config.collateral.symbol,
            stable_symbol: config.stable.symbol,
        }
    }

    fn check_amount(amount: f64) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::InvalidAmount(amount));
        }
        Ok(())
    }

    fn collateral_asset(&self, ledger: &Ledger) -> Result<Asset> {
        ledger
            .asset(&self.collateral_symbol)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(self.collateral_symbol.clone()))
    }

    fn stable_asset(&self, ledger: &Ledger) -> Result<Asset> {
        ledger
            .asset(&self.stable_symbol)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(self.stable_symbol.clone()))
    }

    // ------------------------------------------------------------------
    // Users and registry
    // ------------------------------------------------------------------

    /// Look a user up by wallet address, creating them on first sight
    pub async fn get_or_create_user(&self, wallet: &str) -> User {
        let mut ledger = self.ledger.lock().await;
        if let Some(user) = ledger.user_by_wallet(wallet) {
            return user.clone();
        }
        let now = self.clock.now_ms();
        let user = ledger.create_user(wallet, now);
        ledger.record_event(
            user.id,
            EventKind::UserCreated,
            json!({ "wallet_address": wallet }),
            now,
        );
        tracing::info!(user_id = user.id, wallet, "user created");
        user
    }

    /// Admin: set an asset price
    pub async fn update_asset_price(&self, symbol: &str, price_usd: f64) -> Result<Asset> {
        Self::check_amount(price_usd)?;
        let mut ledger = self.ledger.lock().await;
        ledger
            .update_asset_price(symbol, price_usd)
            .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))
    }

    /// Admin: replace the protocol parameters
    pub async fn update_protocol_params(&self, params: ProtocolParams) -> Result<ProtocolParams> {
        if !params.is_valid() {
            return Err(EngineError::InvalidParams);
        }
        let mut ledger = self.ledger.lock().await;
        ledger.params = params;
        let now = self.clock.now_ms();
        ledger.record_event(
            SYSTEM_USER,
            EventKind::ParamsUpdated,
            json!({
                "ltv_ratio": params.ltv_ratio,
                "liquidation_threshold": params.liquidation_threshold,
                "borrow_apy": params.borrow_apy,
                "supply_apy": params.supply_apy,
                "tick_seconds": params.tick_seconds,
            }),
            now,
        );
        Ok(params)
    }

    pub async fn protocol_params(&self) -> ProtocolParams {
        self.ledger.lock().await.params
    }

    pub async fn get_asset(&self, symbol: &str) -> Result<Asset> {
        let ledger = self.ledger.lock().await;
        ledger
            .asset(symbol)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))
    }

    // ------------------------------------------------------------------
    // Collateral
    // ------------------------------------------------------------------

    /// Deposit collateral
    pub async fn deposit(&self, user_id: UserId, symbol: &str, amount: f64) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;
        let asset = ledger
            .asset(symbol)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))?;

        let now = self.clock.now_ms();
        ledger.create_deposit(user_id, asset.id, amount, now);
        ledger.record_event(
            user_id,
            EventKind::Deposit,
            json!({ "symbol": symbol, "amount": amount }),
            now,
        );
        tracing::debug!(user_id, symbol, amount, "collateral deposited");
        self.position(&ledger, user_id)
    }

    /// Withdraw collateral, subject to the balance and LTV checks.
    ///
    /// Recorded as a negative-amount deposit row, keeping the full
    /// deposit/withdrawal history as the audit trail.
    pub async fn withdraw_collateral(
        &self,
        user_id: UserId,
        symbol: &str,
        amount: f64,
    ) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;
        let asset = ledger
            .asset(symbol)
            .cloned()
            .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))?;

        let balance = ledger.net_deposited(user_id, asset.id);
        if amount > balance {
            return Err(EngineError::InsufficientBalance {
                balance,
                symbol: symbol.to_string(),
            });
        }

        let collateral = self.collateral_asset(&ledger)?;
        let borrowed = risk::borrowed_value(&ledger, user_id);

        // Dust debt is ignored; anything real must stay inside the LTV
        // limit after the withdrawal, modulo the float epsilon.
        if borrowed > self.tolerances.dust {
            let withdraw_value_usd = amount * asset.price_usd;
            let new_collateral_value =
                risk::collateral_value(&ledger, &collateral, user_id) - withdraw_value_usd;
            let max_borrow_after = new_collateral_value * ledger.params.ltv_ratio;

            if borrowed > max_borrow_after + self.tolerances.withdraw_epsilon_usd {
                return Err(EngineError::InsufficientCollateral {
                    max: risk::max_safe_withdrawal(&ledger, &collateral, user_id),
                    symbol: collateral.symbol.clone(),
                });
            }
        }

        let now = self.clock.now_ms();
        ledger.create_deposit(user_id, asset.id, -amount, now);
        ledger.record_event(
            user_id,
            EventKind::WithdrawCollateral,
            json!({ "symbol": symbol, "amount": amount }),
            now,
        );
        tracing::debug!(user_id, symbol, amount, "collateral withdrawn");
        self.position(&ledger, user_id)
    }

    // ------------------------------------------------------------------
    // Borrow / repay
    // ------------------------------------------------------------------

    /// Borrow the stable asset against deposited collateral
    pub async fn borrow(&self, user_id: UserId, amount: f64) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;
        let collateral = self.collateral_asset(&ledger)?;
        let stable = self.stable_asset(&ledger)?;

        let collateral_value = risk::collateral_value(&ledger, &collateral, user_id);
        if collateral_value == 0.0 {
            return Err(EngineError::InsufficientCollateral {
                max: 0.0,
                symbol: stable.symbol.clone(),
            });
        }

        let max_borrow = risk::max_borrow(&ledger, &collateral, user_id);
        let borrowed = risk::borrowed_value(&ledger, user_id);
        let available_to_borrow = max_borrow - borrowed;
        if amount > available_to_borrow {
            return Err(EngineError::InsufficientCollateral {
                max: available_to_borrow.max(0.0),
                symbol: stable.symbol.clone(),
            });
        }

        // Pool check-and-update rejects before touching anything
        ledger.pool.apply_borrow(amount)?;

        let now = self.clock.now_ms();
        ledger.create_loan(user_id, stable.id, amount, now);
        ledger.record_event(user_id, EventKind::Borrow, json!({ "amount": amount }), now);
        tracing::info!(user_id, amount, "loan opened");
        self.position(&ledger, user_id)
    }

    /// Repay outstanding debt. Overpayment is silently capped to the
    /// total owed; the pool gets back exactly what was repaid.
    pub async fn repay(&self, user_id: UserId, amount: f64) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;
        if ledger.user_active_loans(user_id).is_empty() {
            return Err(EngineError::NoActiveLoans);
        }

        let total_debt = risk::borrowed_value(&ledger, user_id);
        let capped = amount.min(total_debt);

        let repaid = allocator::allocate_repayment(
            ledger.user_active_loans_mut(user_id),
            capped,
            self.tolerances.dust,
        );
        ledger.pool.apply_repay(repaid);

        let now = self.clock.now_ms();
        ledger.record_event(user_id, EventKind::Repay, json!({ "amount": repaid }), now);
        tracing::info!(user_id, repaid, "loan repaid");
        self.position(&ledger, user_id)
    }

    // ------------------------------------------------------------------
    // Supply / withdraw
    // ------------------------------------------------------------------

    /// Supply the stable asset to the pool. Each call opens a new lot.
    pub async fn supply(&self, user_id: UserId, amount: f64) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;
        let stable = self.stable_asset(&ledger)?;

        let now = self.clock.now_ms();
        ledger.create_supply(user_id, stable.id, amount, now);
        ledger.pool.apply_supply(amount);
        ledger.record_event(user_id, EventKind::Supply, json!({ "amount": amount }), now);
        tracing::debug!(user_id, amount, "liquidity supplied");
        self.position(&ledger, user_id)
    }

    /// Withdraw from the pool, draining the user's lots FIFO
    pub async fn withdraw(&self, user_id: UserId, amount: f64) -> Result<UserPosition> {
        Self::check_amount(amount)?;
        let mut ledger = self.ledger.lock().await;

        let supplied = ledger.user_supplied_total(user_id);
        if amount > supplied {
            return Err(EngineError::InsufficientBalance {
                balance: supplied,
                symbol: self.stable_symbol.clone(),
            });
        }

        // Pool update first: it is the fallible step, and under the lock
        // the order of the two mutations is unobservable
        ledger.pool.apply_withdraw(amount)?;
        allocator::allocate_withdrawal(ledger.supplies_mut(), user_id, amount);

        let now = self.clock.now_ms();
        ledger.record_event(user_id, EventKind::Withdraw, json!({ "amount": amount }), now);
        tracing::debug!(user_id, amount, "liquidity withdrawn");
        self.position(&ledger, user_id)
    }

    // ------------------------------------------------------------------
    // Accrual and liquidation (scheduler entry points)
    // ------------------------------------------------------------------

    /// Accrue interest on every active loan up to now
    pub async fn accrue_all_interest(&self) -> AccrualOutcome {
        let mut ledger = self.ledger.lock().await;
        accrual::accrue_all_loans(&mut ledger, self.clock.now_ms())
    }

    /// Accrue interest on every supply lot up to now
    pub async fn accrue_all_supply_interest(&self) -> AccrualOutcome {
        let mut ledger = self.ledger.lock().await;
        accrual::accrue_all_supplies(&mut ledger, self.clock.now_ms())
    }

    /// Run a liquidation sweep over all borrowers
    pub async fn check_liquidations(&self) -> Result<Vec<LiquidationOutcome>> {
        let mut ledger = self.ledger.lock().await;
        let collateral = self.collateral_asset(&ledger)?;
        Ok(liquidation::sweep(&mut ledger, &collateral, self.clock.now_ms()))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Full position snapshot for a user
    pub async fn get_user_position(&self, user_id: UserId) -> Result<UserPosition> {
        let ledger = self.ledger.lock().await;
        self.position(&ledger, user_id)
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.ledger.lock().await.pool.stats()
    }

    /// Most recent audit events, default limit 100
    pub async fn get_events(&self, limit: Option<usize>) -> Vec<Event> {
        let ledger = self.ledger.lock().await;
        ledger.events(limit.unwrap_or(100)).to_vec()
    }

    fn position(&self, ledger: &Ledger, user_id: UserId) -> Result<UserPosition> {
        let collateral = self.collateral_asset(ledger)?;

        let collateral_amount = ledger.net_deposited(user_id, collateral.id);
        let collateral_value = collateral_amount * collateral.price_usd;
        let borrowed = risk::borrowed_value(ledger, user_id);
        let max_borrow = risk::max_borrow(ledger, &collateral, user_id);
        let health_factor = risk::health_factor(ledger, &collateral, user_id);

        let loans = ledger
            .user_active_loans(user_id)
            .iter()
            .map(|l| LoanBreakdown {
                id: l.id,
                principal: l.principal,
                interest: l.interest_accrued,
                total: l.total_debt(),
            })
            .collect();

        let (supplied_principal, supplied_interest) = ledger.user_supplied_split(user_id);
        let pool = ledger.pool.stats();

        let status = match health_factor {
            None => PositionStatus::NoLoan,
            Some(hf) if hf < 1.0 => PositionStatus::Liquidated,
            Some(_) => PositionStatus::Active,
        };

        Ok(UserPosition {
            collateral: CollateralPosition {
                amount: collateral_amount,
                value_usd: collateral_value,
            },
            borrowed: BorrowedPosition {
                total: borrowed,
                loans,
            },
            supplied: SuppliedPosition {
                total: supplied_principal + supplied_interest,
                principal: supplied_principal,
                interest_earned: supplied_interest,
                apy: ledger.params.supply_apy,
            },
            available_to_borrow: (max_borrow - borrowed).min(pool.available_liquidity).max(0.0),
            pool,
            params: ledger.params,
            max_borrow,
            health_factor,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    /// Engine with QX at $1 so collateral units equal USD in assertions
    fn test_engine() -> (Arc<LendingEngine>, ManualClock) {
        let clock = ManualClock::new(0);
        let mut config = EngineConfig::default();
        config.collateral.price_usd = 1.0;
        let engine = Arc::new(LendingEngine::with_clock(config, Arc::new(clock.clone())));
        (engine, clock)
    }

    async fn pool_invariant_holds(engine: &LendingEngine) -> bool {
        let ledger = engine.ledger.lock().await;
        ledger.pool.invariant_holds()
    }

    #[tokio::test]
    async fn get_or_create_user_is_idempotent() {
        let (engine, _) = test_engine();
        let a = engine.get_or_create_user("wallet-1").await;
        let b = engine.get_or_create_user("wallet-1").await;
        let c = engine.get_or_create_user("wallet-2").await;
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);

        // Only one user_created event for the repeated wallet
        let events = engine.get_events(None).await;
        let created = events
            .iter()
            .filter(|e| e.kind == EventKind::UserCreated)
            .count();
        assert_eq!(created, 2);
    }

    #[tokio::test]
    async fn borrow_up_to_ltv_boundary() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();

        // 751 exceeds the 75% LTV limit
        let err = engine.borrow(user.id, 751.0).await.unwrap_err();
        match err {
            EngineError::InsufficientCollateral { max, .. } => {
                assert!((max - 750.0).abs() < 1e-9)
            }
            other => panic!("unexpected error: {other}"),
        }

        // 750 is exactly at the limit
        let pos = engine.borrow(user.id, 750.0).await.unwrap();
        assert_eq!(pos.borrowed.total, 750.0);
        assert!(pos.health_factor.unwrap() >= 1.0);
        assert_eq!(pos.status, PositionStatus::Active);
        assert!(pool_invariant_holds(&engine).await);
    }

    #[tokio::test]
    async fn borrow_without_collateral_is_rejected() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        let err = engine.borrow(user.id, 10.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCollateral { .. }));
    }

    #[tokio::test]
    async fn borrow_rejected_beyond_pool_liquidity() {
        let clock = ManualClock::new(0);
        let mut config = EngineConfig::default();
        config.collateral.price_usd = 1.0;
        config.bootstrap_liquidity = 100.0;
        let engine = LendingEngine::with_clock(config, Arc::new(clock));

        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();

        let err = engine.borrow(user.id, 200.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientLiquidity { .. }));

        // Rejection left no partial state behind
        let pos = engine.get_user_position(user.id).await.unwrap();
        assert_eq!(pos.borrowed.total, 0.0);
        assert_eq!(pos.pool.total_borrowed, 0.0);
    }

    #[tokio::test]
    async fn withdraw_collateral_to_the_ltv_boundary() {
        // Collateral $20,000 (2000 QX at $10), borrowed $7,500 at 75% LTV:
        // required collateral is $10,000, so exactly 1000 QX may leave.
        let clock = ManualClock::new(0);
        let engine = LendingEngine::with_clock(EngineConfig::default(), Arc::new(clock));
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 2000.0).await.unwrap();
        engine.borrow(user.id, 7500.0).await.unwrap();

        let pos = engine.withdraw_collateral(user.id, "QX", 1000.0).await.unwrap();
        assert_eq!(pos.collateral.amount, 1000.0);
        assert!(pos.health_factor.unwrap() >= 1.0);

        // One more dollar's worth (0.1 QX) crosses the boundary
        let err = engine
            .withdraw_collateral(user.id, "QX", 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCollateral { .. }));
    }

    #[tokio::test]
    async fn withdraw_collateral_ltv_check_allows_the_float_epsilon() {
        // Same position as above: 1000 QX at $10 is the exact boundary.
        // The LTV check tolerates 0.001 USD of slack past it.
        let clock = ManualClock::new(0);
        let engine = LendingEngine::with_clock(EngineConfig::default(), Arc::new(clock));
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 2000.0).await.unwrap();
        engine.borrow(user.id, 7500.0).await.unwrap();

        // $0.0005 past the boundary sits inside the band
        let pos = engine
            .withdraw_collateral(user.id, "QX", 1000.00005)
            .await
            .unwrap();
        assert!((pos.collateral.amount - 999.99995).abs() < 1e-9);

        // $0.002 more is a real violation
        let err = engine
            .withdraw_collateral(user.id, "QX", 0.0002)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCollateral { .. }));
    }

    #[tokio::test]
    async fn withdraw_collateral_beyond_balance_is_rejected() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 100.0).await.unwrap();

        let err = engine
            .withdraw_collateral(user.id, "QX", 100.5)
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientBalance { balance, .. } => assert_eq!(balance, 100.0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn withdraw_collateral_free_when_debt_is_dust() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 100.0).await.unwrap();

        // No debt at all: full balance is withdrawable
        let pos = engine
            .withdraw_collateral(user.id, "QX", 100.0)
            .await
            .unwrap();
        assert_eq!(pos.collateral.amount, 0.0);
    }

    #[tokio::test]
    async fn overpayment_is_capped_to_total_debt() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();
        engine.borrow(user.id, 50.0).await.unwrap();

        let before = engine.pool_stats().await;
        let pos = engine.repay(user.id, 100.0).await.unwrap();

        assert!(pos.borrowed.loans.is_empty());
        assert_eq!(pos.status, PositionStatus::NoLoan);

        // Exactly 50 moved back, not 100
        let after = engine.pool_stats().await;
        assert!((before.total_borrowed - after.total_borrowed - 50.0).abs() < 1e-9);
        assert!((after.available_liquidity - before.available_liquidity - 50.0).abs() < 1e-9);

        let events = engine.get_events(None).await;
        let repay = events.iter().find(|e| e.kind == EventKind::Repay).unwrap();
        assert_eq!(repay.payload["amount"].as_f64().unwrap(), 50.0);
    }

    #[tokio::test]
    async fn repay_without_loans_is_rejected() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        let err = engine.repay(user.id, 10.0).await.unwrap_err();
        assert_eq!(err, EngineError::NoActiveLoans);
    }

    #[tokio::test]
    async fn supply_then_fifo_withdraw_leaves_second_lot_remainder() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.supply(user.id, 100.0).await.unwrap();
        engine.supply(user.id, 50.0).await.unwrap();

        let pos = engine.withdraw(user.id, 120.0).await.unwrap();
        assert!((pos.supplied.total - 30.0).abs() < 1e-9);
        assert!((pos.supplied.principal - 30.0).abs() < 1e-9);
        assert!(pool_invariant_holds(&engine).await);
    }

    #[tokio::test]
    async fn withdraw_beyond_supplied_is_rejected() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.supply(user.id, 100.0).await.unwrap();

        let err = engine.withdraw(user.id, 150.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn withdraw_beyond_pool_liquidity_is_rejected() {
        let clock = ManualClock::new(0);
        let mut config = EngineConfig::default();
        config.collateral.price_usd = 1.0;
        config.bootstrap_liquidity = 0.0;
        let engine = LendingEngine::with_clock(config, Arc::new(clock));

        let supplier = engine.get_or_create_user("supplier").await;
        let borrower = engine.get_or_create_user("borrower").await;
        engine.supply(supplier.id, 100.0).await.unwrap();
        engine.deposit(borrower.id, "QX", 1000.0).await.unwrap();
        engine.borrow(borrower.id, 80.0).await.unwrap();

        // Supplier owns 100 but the pool only has 20 liquid
        let err = engine.withdraw(supplier.id, 50.0).await.unwrap_err();
        match err {
            EngineError::InsufficientLiquidity { available } => {
                assert!((available - 20.0).abs() < 1e-9)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_at_the_boundary() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                engine.deposit(user.id, "QX", bad).await,
                Err(EngineError::InvalidAmount(_))
            ));
            assert!(matches!(
                engine.supply(user.id, bad).await,
                Err(EngineError::InvalidAmount(_))
            ));
        }
    }

    #[tokio::test]
    async fn unknown_asset_is_rejected() {
        let (engine, _) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        let err = engine.deposit(user.id, "ETH", 1.0).await.unwrap_err();
        assert_eq!(err, EngineError::AssetNotFound("ETH".into()));
    }

    #[tokio::test]
    async fn accrual_then_liquidation_via_engine() {
        let (engine, clock) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();
        engine.borrow(user.id, 700.0).await.unwrap();

        clock.advance_secs(3600);
        let outcome = engine.accrue_all_interest().await;
        assert_eq!(outcome.updated, 1);
        assert!(outcome.total_accrued > 0.0);

        // Healthy at current price
        assert!(engine.check_liquidations().await.unwrap().is_empty());

        // Collateral price halves; the sweep takes the position
        engine.update_asset_price("QX", 0.5).await.unwrap();
        let liquidated = engine.check_liquidations().await.unwrap();
        assert_eq!(liquidated.len(), 1);
        assert_eq!(liquidated[0].user_id, user.id);

        let pos = engine.get_user_position(user.id).await.unwrap();
        assert_eq!(pos.status, PositionStatus::NoLoan);
        assert!(pos.borrowed.loans.is_empty());
    }

    #[tokio::test]
    async fn zero_elapsed_accrual_is_idempotent() {
        let (engine, clock) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();
        engine.borrow(user.id, 500.0).await.unwrap();
        engine.supply(user.id, 200.0).await.unwrap();

        clock.advance_secs(600);
        engine.accrue_all_interest().await;
        engine.accrue_all_supply_interest().await;

        let second = engine.accrue_all_interest().await;
        let second_supply = engine.accrue_all_supply_interest().await;
        assert_eq!(second.total_accrued, 0.0);
        assert_eq!(second_supply.total_accrued, 0.0);
    }

    #[tokio::test]
    async fn supply_interest_is_withdrawn_before_principal() {
        let (engine, clock) = test_engine();
        let user = engine.get_or_create_user("wallet-1").await;
        engine.supply(user.id, 1000.0).await.unwrap();

        clock.advance_secs(365 * 24 * 3600);
        engine.accrue_all_supply_interest().await;

        let pos = engine.get_user_position(user.id).await.unwrap();
        assert!((pos.supplied.interest_earned - 30.0).abs() < 1e-6);

        // Withdrawing 20 comes entirely out of earned interest
        let pos = engine.withdraw(user.id, 20.0).await.unwrap();
        assert_eq!(pos.supplied.principal, 1000.0);
        assert!((pos.supplied.interest_earned - 10.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn available_to_borrow_is_bounded_by_pool_liquidity() {
        let clock = ManualClock::new(0);
        let mut config = EngineConfig::default();
        config.collateral.price_usd = 1.0;
        config.bootstrap_liquidity = 100.0;
        let engine = LendingEngine::with_clock(config, Arc::new(clock));

        let user = engine.get_or_create_user("wallet-1").await;
        engine.deposit(user.id, "QX", 1000.0).await.unwrap();

        let pos = engine.get_user_position(user.id).await.unwrap();
        assert_eq!(pos.max_borrow, 750.0);
        assert_eq!(pos.available_to_borrow, 100.0);
    }

    #[tokio::test]
    async fn invalid_params_update_is_rejected() {
        let (engine, _) = test_engine();
        let bad = ProtocolParams {
            ltv_ratio: 0.9,
            liquidation_threshold: 0.85,
            ..Default::default()
        };
        assert_eq!(
            engine.update_protocol_params(bad).await.unwrap_err(),
            EngineError::InvalidParams
        );

        let good = ProtocolParams {
            ltv_ratio: 0.5,
            ..Default::default()
        };
        let updated = engine.update_protocol_params(good).await.unwrap();
        assert_eq!(updated.ltv_ratio, 0.5);
        assert_eq!(engine.protocol_params().await.ltv_ratio, 0.5);
    }
}
