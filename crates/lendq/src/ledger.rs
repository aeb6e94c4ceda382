//! Position ledger - the single owner of all user-facing rows.
//!
//! Plain in-memory tables with monotonically assigned ids. The ledger is a
//! data store: it creates and queries rows but enforces no risk policy.
//! Validation lives in `risk.rs` and the engine; the engine holds the one
//! lock that makes ledger + pool mutation atomic.

use crate::pool::LiquidityPool;
use crate::types::*;

/// All ledger state: users, assets, rows, events, pool, params.
#[derive(Clone, Debug)]
pub struct Ledger {
    users: Vec<User>,
    assets: Vec<Asset>,
    deposits: Vec<Deposit>,
    loans: Vec<Loan>,
    supplies: Vec<SupplyLot>,
    events: Vec<Event>,
    pub pool: LiquidityPool,
    pub params: ProtocolParams,
    next_user_id: UserId,
    next_asset_id: AssetId,
    next_row_id: RowId,
}

impl Ledger {
    /// Empty ledger with default parameters
    pub fn new(params: ProtocolParams) -> Self {
        Self {
            users: Vec::new(),
            assets: Vec::new(),
            deposits: Vec::new(),
            loans: Vec::new(),
            supplies: Vec::new(),
            events: Vec::new(),
            pool: LiquidityPool::default(),
            params,
            next_user_id: 1,
            next_asset_id: 1,
            next_row_id: 1,
        }
    }

    fn take_row_id(&mut self) -> RowId {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn user_by_wallet(&self, wallet: &str) -> Option<&User> {
        self.users.iter().find(|u| u.wallet_address == wallet)
    }

    pub fn create_user(&mut self, wallet: &str, now: TimestampMs) -> User {
        let user = User {
            id: self.next_user_id,
            wallet_address: wallet.to_string(),
            created_at: now,
        };
        self.next_user_id += 1;
        self.users.push(user.clone());
        user
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    pub fn asset(&self, symbol: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }

    pub fn asset_by_id(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn register_asset(&mut self, symbol: &str, name: &str, price_usd: f64, decimals: u8) -> Asset {
        let asset = Asset {
            id: self.next_asset_id,
            symbol: symbol.to_string(),
            name: name.to_string(),
            price_usd,
            decimals,
        };
        self.next_asset_id += 1;
        self.assets.push(asset.clone());
        asset
    }

    /// Set an asset price. Returns the updated asset, `None` for an
    /// unknown symbol.
    pub fn update_asset_price(&mut self, symbol: &str, price_usd: f64) -> Option<Asset> {
        let asset = self.assets.iter_mut().find(|a| a.symbol == symbol)?;
        asset.price_usd = price_usd;
        Some(asset.clone())
    }

    // ------------------------------------------------------------------
    // Deposits (collateral)
    // ------------------------------------------------------------------

    /// Append a deposit row. Withdrawals pass a negative amount; the
    /// non-negativity of the resulting net balance is the caller's check.
    pub fn create_deposit(
        &mut self,
        user_id: UserId,
        asset_id: AssetId,
        amount: f64,
        now: TimestampMs,
    ) -> Deposit {
        let deposit = Deposit {
            id: self.take_row_id(),
            user_id,
            asset_id,
            amount,
            timestamp: now,
        };
        self.deposits.push(deposit.clone());
        deposit
    }

    /// Net deposited balance for (user, asset): sum of all their rows
    pub fn net_deposited(&self, user_id: UserId, asset_id: AssetId) -> f64 {
        self.deposits
            .iter()
            .filter(|d| d.user_id == user_id && d.asset_id == asset_id)
            .map(|d| d.amount)
            .sum()
    }

    // ------------------------------------------------------------------
    // Loans
    // ------------------------------------------------------------------

    pub fn create_loan(
        &mut self,
        user_id: UserId,
        asset_id: AssetId,
        principal: f64,
        now: TimestampMs,
    ) -> Loan {
        let loan = Loan {
            id: self.take_row_id(),
            user_id,
            asset_id,
            principal,
            interest_accrued: 0.0,
            status: LoanStatus::Active,
            created_at: now,
            last_accrual_ts: now,
        };
        self.loans.push(loan.clone());
        loan
    }

    /// A user's active loans in ledger (creation) order
    pub fn user_active_loans(&self, user_id: UserId) -> Vec<&Loan> {
        self.loans
            .iter()
            .filter(|l| l.user_id == user_id && l.is_active())
            .collect()
    }

    pub fn user_active_loans_mut(&mut self, user_id: UserId) -> impl Iterator<Item = &mut Loan> {
        self.loans
            .iter_mut()
            .filter(move |l| l.user_id == user_id && l.is_active())
    }

    /// All active loans across users, ledger order
    pub fn all_active_loans(&self) -> Vec<&Loan> {
        self.loans.iter().filter(|l| l.is_active()).collect()
    }

    pub fn all_active_loans_mut(&mut self) -> impl Iterator<Item = &mut Loan> {
        self.loans.iter_mut().filter(|l| l.is_active())
    }

    /// Distinct users holding at least one active loan, first-seen order
    pub fn users_with_active_loans(&self) -> Vec<UserId> {
        let mut seen = Vec::new();
        for loan in self.loans.iter().filter(|l| l.is_active()) {
            if !seen.contains(&loan.user_id) {
                seen.push(loan.user_id);
            }
        }
        seen
    }

    // ------------------------------------------------------------------
    // Supply lots
    // ------------------------------------------------------------------

    pub fn create_supply(
        &mut self,
        user_id: UserId,
        asset_id: AssetId,
        amount: f64,
        now: TimestampMs,
    ) -> SupplyLot {
        let lot = SupplyLot {
            id: self.take_row_id(),
            user_id,
            asset_id,
            amount,
            interest_earned: 0.0,
            created_at: now,
            last_accrual_ts: now,
        };
        self.supplies.push(lot.clone());
        lot
    }

    /// A user's lots in creation order (the FIFO order for withdrawal)
    pub fn user_supplies(&self, user_id: UserId) -> Vec<&SupplyLot> {
        self.supplies.iter().filter(|s| s.user_id == user_id).collect()
    }

    /// A user's total supplied position: principal plus earned interest
    pub fn user_supplied_total(&self, user_id: UserId) -> f64 {
        self.user_supplies(user_id).iter().map(|s| s.total()).sum()
    }

    /// Principal / interest split of a user's supply position
    pub fn user_supplied_split(&self, user_id: UserId) -> (f64, f64) {
        let lots = self.user_supplies(user_id);
        let principal = lots.iter().map(|s| s.amount).sum();
        let interest = lots.iter().map(|s| s.interest_earned).sum();
        (principal, interest)
    }

    pub(crate) fn supplies_mut(&mut self) -> &mut Vec<SupplyLot> {
        &mut self.supplies
    }

    pub fn all_supplies_mut(&mut self) -> impl Iterator<Item = &mut SupplyLot> {
        self.supplies.iter_mut()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Append an audit event
    pub fn record_event(
        &mut self,
        user_id: UserId,
        kind: EventKind,
        payload: serde_json::Value,
        now: TimestampMs,
    ) -> Event {
        let event = Event {
            id: self.take_row_id(),
            user_id,
            kind,
            payload,
            timestamp: now,
        };
        self.events.push(event.clone());
        event
    }

    /// Most recent `limit` events in chronological order
    pub fn events(&self, limit: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(limit);
        &self.events[start..]
    }
}
