//! Account ledger
//!
//! Every balance mutation goes through `record_inflow`, `record_outflow`
//! or `set_balance` and is logged as exactly one [`BalanceEvent`]. A
//! transfer is a paired outflow on the source and inflow on the
//! destination.

use super::{round_cents, Account, AMOUNT_EPSILON};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid amount {amount} for {account}: must be finite and non-negative")]
    InvalidAmount { account: Account, amount: f64 },

    #[error("Outflow of {amount:.2} from {account} exceeds balance {balance:.2}")]
    Overdraw {
        account: Account,
        amount: f64,
        balance: f64,
    },

    #[error("Account {0} is closed")]
    AccountClosed(Account),
}

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inflow,
    Outflow,
}

/// Immutable record of one balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Period end the change belongs to (None before the first period)
    pub period: Option<NaiveDate>,
    pub account: Account,
    pub old_balance: f64,
    pub new_balance: f64,
    /// Signed change, `new_balance - old_balance`
    pub delta: f64,
    pub direction: Direction,
    pub reason: String,
}

/// Read-only view of the six balances at currency precision
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub ordinary: f64,
    pub special: f64,
    pub medisave: f64,
    pub retirement: f64,
    pub loan: f64,
    pub excess: f64,
}

impl BalanceSnapshot {
    pub fn get(&self, account: Account) -> f64 {
        match account {
            Account::Ordinary => self.ordinary,
            Account::Special => self.special,
            Account::MediSave => self.medisave,
            Account::Retirement => self.retirement,
            Account::Loan => self.loan,
            Account::Excess => self.excess,
        }
    }

    /// Sum of all six balances
    pub fn total(&self) -> f64 {
        Account::ALL.iter().map(|a| self.get(*a)).sum()
    }

    /// Member-owned funds: everything except the loan liability
    pub fn net_assets(&self) -> f64 {
        self.total() - 2.0 * self.loan
    }
}

/// Balances plus their event log for one projection run
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: [f64; 6],
    closed: [bool; 6],
    events: Vec<BalanceEvent>,
    period: Option<NaiveDate>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag subsequent events with this period end
    pub fn set_period(&mut self, period_end: NaiveDate) {
        self.period = Some(period_end);
    }

    pub fn balance(&self, account: Account) -> f64 {
        self.balances[account.index()]
    }

    pub fn is_closed(&self, account: Account) -> bool {
        self.closed[account.index()]
    }

    /// Increase `account` by `amount`; amounts within epsilon of zero are not logged
    pub fn record_inflow(
        &mut self,
        account: Account,
        amount: f64,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        check_amount(account, amount)?;
        let amount = round_cents(amount);
        if amount.abs() < AMOUNT_EPSILON {
            return Ok(());
        }
        if self.is_closed(account) {
            return Err(LedgerError::AccountClosed(account));
        }
        let old = self.balance(account);
        self.apply(account, round_cents(old + amount), reason.into());
        Ok(())
    }

    /// Decrease `account` by `amount`. The caller clamps to the available
    /// balance; an overdraw is rejected, never silently clamped.
    pub fn record_outflow(
        &mut self,
        account: Account,
        amount: f64,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        check_amount(account, amount)?;
        let amount = round_cents(amount);
        if amount.abs() < AMOUNT_EPSILON {
            return Ok(());
        }
        let old = self.balance(account);
        if amount > old + AMOUNT_EPSILON {
            return Err(LedgerError::Overdraw {
                account,
                amount,
                balance: old,
            });
        }
        self.apply(account, round_cents(old - amount).max(0.0), reason.into());
        Ok(())
    }

    /// Set `account` directly to `new_balance`, logging the implied delta
    pub fn set_balance(
        &mut self,
        account: Account,
        new_balance: f64,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        check_amount(account, new_balance)?;
        let new_balance = round_cents(new_balance);
        let old = self.balance(account);
        if (new_balance - old).abs() < AMOUNT_EPSILON {
            return Ok(());
        }
        if self.is_closed(account) {
            return Err(LedgerError::AccountClosed(account));
        }
        self.apply(account, new_balance, reason.into());
        Ok(())
    }

    /// Move `amount` from one account to another as a paired outflow/inflow
    pub fn transfer(
        &mut self,
        from: Account,
        to: Account,
        amount: f64,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if self.is_closed(to) && amount.abs() >= AMOUNT_EPSILON {
            return Err(LedgerError::AccountClosed(to));
        }
        self.record_outflow(from, amount, reason)?;
        self.record_inflow(to, amount, reason)
    }

    /// Zero `account` and hold it at zero for the rest of the run
    pub fn close(&mut self, account: Account, reason: &str) -> Result<(), LedgerError> {
        self.set_balance(account, 0.0, reason)?;
        self.closed[account.index()] = true;
        Ok(())
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            ordinary: round_cents(self.balance(Account::Ordinary)),
            special: round_cents(self.balance(Account::Special)),
            medisave: round_cents(self.balance(Account::MediSave)),
            retirement: round_cents(self.balance(Account::Retirement)),
            loan: round_cents(self.balance(Account::Loan)),
            excess: round_cents(self.balance(Account::Excess)),
        }
    }

    /// Full event log in insertion order
    pub fn events(&self) -> &[BalanceEvent] {
        &self.events
    }

    /// Events logged since `mark` (a previous `events().len()`)
    pub fn events_since(&self, mark: usize) -> &[BalanceEvent] {
        self.events.get(mark..).unwrap_or(&[])
    }

    /// Event log of a single account
    pub fn events_for(&self, account: Account) -> impl Iterator<Item = &BalanceEvent> {
        self.events.iter().filter(move |e| e.account == account)
    }

    fn apply(&mut self, account: Account, new_balance: f64, reason: String) {
        let old_balance = self.balance(account);
        let delta = round_cents(new_balance - old_balance);
        self.events.push(BalanceEvent {
            period: self.period,
            account,
            old_balance,
            new_balance,
            delta,
            direction: if delta >= 0.0 {
                Direction::Inflow
            } else {
                Direction::Outflow
            },
            reason,
        });
        self.balances[account.index()] = new_balance;
    }
}

fn check_amount(account: Account, amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LedgerError::InvalidAmount { account, amount });
    }
    Ok(())
}
