//! Sub-account balances and the append-only balance-change log

mod ledger;

pub use ledger::{BalanceEvent, BalanceSnapshot, Direction, Ledger, LedgerError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance below which an amount is treated as zero
pub const AMOUNT_EPSILON: f64 = 1e-9;

/// Round to currency precision (cents)
pub fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Normalise -0.0 so snapshots never print a signed zero
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// The six tracked balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Account {
    /// Ordinary Account (OA)
    #[serde(rename = "oa")]
    Ordinary,
    /// Special Account (SA), closed at the retirement transition
    #[serde(rename = "sa")]
    Special,
    /// MediSave Account (MA)
    #[serde(rename = "ma")]
    MediSave,
    /// Retirement Account (RA)
    #[serde(rename = "ra")]
    Retirement,
    /// Outstanding housing loan, tracked as a non-negative magnitude
    #[serde(rename = "loan")]
    Loan,
    /// Cash released out of the scheme
    #[serde(rename = "excess")]
    Excess,
}

impl Account {
    pub const ALL: [Account; 6] = [
        Account::Ordinary,
        Account::Special,
        Account::MediSave,
        Account::Retirement,
        Account::Loan,
        Account::Excess,
    ];

    /// Accounts that earn base and bonus interest
    pub const INTEREST_BEARING: [Account; 4] = [
        Account::Ordinary,
        Account::Special,
        Account::MediSave,
        Account::Retirement,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Account::Ordinary => 0,
            Account::Special => 1,
            Account::MediSave => 2,
            Account::Retirement => 3,
            Account::Loan => 4,
            Account::Excess => 5,
        }
    }

    /// Short code used in config keys and event logs
    pub fn code(&self) -> &'static str {
        match self {
            Account::Ordinary => "oa",
            Account::Special => "sa",
            Account::MediSave => "ma",
            Account::Retirement => "ra",
            Account::Loan => "loan",
            Account::Excess => "excess",
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(1.005 * 1000.0), 1005.0);
        assert_eq!(round_cents(10.123), 10.12);
        assert_eq!(round_cents(10.125_000_1), 10.13);
        assert_eq!(round_cents(-0.001).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_account_codes_round_trip() {
        for account in Account::ALL {
            let json = serde_json::to_string(&account).unwrap();
            assert_eq!(json, format!("\"{}\"", account.code()));
            let back: Account = serde_json::from_str(&json).unwrap();
            assert_eq!(back, account);
        }
    }
}
