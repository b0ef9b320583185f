//! Scheme features: retirement-sum tiers, payout amounts and the loan schedule

use serde::{Deserialize, Serialize};
use std::fmt;

/// Retirement-sum tier selected for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetirementTier {
    /// Basic Retirement Sum
    #[serde(rename = "brs", alias = "basic")]
    Basic,
    /// Full Retirement Sum
    #[serde(rename = "frs", alias = "full")]
    Full,
    /// Enhanced Retirement Sum
    #[serde(rename = "ers", alias = "enhanced")]
    Enhanced,
}

impl fmt::Display for RetirementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetirementTier::Basic => "brs",
            RetirementTier::Full => "frs",
            RetirementTier::Enhanced => "ers",
        };
        f.write_str(name)
    }
}

/// Target amount moved into the Retirement account and the monthly payout it buys
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetirementSum {
    pub amount: f64,
    pub payout: f64,
}

/// The three retirement-sum tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementSums {
    pub brs: RetirementSum,
    pub frs: RetirementSum,
    pub ers: RetirementSum,
}

impl Default for RetirementSums {
    fn default() -> Self {
        // 2025 cohort sums; payouts are approximate CPF LIFE estimates at 65
        Self {
            brs: RetirementSum { amount: 106_500.0, payout: 890.0 },
            frs: RetirementSum { amount: 213_000.0, payout: 1_640.0 },
            ers: RetirementSum { amount: 426_000.0, payout: 3_180.0 },
        }
    }
}

impl RetirementSums {
    pub fn get(&self, tier: RetirementTier) -> &RetirementSum {
        match tier {
            RetirementTier::Basic => &self.brs,
            RetirementTier::Full => &self.frs,
            RetirementTier::Enhanced => &self.ers,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RetirementTier, &RetirementSum)> {
        [
            (RetirementTier::Basic, &self.brs),
            (RetirementTier::Full, &self.frs),
            (RetirementTier::Enhanced, &self.ers),
        ]
        .into_iter()
    }
}

/// Fixed monthly loan instalment by elapsed loan year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSchedule {
    /// Years 1 and 2
    pub year_1_2: f64,
    /// Year 3
    pub year_3: f64,
    /// Year 4 onwards
    pub year_4_beyond: f64,
}

impl Default for LoanSchedule {
    fn default() -> Self {
        Self {
            year_1_2: 1_687.39,
            year_3: 1_782.27,
            year_4_beyond: 1_817.49,
        }
    }
}

impl LoanSchedule {
    /// Scheduled instalment for a 1-indexed loan year
    pub fn monthly_payment(&self, elapsed_loan_year: u32) -> f64 {
        match elapsed_loan_year {
            0..=2 => self.year_1_2,
            3 => self.year_3,
            _ => self.year_4_beyond,
        }
    }

    /// Loan year (1-indexed) for a zero-based period index
    pub fn loan_year(period_index: u32) -> u32 {
        period_index / 12 + 1
    }

    /// Actual deduction: never more than the outstanding loan
    pub fn payment_due(&self, period_index: u32, outstanding: f64) -> f64 {
        if outstanding <= 0.0 {
            return 0.0;
        }
        self.monthly_payment(Self::loan_year(period_index)).min(outstanding)
    }
}
