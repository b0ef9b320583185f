//! Base and bonus ("extra") interest, credited once a year
//!
//! Base interest is annual on the balance at the time of crediting, not
//! compounded monthly.

use crate::account::{Account, BalanceSnapshot};
use serde::{Deserialize, Serialize};

/// Annual base rates in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRates {
    /// Ordinary rate below the transition age
    pub oa_below_transition: f64,
    /// Ordinary rate at or above the transition age
    pub oa_above_transition: f64,
    pub sa: f64,
    pub ma: f64,
    pub ra: f64,
}

impl Default for InterestRates {
    fn default() -> Self {
        Self {
            oa_below_transition: 2.5,
            oa_above_transition: 4.0,
            sa: 4.0,
            ma: 4.0,
            ra: 4.0,
        }
    }
}

impl InterestRates {
    /// Annual rate (percent) for an account at the given age
    pub fn rate(&self, account: Account, age: u32, transition_age: u32) -> f64 {
        match account {
            Account::Ordinary if age < transition_age => self.oa_below_transition,
            Account::Ordinary => self.oa_above_transition,
            Account::Special => self.sa,
            Account::MediSave => self.ma,
            Account::Retirement => self.ra,
            Account::Loan | Account::Excess => 0.0,
        }
    }
}

/// How the below-transition bonus band is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusBasis {
    /// Once the combined balance reaches the band, all of it earns the bonus
    Threshold,
    /// Only the first band of the combined balance earns the bonus
    Capped,
}

/// Where bonus interest is credited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusCrediting {
    /// Below transition to Ordinary, at or above transition to Retirement
    Retirement,
    /// Split across the contributing accounts by their share of the combined balance
    Proportional,
}

/// Bonus interest tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusInterest {
    /// Percent on the combined balance below the transition age
    pub below_transition: f64,
    /// Percent on the first band at or above the transition age
    pub first_band_above_transition: f64,
    /// Percent on the next band at or above the transition age
    pub next_band_above_transition: f64,

    /// Maximum Ordinary balance counted towards the combined balance
    #[serde(default = "default_oa_cap")]
    pub oa_cap: f64,

    /// Combined-balance band below the transition age
    #[serde(default = "default_below_transition_band")]
    pub below_transition_band: f64,

    /// Width of each band at or above the transition age
    #[serde(default = "default_above_transition_band")]
    pub above_transition_band: f64,

    #[serde(default = "default_basis")]
    pub below_transition_basis: BonusBasis,

    #[serde(default = "default_crediting")]
    pub crediting: BonusCrediting,
}

fn default_oa_cap() -> f64 { 20_000.0 }
fn default_below_transition_band() -> f64 { 60_000.0 }
fn default_above_transition_band() -> f64 { 30_000.0 }
fn default_basis() -> BonusBasis { BonusBasis::Threshold }
fn default_crediting() -> BonusCrediting { BonusCrediting::Retirement }

impl Default for BonusInterest {
    fn default() -> Self {
        Self {
            below_transition: 1.0,
            first_band_above_transition: 2.0,
            next_band_above_transition: 1.0,
            oa_cap: default_oa_cap(),
            below_transition_band: default_below_transition_band(),
            above_transition_band: default_above_transition_band(),
            below_transition_basis: default_basis(),
            crediting: default_crediting(),
        }
    }
}

/// Kind of interest credit, used as the ledger reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestKind {
    Base,
    Bonus,
}

impl InterestKind {
    pub fn reason(&self) -> &'static str {
        match self {
            InterestKind::Base => "interest",
            InterestKind::Bonus => "extra_interest",
        }
    }
}

/// One interest amount to credit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestCredit {
    pub account: Account,
    pub amount: f64,
    pub kind: InterestKind,
}

/// Interest engine bound to one configuration
#[derive(Debug, Clone, Copy)]
pub struct InterestEngine<'a> {
    pub rates: &'a InterestRates,
    pub bonus: &'a BonusInterest,
    pub transition_age: u32,
}

impl<'a> InterestEngine<'a> {
    /// Base credits: `balance * annual_rate / 100` per interest-bearing account
    pub fn base_interest(&self, balances: &BalanceSnapshot, age: u32) -> Vec<InterestCredit> {
        Account::INTEREST_BEARING
            .iter()
            .map(|account| InterestCredit {
                account: *account,
                amount: balances.get(*account)
                    * self.rates.rate(*account, age, self.transition_age)
                    / 100.0,
                kind: InterestKind::Base,
            })
            .filter(|credit| credit.amount > 0.0)
            .collect()
    }

    /// Bonus credits on the combined balance
    pub fn bonus_interest(&self, balances: &BalanceSnapshot, age: u32) -> Vec<InterestCredit> {
        let counted_oa = balances.ordinary.min(self.bonus.oa_cap).max(0.0);

        let (parts, bonus, target) = if age < self.transition_age {
            let parts = vec![
                (Account::Ordinary, counted_oa),
                (Account::Special, balances.special),
                (Account::MediSave, balances.medisave),
            ];
            let combined: f64 = parts.iter().map(|(_, v)| v).sum();
            let band = self.bonus.below_transition_band;
            let earning = match self.bonus.below_transition_basis {
                BonusBasis::Threshold if combined >= band => combined,
                BonusBasis::Threshold => 0.0,
                BonusBasis::Capped => combined.min(band),
            };
            (parts, earning * self.bonus.below_transition / 100.0, Account::Ordinary)
        } else {
            let parts = vec![
                (Account::Ordinary, counted_oa),
                (Account::Special, balances.special),
                (Account::MediSave, balances.medisave),
                (Account::Retirement, balances.retirement),
            ];
            let combined: f64 = parts.iter().map(|(_, v)| v).sum();
            let band = self.bonus.above_transition_band;
            let first = combined.min(band);
            let next = (combined - band).clamp(0.0, band);
            let bonus = first * self.bonus.first_band_above_transition / 100.0
                + next * self.bonus.next_band_above_transition / 100.0;
            (parts, bonus, Account::Retirement)
        };

        if bonus <= 0.0 {
            return Vec::new();
        }

        match self.bonus.crediting {
            BonusCrediting::Retirement => vec![InterestCredit {
                account: target,
                amount: bonus,
                kind: InterestKind::Bonus,
            }],
            BonusCrediting::Proportional => {
                let combined: f64 = parts.iter().map(|(_, v)| v).sum();
                parts
                    .into_iter()
                    .filter(|(_, v)| *v > 0.0)
                    .map(|(account, v)| InterestCredit {
                        account,
                        amount: bonus * v / combined,
                        kind: InterestKind::Bonus,
                    })
                    .collect()
            }
        }
    }

    /// All credits for the year-end period, base first
    pub fn annual_credits(&self, balances: &BalanceSnapshot, age: u32) -> Vec<InterestCredit> {
        let mut credits = self.base_interest(balances, age);
        credits.extend(self.bonus_interest(balances, age));
        credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn balances(oa: f64, sa: f64, ma: f64, ra: f64) -> BalanceSnapshot {
        BalanceSnapshot {
            ordinary: oa,
            special: sa,
            medisave: ma,
            retirement: ra,
            loan: 0.0,
            excess: 0.0,
        }
    }

    fn total(credits: &[InterestCredit], account: Account) -> f64 {
        credits.iter().filter(|c| c.account == account).map(|c| c.amount).sum()
    }

    #[test]
    fn test_base_interest_is_annual() {
        let rates = InterestRates::default();
        let bonus = BonusInterest::default();
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        let credits = engine.base_interest(&balances(10_000.0, 5_000.0, 2_000.0, 0.0), 40);
        assert_abs_diff_eq!(total(&credits, Account::Ordinary), 250.0, epsilon = 1e-9);
        assert_abs_diff_eq!(total(&credits, Account::Special), 200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(total(&credits, Account::MediSave), 80.0, epsilon = 1e-9);
        assert_eq!(total(&credits, Account::Retirement), 0.0);

        // Ordinary switches rate at the transition age
        let credits = engine.base_interest(&balances(10_000.0, 0.0, 0.0, 0.0), 55);
        assert_abs_diff_eq!(total(&credits, Account::Ordinary), 400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bonus_below_threshold_whole_combined() {
        let rates = InterestRates::default();
        let bonus = BonusInterest::default();
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        // combined = 20k + 45k + 0 = 65k >= 60k: 1% of 65k to Ordinary
        let credits = engine.bonus_interest(&balances(20_000.0, 45_000.0, 0.0, 0.0), 40);
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].account, Account::Ordinary);
        assert_abs_diff_eq!(credits[0].amount, 650.0, epsilon = 1e-9);

        // Ordinary counts only up to the cap
        let credits = engine.bonus_interest(&balances(50_000.0, 45_000.0, 0.0, 0.0), 40);
        assert_abs_diff_eq!(credits[0].amount, 650.0, epsilon = 1e-9);

        // Below the band: no bonus
        let credits = engine.bonus_interest(&balances(20_000.0, 30_000.0, 9_999.0, 0.0), 40);
        assert!(credits.is_empty());
    }

    #[test]
    fn test_bonus_below_capped_basis() {
        let rates = InterestRates::default();
        let bonus = BonusInterest {
            below_transition_basis: BonusBasis::Capped,
            ..Default::default()
        };
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        let credits = engine.bonus_interest(&balances(20_000.0, 45_000.0, 0.0, 0.0), 40);
        assert_abs_diff_eq!(credits[0].amount, 600.0, epsilon = 1e-9);

        let credits = engine.bonus_interest(&balances(10_000.0, 10_000.0, 0.0, 0.0), 40);
        assert_abs_diff_eq!(credits[0].amount, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bonus_above_transition_bands() {
        let rates = InterestRates::default();
        let bonus = BonusInterest::default();
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        // combined = 20k (capped OA) + 0 + 10k + 100k: 2% of 30k + 1% of 30k
        let credits = engine.bonus_interest(&balances(40_000.0, 0.0, 10_000.0, 100_000.0), 60);
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].account, Account::Retirement);
        assert_abs_diff_eq!(credits[0].amount, 900.0, epsilon = 1e-9);

        // combined = 40k: 2% of 30k + 1% of 10k
        let credits = engine.bonus_interest(&balances(0.0, 0.0, 10_000.0, 30_000.0), 60);
        assert_abs_diff_eq!(credits[0].amount, 700.0, epsilon = 1e-9);

        // combined = 12k: 2% of 12k only
        let credits = engine.bonus_interest(&balances(0.0, 0.0, 2_000.0, 10_000.0), 60);
        assert_abs_diff_eq!(credits[0].amount, 240.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bonus_proportional_crediting() {
        let rates = InterestRates::default();
        let bonus = BonusInterest {
            crediting: BonusCrediting::Proportional,
            ..Default::default()
        };
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        let credits = engine.bonus_interest(&balances(0.0, 0.0, 30_000.0, 30_000.0), 60);
        assert_abs_diff_eq!(total(&credits, Account::MediSave), 450.0, epsilon = 1e-9);
        assert_abs_diff_eq!(total(&credits, Account::Retirement), 450.0, epsilon = 1e-9);
        assert_eq!(total(&credits, Account::Ordinary), 0.0);
    }

    #[test]
    fn test_annual_credits_combine() {
        let rates = InterestRates::default();
        let bonus = BonusInterest::default();
        let engine = InterestEngine { rates: &rates, bonus: &bonus, transition_age: 55 };

        let credits = engine.annual_credits(&balances(20_000.0, 45_000.0, 0.0, 0.0), 40);
        let base: f64 = credits.iter().filter(|c| c.kind == InterestKind::Base).map(|c| c.amount).sum();
        let extra: f64 = credits.iter().filter(|c| c.kind == InterestKind::Bonus).map(|c| c.amount).sum();
        assert_abs_diff_eq!(base, 500.0 + 1_800.0, epsilon = 1e-9);
        assert_abs_diff_eq!(extra, 650.0, epsilon = 1e-9);
    }
}
