//! Projection assumptions: dates, salary, rate tables and scheme features
//!
//! An [`Assumptions`] value is immutable for the duration of a run and is
//! passed by reference into every component.

mod contribution;
mod interest;
mod loader;
mod product;

pub use contribution::{
    default_allocation, default_contribution_rates, AgeBracket, AllocationTable,
    ContributionCalculator, ContributionRates, RatePair, Role,
};
pub use interest::{
    BonusBasis, BonusCrediting, BonusInterest, InterestCredit, InterestEngine, InterestKind,
    InterestRates,
};
pub use loader::ConfigError;
pub use product::{LoanSchedule, RetirementSum, RetirementSums, RetirementTier};

use crate::account::Account;
use crate::calendar::{PeriodGenerator, ScheduleError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opening balances for the six accounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialBalances {
    pub oa: f64,
    pub sa: f64,
    pub ma: f64,
    pub ra: f64,
    /// Outstanding loan principal
    pub loan: f64,
    pub excess: f64,
}

impl InitialBalances {
    pub fn get(&self, account: Account) -> f64 {
        match account {
            Account::Ordinary => self.oa,
            Account::Special => self.sa,
            Account::MediSave => self.ma,
            Account::Retirement => self.ra,
            Account::Loan => self.loan,
            Account::Excess => self.excess,
        }
    }
}

/// Complete parameter set for one projection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub birth_date: NaiveDate,

    /// Monthly salary
    pub salary: f64,
    /// Monthly salary ceiling for contributions
    pub salary_cap: f64,

    /// Age of the one-time retirement transition
    #[serde(default = "default_transition_age")]
    pub transition_age: u32,

    /// Age from which monthly payouts begin
    #[serde(default = "default_payout_age")]
    pub payout_age: u32,

    pub contribution_rates: ContributionRates,
    pub allocation: AllocationTable,
    pub interest_rates: InterestRates,

    #[serde(default)]
    pub bonus_interest: BonusInterest,

    pub retirement_sums: RetirementSums,
    pub retirement_tier: RetirementTier,
    pub loan_payments: LoanSchedule,

    #[serde(default)]
    pub initial_balances: InitialBalances,
}

fn default_transition_age() -> u32 { 55 }
fn default_payout_age() -> u32 { 65 }

impl Assumptions {
    /// Standard rate tables for a member with the given dates and salary
    pub fn with_defaults(
        start_date: NaiveDate,
        end_date: NaiveDate,
        birth_date: NaiveDate,
        salary: f64,
    ) -> Self {
        Self {
            start_date,
            end_date,
            birth_date,
            salary,
            salary_cap: 7_400.0,
            transition_age: default_transition_age(),
            payout_age: default_payout_age(),
            contribution_rates: default_contribution_rates(),
            allocation: default_allocation(),
            interest_rates: InterestRates::default(),
            bonus_interest: BonusInterest::default(),
            retirement_sums: RetirementSums::default(),
            retirement_tier: RetirementTier::Full,
            loan_payments: LoanSchedule::default(),
            initial_balances: InitialBalances::default(),
        }
    }

    /// Same assumptions with a different salary, for scenario sweeps
    pub fn with_salary(&self, salary: f64) -> Self {
        Self {
            salary,
            ..self.clone()
        }
    }

    pub fn schedule(&self) -> Result<PeriodGenerator, ScheduleError> {
        PeriodGenerator::new(self.start_date, self.end_date, self.birth_date)
    }

    /// Retirement sum of the selected tier
    pub fn retirement_sum(&self) -> &RetirementSum {
        self.retirement_sums.get(self.retirement_tier)
    }

    pub fn contribution_calculator(&self) -> ContributionCalculator<'_> {
        ContributionCalculator {
            salary_cap: self.salary_cap,
            transition_age: self.transition_age,
            rates: &self.contribution_rates,
            allocation: &self.allocation,
        }
    }

    pub fn interest_engine(&self) -> InterestEngine<'_> {
        InterestEngine {
            rates: &self.interest_rates,
            bonus: &self.bonus_interest,
            transition_age: self.transition_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let assumptions =
            Assumptions::with_defaults(date(2025, 4, 1), date(2060, 12, 31), date(1974, 7, 6), 6_000.0);
        assert!(assumptions.validate().is_ok());
        assert_eq!(assumptions.retirement_sum().amount, 213_000.0);
        assert_eq!(assumptions.transition_age, 55);
        assert_eq!(assumptions.payout_age, 65);
    }

    #[test]
    fn test_with_salary_keeps_everything_else() {
        let base =
            Assumptions::with_defaults(date(2025, 1, 1), date(2030, 12, 31), date(1980, 1, 1), 4_000.0);
        let scenario = base.with_salary(8_000.0);
        assert_eq!(scenario.salary, 8_000.0);
        assert_eq!(scenario.allocation, base.allocation);
        assert_eq!(scenario.start_date, base.start_date);
    }

    #[test]
    fn test_schedule_from_assumptions() {
        let assumptions =
            Assumptions::with_defaults(date(2025, 4, 1), date(2025, 12, 31), date(1974, 7, 6), 6_000.0);
        let schedule = assumptions.schedule().unwrap();
        assert_eq!(schedule.len(), 9);
    }

    #[test]
    fn test_initial_balance_lookup() {
        let balances = InitialBalances {
            oa: 1.0,
            sa: 2.0,
            ma: 3.0,
            ra: 4.0,
            loan: 5.0,
            excess: 6.0,
        };
        let total: f64 = Account::ALL.iter().map(|a| balances.get(*a)).sum();
        assert_eq!(total, 21.0);
    }
}
