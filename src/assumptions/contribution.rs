//! Contribution rates, allocation fractions and the allocation calculator
//!
//! Age brackets are lower-inclusive and upper-exclusive throughout: age 60
//! belongs to `60_to_65`, never to `55_to_60`. The first bracket ends at
//! the configured transition age (55 by default).

use crate::account::Account;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Contribution/allocation age bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "below_55")]
    BelowTransition,
    #[serde(rename = "55_to_60")]
    To60,
    #[serde(rename = "60_to_65")]
    From60To65,
    #[serde(rename = "65_to_70")]
    From65To70,
    #[serde(rename = "above_70")]
    From70,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        AgeBracket::BelowTransition,
        AgeBracket::To60,
        AgeBracket::From60To65,
        AgeBracket::From65To70,
        AgeBracket::From70,
    ];

    /// Bracket for an attained age; `[lower, upper)` everywhere
    pub fn for_age(age: u32, transition_age: u32) -> Self {
        if age < transition_age {
            AgeBracket::BelowTransition
        } else if age < 60 {
            AgeBracket::To60
        } else if age < 65 {
            AgeBracket::From60To65
        } else if age < 70 {
            AgeBracket::From65To70
        } else {
            AgeBracket::From70
        }
    }

    /// Accounts that may receive allocations within this bracket
    pub fn target_accounts(&self) -> [Account; 3] {
        match self {
            AgeBracket::BelowTransition => [Account::Ordinary, Account::Special, Account::MediSave],
            _ => [Account::Ordinary, Account::Retirement, Account::MediSave],
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            AgeBracket::BelowTransition => "below_55",
            AgeBracket::To60 => "55_to_60",
            AgeBracket::From60To65 => "60_to_65",
            AgeBracket::From65To70 => "65_to_70",
            AgeBracket::From70 => "above_70",
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Who pays a contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Employee,
    Employer,
}

/// Contribution rates (fractions of capped salary) for one bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePair {
    pub employee: f64,
    pub employer: f64,
}

impl RatePair {
    pub fn rate(&self, role: Role) -> f64 {
        match role {
            Role::Employee => self.employee,
            Role::Employer => self.employer,
        }
    }

    pub fn total(&self) -> f64 {
        self.employee + self.employer
    }
}

/// Contribution rates keyed by bracket
pub type ContributionRates = BTreeMap<AgeBracket, RatePair>;

/// Allocation fractions of the total contribution, keyed by bracket then account
pub type AllocationTable = BTreeMap<AgeBracket, BTreeMap<Account, f64>>;

/// Default contribution rates
pub fn default_contribution_rates() -> ContributionRates {
    BTreeMap::from([
        (AgeBracket::BelowTransition, RatePair { employee: 0.20, employer: 0.17 }),
        (AgeBracket::To60, RatePair { employee: 0.15, employer: 0.14 }),
        (AgeBracket::From60To65, RatePair { employee: 0.09, employer: 0.10 }),
        (AgeBracket::From65To70, RatePair { employee: 0.075, employer: 0.085 }),
        (AgeBracket::From70, RatePair { employee: 0.05, employer: 0.075 }),
    ])
}

/// Default allocation fractions; each bracket sums to exactly 1.0
pub fn default_allocation() -> AllocationTable {
    use Account::{MediSave, Ordinary, Retirement, Special};

    BTreeMap::from([
        // 23% / 6% / 8% of salary out of a 37% total
        (
            AgeBracket::BelowTransition,
            BTreeMap::from([(Ordinary, 0.6217), (Special, 0.1621), (MediSave, 0.2162)]),
        ),
        // 11.5% / 10.5% / 7.5% of salary out of a 29.5% total
        (
            AgeBracket::To60,
            BTreeMap::from([(Ordinary, 0.3898), (Retirement, 0.3559), (MediSave, 0.2543)]),
        ),
        (
            AgeBracket::From60To65,
            BTreeMap::from([(Ordinary, 0.3), (Retirement, 0.3), (MediSave, 0.4)]),
        ),
        (
            AgeBracket::From65To70,
            BTreeMap::from([(Ordinary, 0.2), (Retirement, 0.3), (MediSave, 0.5)]),
        ),
        (
            AgeBracket::From70,
            BTreeMap::from([(Ordinary, 0.1), (Retirement, 0.3), (MediSave, 0.6)]),
        ),
    ])
}

/// Contribution & allocation calculator bound to one configuration
#[derive(Debug, Clone, Copy)]
pub struct ContributionCalculator<'a> {
    pub salary_cap: f64,
    pub transition_age: u32,
    pub rates: &'a ContributionRates,
    pub allocation: &'a AllocationTable,
}

impl<'a> ContributionCalculator<'a> {
    pub fn bracket(&self, age: u32) -> AgeBracket {
        AgeBracket::for_age(age, self.transition_age)
    }

    /// `min(salary, salary_cap) * rate(bracket, role)`
    pub fn contribution(&self, salary: f64, age: u32, role: Role) -> f64 {
        let capped_salary = salary.min(self.salary_cap).max(0.0);
        let rate = self
            .rates
            .get(&self.bracket(age))
            .map(|pair| pair.rate(role))
            .unwrap_or(0.0);
        capped_salary * rate
    }

    /// Employee plus employer contribution
    pub fn total_contribution(&self, salary: f64, age: u32) -> f64 {
        self.contribution(salary, age, Role::Employee) + self.contribution(salary, age, Role::Employer)
    }

    /// Share of the total contribution routed to `account`.
    ///
    /// Returns zero for an account that is not a valid target at this age
    /// (Special at or above the transition age, Retirement below it).
    pub fn allocation(&self, age: u32, salary: f64, account: Account) -> f64 {
        let bracket = self.bracket(age);
        if !bracket.target_accounts().contains(&account) {
            return 0.0;
        }
        let fraction = self
            .allocation
            .get(&bracket)
            .and_then(|fractions| fractions.get(&account))
            .copied()
            .unwrap_or(0.0);
        self.total_contribution(salary, age) * fraction
    }

    /// Allocation to each target account of the bracket, in fixed order
    pub fn allocations(&self, age: u32, salary: f64) -> Vec<(Account, f64)> {
        self.bracket(age)
            .target_accounts()
            .iter()
            .map(|account| (*account, self.allocation(age, salary, *account)))
            .collect()
    }
}
