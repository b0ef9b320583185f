//! Load, save and validate assumptions as JSON
//!
//! Parsing never substitutes zero for a missing rate table: required fields
//! have no serde default, so an absent table fails the load with the field
//! name in the message.

use super::{AgeBracket, Assumptions};
use crate::account::Account;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Tolerance for allocation fractions summing to one
const ALLOCATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing {table} entry for bracket {bracket}")]
    MissingBracket {
        table: &'static str,
        bracket: AgeBracket,
    },

    #[error("Allocation for {bracket} sums to {sum:.6}, expected 1.0")]
    AllocationSum { bracket: AgeBracket, sum: f64 },

    #[error("Allocation for {bracket} targets {account}, which cannot receive contributions in that bracket")]
    AllocationAccount { bracket: AgeBracket, account: Account },

    #[error("End date {end} precedes start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("Birth date {birth} is after start date {start}")]
    BirthAfterStart { birth: NaiveDate, start: NaiveDate },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, format!("{} must be finite and non-negative", value)));
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, format!("{} must be positive", value)));
    }
    Ok(())
}

impl Assumptions {
    /// Parse and validate
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let assumptions: Assumptions = serde_json::from_str(json)?;
        assumptions.validate()?;
        Ok(assumptions)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let assumptions = Self::from_json_str(&json)?;
        log::debug!("Loaded assumptions from {}", path.display());
        Ok(assumptions)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string()?).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reject any configuration the projection cannot run faithfully
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_date < self.start_date {
            return Err(ConfigError::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.birth_date > self.start_date {
            return Err(ConfigError::BirthAfterStart {
                birth: self.birth_date,
                start: self.start_date,
            });
        }

        check_non_negative("salary", self.salary)?;
        check_positive("salary_cap", self.salary_cap)?;

        if self.transition_age == 0 || self.transition_age >= 60 {
            return Err(invalid(
                "transition_age",
                format!("{} must be between 1 and 59", self.transition_age),
            ));
        }
        if self.transition_age > self.payout_age {
            return Err(invalid(
                "payout_age",
                format!(
                    "{} precedes transition age {}",
                    self.payout_age, self.transition_age
                ),
            ));
        }

        self.validate_contributions()?;
        self.validate_allocation()?;
        self.validate_interest()?;

        for (tier, sum) in self.retirement_sums.iter() {
            check_positive(&format!("retirement_sums.{}.amount", tier), sum.amount)?;
            check_non_negative(&format!("retirement_sums.{}.payout", tier), sum.payout)?;
        }

        let loan = &self.loan_payments;
        check_non_negative("loan_payments.year_1_2", loan.year_1_2)?;
        check_non_negative("loan_payments.year_3", loan.year_3)?;
        check_non_negative("loan_payments.year_4_beyond", loan.year_4_beyond)?;

        for account in Account::ALL {
            check_non_negative(
                &format!("initial_balances.{}", account.code()),
                self.initial_balances.get(account),
            )?;
        }

        Ok(())
    }

    fn validate_contributions(&self) -> Result<(), ConfigError> {
        for bracket in AgeBracket::ALL {
            let pair = self
                .contribution_rates
                .get(&bracket)
                .ok_or(ConfigError::MissingBracket {
                    table: "contribution_rates",
                    bracket,
                })?;
            check_non_negative(&format!("contribution_rates.{}.employee", bracket), pair.employee)?;
            check_non_negative(&format!("contribution_rates.{}.employer", bracket), pair.employer)?;
        }
        Ok(())
    }

    fn validate_allocation(&self) -> Result<(), ConfigError> {
        for bracket in AgeBracket::ALL {
            let fractions = self
                .allocation
                .get(&bracket)
                .ok_or(ConfigError::MissingBracket {
                    table: "allocation",
                    bracket,
                })?;

            for (account, fraction) in fractions {
                if !bracket.target_accounts().contains(account) {
                    return Err(ConfigError::AllocationAccount {
                        bracket,
                        account: *account,
                    });
                }
                check_non_negative(&format!("allocation.{}.{}", bracket, account), *fraction)?;
            }

            let sum: f64 = fractions.values().sum();
            if (sum - 1.0).abs() > ALLOCATION_TOLERANCE {
                return Err(ConfigError::AllocationSum { bracket, sum });
            }
        }
        Ok(())
    }

    fn validate_interest(&self) -> Result<(), ConfigError> {
        let rates = &self.interest_rates;
        check_non_negative("interest_rates.oa_below_transition", rates.oa_below_transition)?;
        check_non_negative("interest_rates.oa_above_transition", rates.oa_above_transition)?;
        check_non_negative("interest_rates.sa", rates.sa)?;
        check_non_negative("interest_rates.ma", rates.ma)?;
        check_non_negative("interest_rates.ra", rates.ra)?;

        let bonus = &self.bonus_interest;
        check_non_negative("bonus_interest.below_transition", bonus.below_transition)?;
        check_non_negative(
            "bonus_interest.first_band_above_transition",
            bonus.first_band_above_transition,
        )?;
        check_non_negative(
            "bonus_interest.next_band_above_transition",
            bonus.next_band_above_transition,
        )?;
        check_non_negative("bonus_interest.oa_cap", bonus.oa_cap)?;
        check_positive("bonus_interest.below_transition_band", bonus.below_transition_band)?;
        check_positive("bonus_interest.above_transition_band", bonus.above_transition_band)?;
        Ok(())
    }
}
