//! CPF Projection - month-by-month projection of a CPF-style retirement savings account
//!
//! This library provides:
//! - A monthly period generator with birthday-accurate ages
//! - An event-logged ledger over the six member balances
//! - Contribution allocation, annual base and bonus interest
//! - Loan amortization, the retirement transition and payout draw-down
//! - Pluggable output sinks (console table, CSV, JSON-lines event log)

pub mod account;
pub mod assumptions;
pub mod calendar;
pub mod error;
pub mod projection;

// Re-export commonly used types
pub use account::{Account, BalanceEvent, BalanceSnapshot, Ledger};
pub use assumptions::{Assumptions, ConfigError, RetirementTier};
pub use calendar::{Period, PeriodGenerator};
pub use error::ProjectionError;
pub use projection::{PeriodRecord, PeriodSink, ProjectionEngine, ProjectionResult, StopReason};
