//! Period records and run results

use super::state::{LifecycleStage, ProjectionState};
use crate::account::BalanceSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One simulated month as seen by the output sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    // Timing
    pub index: u32,
    pub period_end: NaiveDate,
    pub age: u32,
    pub stage: LifecycleStage,

    /// End-of-period balances
    pub balances: BalanceSnapshot,

    // Flows within the period
    pub contribution: f64,
    pub loan_payment: f64,
    pub interest: f64,
    pub payout: f64,
}

impl PeriodRecord {
    pub fn new(index: u32, period_end: NaiveDate, age: u32) -> Self {
        Self {
            index,
            period_end,
            age,
            stage: LifecycleStage::Accumulating,
            balances: BalanceSnapshot::default(),
            contribution: 0.0,
            loan_payment: 0.0,
            interest: 0.0,
            payout: 0.0,
        }
    }
}

/// Why the period loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every generated period was processed
    EndOfSchedule,
    /// The Retirement account ran out after payouts began
    Depleted,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub periods_processed: u32,
    pub stop_reason: StopReason,
    pub final_stage: LifecycleStage,

    pub transition_period: Option<NaiveDate>,
    pub payout_start_period: Option<NaiveDate>,

    pub cumulative_contributions: f64,
    pub cumulative_interest: f64,
    pub cumulative_payouts: f64,
    pub cumulative_loan_payments: f64,

    /// Balances after the last processed period
    pub final_balances: BalanceSnapshot,

    /// Size of the balance-change log, opening balances included
    pub events_logged: usize,
}

impl ProjectionResult {
    pub(crate) fn from_state(state: &ProjectionState, stop_reason: StopReason) -> Self {
        Self {
            periods_processed: state.periods_processed,
            stop_reason,
            final_stage: state.stage,
            transition_period: state.transition_period,
            payout_start_period: state.payout_start_period,
            cumulative_contributions: state.cumulative_contributions,
            cumulative_interest: state.cumulative_interest,
            cumulative_payouts: state.cumulative_payouts,
            cumulative_loan_payments: state.cumulative_loan_payments,
            final_balances: state.ledger.snapshot(),
            events_logged: state.ledger.events().len(),
        }
    }

    pub fn summary(&self, salary: f64) -> ProjectionSummary {
        ProjectionSummary {
            salary,
            periods: self.periods_processed,
            stop_reason: self.stop_reason,
            transition_period: self.transition_period,
            payout_start_period: self.payout_start_period,
            total_contributions: self.cumulative_contributions,
            total_interest: self.cumulative_interest,
            total_payouts: self.cumulative_payouts,
            final_retirement: self.final_balances.retirement,
            final_excess: self.final_balances.excess,
            final_net_assets: self.final_balances.net_assets(),
        }
    }
}

/// Flat per-scenario summary, one CSV row per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub salary: f64,
    pub periods: u32,
    pub stop_reason: StopReason,
    pub transition_period: Option<NaiveDate>,
    pub payout_start_period: Option<NaiveDate>,
    pub total_contributions: f64,
    pub total_interest: f64,
    pub total_payouts: f64,
    pub final_retirement: f64,
    pub final_excess: f64,
    pub final_net_assets: f64,
}

fn fmt_period(period: Option<NaiveDate>) -> String {
    period
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for ProjectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "salary={:.2} periods={} stop={:?} transition={} payout_start={} contributions={:.2} interest={:.2} payouts={:.2} ra={:.2} excess={:.2} net={:.2}",
            self.salary,
            self.periods,
            self.stop_reason,
            fmt_period(self.transition_period),
            fmt_period(self.payout_start_period),
            self.total_contributions,
            self.total_interest,
            self.total_payouts,
            self.final_retirement,
            self.final_excess,
            self.final_net_assets,
        )
    }
}
