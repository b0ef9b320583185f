//! Monthly projection engine
//!
//! Each period runs, in order: loan payment, contribution allocation,
//! year-end interest, the one-time retirement transition, payout
//! draw-down, then hands the period record to the sinks.

use super::cashflows::{PeriodRecord, ProjectionResult, StopReason};
use super::sink::PeriodSink;
use super::state::{LifecycleStage, ProjectionState};
use crate::account::{round_cents, Account, LedgerError, AMOUNT_EPSILON};
use crate::assumptions::Assumptions;
use crate::calendar::Period;
use crate::error::ProjectionError;
use chrono::Datelike;
use log::{debug, info, warn};

/// Projection engine for one member account
pub struct ProjectionEngine<'a> {
    assumptions: &'a Assumptions,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(assumptions: &'a Assumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &Assumptions {
        self.assumptions
    }

    /// Run the full schedule, feeding every period to `sinks`.
    ///
    /// Sinks are only finished when the run succeeds.
    pub fn run(&self, sinks: &mut [&mut dyn PeriodSink]) -> Result<ProjectionResult, ProjectionError> {
        let (result, _) = self.run_with_state(sinks)?;
        Ok(result)
    }

    /// As [`run`](Self::run), also returning the final state with the full ledger
    pub fn run_with_state(
        &self,
        sinks: &mut [&mut dyn PeriodSink],
    ) -> Result<(ProjectionResult, ProjectionState), ProjectionError> {
        let a = self.assumptions;
        a.validate()?;
        let schedule = a.schedule()?;

        info!(
            "Projecting {} periods from {} to {} (salary {:.2}, tier {})",
            schedule.len(),
            a.start_date,
            a.end_date,
            a.salary,
            a.retirement_tier
        );

        let mut state = ProjectionState::from_assumptions(a)?;
        let mut stop_reason = StopReason::EndOfSchedule;

        for period in schedule.periods() {
            let mark = state.ledger.events().len();
            let record = self.calculate_period(&mut state, &period)?;
            for sink in sinks.iter_mut() {
                sink.on_period(&record, state.ledger.events_since(mark))?;
            }

            if state.is_depleted() {
                warn!(
                    "Retirement account depleted in {}; stopping at age {}",
                    period.key(),
                    period.age
                );
                stop_reason = StopReason::Depleted;
                break;
            }
        }

        for sink in sinks.iter_mut() {
            sink.finish()?;
        }

        let result = ProjectionResult::from_state(&state, stop_reason);
        info!(
            "Projection finished after {} periods ({:?}); final RA {:.2}, excess {:.2}",
            result.periods_processed,
            result.stop_reason,
            result.final_balances.retirement,
            result.final_balances.excess
        );
        Ok((result, state))
    }

    /// Apply every step of one period and build its record
    pub fn calculate_period(
        &self,
        state: &mut ProjectionState,
        period: &Period,
    ) -> Result<PeriodRecord, LedgerError> {
        state.ledger.set_period(period.period_end);

        let mut record = PeriodRecord::new(period.index, period.period_end, period.age);
        record.loan_payment = self.apply_loan_payment(state, period)?;
        record.contribution = self.apply_contributions(state, period)?;
        if period.is_year_end() {
            record.interest = self.apply_interest(state, period)?;
        }
        self.apply_transition(state, period)?;
        record.payout = self.apply_payout(state, period)?;

        state.periods_processed += 1;
        state.cumulative_loan_payments += record.loan_payment;
        state.cumulative_contributions += record.contribution;
        state.cumulative_interest += record.interest;
        state.cumulative_payouts += record.payout;

        record.stage = state.stage;
        record.balances = state.ledger.snapshot();
        Ok(record)
    }

    /// Scheduled instalment, limited by the loan and the Ordinary balance
    fn apply_loan_payment(&self, state: &mut ProjectionState, period: &Period) -> Result<f64, LedgerError> {
        let outstanding = state.balance(Account::Loan);
        let due = self.assumptions.loan_payments.payment_due(period.index, outstanding);
        if due < AMOUNT_EPSILON {
            return Ok(0.0);
        }

        let available = state.balance(Account::Ordinary);
        let payment = round_cents(due.min(available));
        if payment + AMOUNT_EPSILON < due {
            warn!(
                "{}: loan instalment {:.2} limited to Ordinary balance {:.2}",
                period.key(),
                due,
                available
            );
        }

        state.ledger.record_outflow(Account::Ordinary, payment, "loan_payment")?;
        state.ledger.record_outflow(Account::Loan, payment, "loan_payment")?;
        if state.balance(Account::Loan) < AMOUNT_EPSILON {
            info!("{}: loan fully repaid", period.key());
        }
        Ok(payment)
    }

    fn apply_contributions(&self, state: &mut ProjectionState, period: &Period) -> Result<f64, LedgerError> {
        let calculator = self.assumptions.contribution_calculator();
        let mut total = 0.0;

        for (account, amount) in calculator.allocations(period.age, self.assumptions.salary) {
            if state.ledger.is_closed(account) {
                debug!("{}: skipping allocation to closed {}", period.key(), account);
                continue;
            }
            let amount = round_cents(amount);
            state.ledger.record_inflow(account, amount, "contribution")?;
            total += amount;
        }

        debug!(
            "{}: contributions {:.2} at age {} ({})",
            period.key(),
            total,
            period.age,
            calculator.bracket(period.age)
        );
        Ok(total)
    }

    /// Base and bonus interest on the balances as they stand before crediting
    fn apply_interest(&self, state: &mut ProjectionState, period: &Period) -> Result<f64, LedgerError> {
        let balances = state.ledger.snapshot();
        let credits = self.assumptions.interest_engine().annual_credits(&balances, period.age);
        let mut total = 0.0;

        for credit in credits {
            if state.ledger.is_closed(credit.account) {
                continue;
            }
            let amount = round_cents(credit.amount);
            state.ledger.record_inflow(credit.account, amount, credit.kind.reason())?;
            debug!(
                "{}: {} {:.2} to {}",
                period.key(),
                credit.kind.reason(),
                amount,
                credit.account
            );
            total += amount;
        }
        Ok(total)
    }

    /// One-time transfer in the birthday month of the year the transition
    /// age is reached (or the first birthday month after, for late starts).
    ///
    /// Keyed on the calendar year rather than `period.age`: a 29 February
    /// birthday falls after the period end in common years.
    fn apply_transition(&self, state: &mut ProjectionState, period: &Period) -> Result<(), LedgerError> {
        let a = self.assumptions;
        let turning = period.year() - a.birth_date.year();
        let triggered = state.stage == LifecycleStage::Accumulating
            && period.month() == a.birth_date.month()
            && turning >= a.transition_age as i32;
        if !triggered {
            return Ok(());
        }

        let ledger = &mut state.ledger;

        // 1. Settle the loan from Ordinary, then Special
        for source in [Account::Ordinary, Account::Special] {
            let amount = ledger.balance(Account::Loan).min(ledger.balance(source));
            ledger.record_outflow(source, amount, "transition_loan_settlement")?;
            ledger.record_outflow(Account::Loan, amount, "transition_loan_settlement")?;
        }
        let unsettled = ledger.balance(Account::Loan);
        if unsettled > AMOUNT_EPSILON {
            warn!(
                "{}: loan of {:.2} left unsettled at transition",
                period.key(),
                unsettled
            );
        }

        // 2. Top Retirement up to the selected sum, Ordinary first
        let target = a.retirement_sum().amount;
        for source in [Account::Ordinary, Account::Special] {
            let shortfall = (target - ledger.balance(Account::Retirement)).max(0.0);
            let amount = shortfall.min(ledger.balance(source));
            ledger.transfer(source, Account::Retirement, amount, "transition_retirement_sum")?;
        }

        // 3. Release whatever is left
        for source in [Account::Ordinary, Account::Special] {
            let amount = ledger.balance(source);
            ledger.transfer(source, Account::Excess, amount, "transition_excess")?;
        }

        // 4. Special stays closed from here on
        ledger.close(Account::Special, "transition_close")?;

        state.stage = LifecycleStage::Transitioned;
        state.transition_period = Some(period.period_end);
        info!(
            "{}: retirement transition at age {}; RA {:.2} of {} target {:.2}",
            period.key(),
            period.age,
            state.balance(Account::Retirement),
            a.retirement_tier,
            target
        );
        Ok(())
    }

    fn apply_payout(&self, state: &mut ProjectionState, period: &Period) -> Result<f64, LedgerError> {
        let a = self.assumptions;
        if !state.has_transitioned() || state.is_depleted() || period.age < a.payout_age {
            return Ok(0.0);
        }

        if state.stage == LifecycleStage::Transitioned {
            state.stage = LifecycleStage::PayingOut;
            state.payout_start_period = Some(period.period_end);
            info!(
                "{}: payouts of {:.2} begin at age {}",
                period.key(),
                a.retirement_sum().payout,
                period.age
            );
        }

        let amount = round_cents(a.retirement_sum().payout.min(state.balance(Account::Retirement)));
        state
            .ledger
            .transfer(Account::Retirement, Account::Excess, amount, "payout")?;

        if state.balance(Account::Retirement) < AMOUNT_EPSILON {
            state.stage = LifecycleStage::Depleted;
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::CollectingSink;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// No contributions, no interest: only scheduled movements remain
    fn quiet(start: NaiveDate, end: NaiveDate, birth: NaiveDate) -> Assumptions {
        let mut a = Assumptions::with_defaults(start, end, birth, 0.0);
        a.interest_rates.oa_below_transition = 0.0;
        a.interest_rates.oa_above_transition = 0.0;
        a.interest_rates.sa = 0.0;
        a.interest_rates.ma = 0.0;
        a.interest_rates.ra = 0.0;
        a.bonus_interest.below_transition = 0.0;
        a.bonus_interest.first_band_above_transition = 0.0;
        a.bonus_interest.next_band_above_transition = 0.0;
        a
    }

    #[test]
    fn test_loan_limited_by_ordinary() {
        let mut a = quiet(date(2025, 1, 1), date(2025, 3, 31), date(1985, 5, 1));
        a.initial_balances.oa = 2_000.0;
        a.initial_balances.loan = 10_000.0;

        let (result, state) = ProjectionEngine::new(&a).run_with_state(&mut []).unwrap();
        assert_eq!(result.periods_processed, 3);
        assert_eq!(state.balance(Account::Ordinary), 0.0);
        assert_abs_diff_eq!(state.balance(Account::Loan), 8_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.cumulative_loan_payments, 2_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_loan_tier_changes_with_loan_year() {
        let mut a = quiet(date(2025, 1, 1), date(2027, 1, 31), date(1985, 5, 1));
        a.initial_balances.oa = 100_000.0;
        a.initial_balances.loan = 100_000.0;

        let mut sink = CollectingSink::new();
        ProjectionEngine::new(&a).run(&mut [&mut sink]).unwrap();

        assert_eq!(sink.records[0].loan_payment, 1_687.39);
        assert_eq!(sink.records[23].loan_payment, 1_687.39);
        assert_eq!(sink.records[24].loan_payment, 1_782.27);
    }

    #[test]
    fn test_contributions_follow_bracket() {
        let mut a = quiet(date(2025, 1, 1), date(2025, 1, 31), date(1985, 5, 1));
        a.salary = 10_000.0;

        let mut sink = CollectingSink::new();
        let result = ProjectionEngine::new(&a).run(&mut [&mut sink]).unwrap();

        // 37% of the 7,400 ceiling
        assert_abs_diff_eq!(result.cumulative_contributions, 2_738.0, epsilon = 0.02);
        let b = &sink.records[0].balances;
        assert_abs_diff_eq!(b.ordinary, 2_738.0 * 0.6217, epsilon = 0.01);
        assert_abs_diff_eq!(b.special, 2_738.0 * 0.1621, epsilon = 0.01);
        assert_abs_diff_eq!(b.medisave, 2_738.0 * 0.2162, epsilon = 0.01);
        assert_eq!(b.retirement, 0.0);
    }

    #[test]
    fn test_interest_only_in_december() {
        let mut a = Assumptions::with_defaults(date(2025, 1, 1), date(2026, 2, 28), date(1985, 5, 1), 0.0);
        a.initial_balances.oa = 10_000.0;

        let mut sink = CollectingSink::new();
        ProjectionEngine::new(&a).run(&mut [&mut sink]).unwrap();

        for record in &sink.records {
            if record.period_end.format("%m").to_string() == "12" {
                assert_abs_diff_eq!(record.interest, 250.0, epsilon = 1e-9);
            } else {
                assert_eq!(record.interest, 0.0);
            }
        }
        assert_eq!(sink.records.last().unwrap().balances.ordinary, 10_250.0);
    }

    #[test]
    fn test_transition_moves_funds_in_order() {
        let mut a = quiet(date(2030, 1, 1), date(2030, 12, 31), date(1975, 6, 10));
        a.initial_balances.oa = 150_000.0;
        a.initial_balances.sa = 100_000.0;
        a.initial_balances.ma = 20_000.0;
        a.initial_balances.loan = 5_000.0;
        a.loan_payments = crate::assumptions::LoanSchedule {
            year_1_2: 0.0,
            year_3: 0.0,
            year_4_beyond: 0.0,
        };

        let mut sink = CollectingSink::new();
        let (result, state) = ProjectionEngine::new(&a).run_with_state(&mut [&mut sink]).unwrap();

        assert_eq!(result.transition_period, Some(date(2030, 6, 30)));
        assert_eq!(state.balance(Account::Loan), 0.0);
        assert_eq!(state.balance(Account::Retirement), 213_000.0);
        assert_eq!(state.balance(Account::Special), 0.0);
        assert_eq!(state.balance(Account::Ordinary), 0.0);
        assert_eq!(state.balance(Account::Excess), 150_000.0 + 100_000.0 - 5_000.0 - 213_000.0);
        assert_eq!(state.balance(Account::MediSave), 20_000.0);
        assert!(state.ledger.is_closed(Account::Special));

        // Ordinary is drained before Special contributes to the retirement sum
        let transfers: Vec<_> = state
            .ledger
            .events()
            .iter()
            .filter(|e| e.reason == "transition_retirement_sum" && e.delta < 0.0)
            .collect();
        assert_eq!(transfers[0].account, Account::Ordinary);
        assert_eq!(transfers[0].delta, -145_000.0);
        assert_eq!(transfers[1].account, Account::Special);
        assert_eq!(transfers[1].delta, -68_000.0);

        // May is still accumulating
        assert_eq!(sink.records[4].stage, LifecycleStage::Accumulating);
        assert_eq!(sink.records[5].stage, LifecycleStage::Transitioned);
    }

    #[test]
    fn test_transition_for_leap_day_birthday() {
        // Turns 55 on 29 Feb 2027, which does not exist
        let mut a = quiet(date(2026, 1, 1), date(2028, 12, 31), date(1972, 2, 29));
        a.initial_balances.oa = 250_000.0;

        let mut sink = CollectingSink::new();
        let result = ProjectionEngine::new(&a).run(&mut [&mut sink]).unwrap();

        assert_eq!(result.transition_period, Some(date(2027, 2, 28)));
        let feb = sink.records.iter().find(|r| r.period_end == date(2027, 2, 28)).unwrap();
        assert_eq!(feb.stage, LifecycleStage::Transitioned);
        assert_eq!(feb.balances.retirement, 213_000.0);
        let mar = sink.records.iter().find(|r| r.period_end == date(2027, 3, 31)).unwrap();
        assert_eq!(mar.age, 55);
    }

    #[test]
    fn test_transition_month_contributions_use_upper_bracket() {
        // Age 55 at the end of June 2030, so the month allocates with 55_to_60
        let mut a = quiet(date(2030, 6, 1), date(2030, 6, 30), date(1975, 6, 10));
        a.salary = 1_000.0;
        a.initial_balances.oa = 300_000.0;

        let (_, state) = ProjectionEngine::new(&a).run_with_state(&mut []).unwrap();

        let contributions: Vec<_> = state
            .ledger
            .events()
            .iter()
            .filter(|e| e.reason == "contribution")
            .collect();
        assert!(contributions.iter().all(|e| e.account != Account::Special));
        let to_retirement = contributions
            .iter()
            .find(|e| e.account == Account::Retirement)
            .unwrap();
        // 29% of 1,000 with 35.59% to Retirement
        assert_abs_diff_eq!(to_retirement.delta, 103.21, epsilon = 1e-9);

        // That contribution counts toward the retirement sum
        assert_abs_diff_eq!(state.balance(Account::Retirement), 213_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(state.balance(Account::Excess), 87_216.25, epsilon = 1e-6);
        assert_abs_diff_eq!(state.balance(Account::MediSave), 73.75, epsilon = 1e-9);
    }

    #[test]
    fn test_csv_output_discarded_when_a_later_sink_fails() {
        struct FailingSink;

        impl PeriodSink for FailingSink {
            fn on_period(
                &mut self,
                _record: &PeriodRecord,
                _events: &[crate::account::BalanceEvent],
            ) -> Result<(), crate::projection::SinkError> {
                Ok(())
            }

            fn finish(&mut self) -> Result<(), crate::projection::SinkError> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("periods.csv");
        let a = quiet(date(2025, 1, 1), date(2025, 3, 31), date(1985, 5, 1));

        {
            let mut csv = crate::projection::CsvSink::create(&path).unwrap();
            let mut failing = FailingSink;
            let mut sinks: [&mut dyn PeriodSink; 2] = [&mut csv, &mut failing];
            let result = ProjectionEngine::new(&a).run(&mut sinks);
            assert!(matches!(result, Err(ProjectionError::Sink(_))));
        }

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_transition_counts_existing_retirement_balance() {
        let mut a = quiet(date(2030, 6, 1), date(2030, 6, 30), date(1975, 6, 10));
        a.initial_balances.oa = 50_000.0;
        a.initial_balances.ra = 200_000.0;

        let (_, state) = ProjectionEngine::new(&a).run_with_state(&mut []).unwrap();
        assert_eq!(state.balance(Account::Retirement), 213_000.0);
        assert_eq!(state.balance(Account::Excess), 37_000.0);
    }

    #[test]
    fn test_never_transitions_when_schedule_ends_early() {
        let a = quiet(date(2025, 1, 1), date(2025, 12, 31), date(1990, 1, 1));
        let result = ProjectionEngine::new(&a).run(&mut []).unwrap();
        assert_eq!(result.transition_period, None);
        assert_eq!(result.final_stage, LifecycleStage::Accumulating);
        assert_eq!(result.stop_reason, StopReason::EndOfSchedule);
    }

    #[test]
    fn test_payout_draws_down_until_depleted() {
        // Turns 55 in March 2030 and 65 in March 2040
        let mut a = quiet(date(2030, 3, 1), date(2045, 12, 31), date(1975, 3, 1));
        a.retirement_tier = crate::assumptions::RetirementTier::Basic;
        a.initial_balances.oa = 2_000.0;
        a.initial_balances.sa = 1_000.0;

        let mut sink = CollectingSink::new();
        let result = ProjectionEngine::new(&a).run(&mut [&mut sink]).unwrap();

        assert_eq!(result.transition_period, Some(date(2030, 3, 31)));
        assert_eq!(result.payout_start_period, Some(date(2040, 3, 31)));
        assert_eq!(result.stop_reason, StopReason::Depleted);
        assert_eq!(result.final_stage, LifecycleStage::Depleted);

        // 3,000 at 890 a month: 890, 890, 890, 330
        let payouts: Vec<f64> = sink.records.iter().map(|r| r.payout).filter(|p| *p > 0.0).collect();
        assert_eq!(payouts, vec![890.0, 890.0, 890.0, 330.0]);
        assert_eq!(result.final_balances.retirement, 0.0);
        assert_eq!(result.final_balances.excess, 3_000.0);
        assert_eq!(sink.records.last().unwrap().period_end, date(2040, 6, 30));
        assert!(sink.finished);
    }

    #[test]
    fn test_invalid_assumptions_rejected_before_any_period() {
        let mut a = quiet(date(2025, 1, 1), date(2025, 12, 31), date(1990, 1, 1));
        a.salary_cap = -1.0;

        let mut sink = CollectingSink::new();
        let result = ProjectionEngine::new(&a).run(&mut [&mut sink]);
        assert!(matches!(result, Err(ProjectionError::Config(_))));
        assert!(sink.records.is_empty());
        assert!(!sink.finished);
    }
}
