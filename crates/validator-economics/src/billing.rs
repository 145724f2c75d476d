//! Billing-cycle projection
//!
//! Revenue to date is extrapolated linearly over the whole cycle and compared
//! with the fixed monthly expense plus the operator's share of vote costs.
//! Nothing here is clamped: a run before the cycle start or after its end
//! reports negative or >100% values so the extrapolation stays visible.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use std::ops::Range;

use crate::aggregate::RewardsSummary;
use crate::constants;
use crate::error::{DivisionGuardError, EconomicsError, Result, RunWarning};

/// Accounting window, with the instant the report was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingCycle {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl BillingCycle {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(EconomicsError::InvalidCycle(format!(
                "end {end} is not after start {start}"
            )));
        }
        Ok(Self { start, end, now })
    }

    /// The monthly cycle starting on `start_day` (00:00 UTC) that contains `now`
    pub fn containing(now: DateTime<Utc>, start_day: u32) -> Result<Self> {
        if !(1..=constants::MAX_CYCLE_START_DAY).contains(&start_day) {
            return Err(EconomicsError::InvalidCycle(format!(
                "cycle start day must be between 1 and {}, got {start_day}",
                constants::MAX_CYCLE_START_DAY
            )));
        }

        let invalid = || EconomicsError::InvalidCycle(format!("no cycle starting on day {start_day} around {now}"));
        let this_month = NaiveDate::from_ymd_opt(now.year(), now.month(), start_day).ok_or_else(invalid)?;
        let start_date = if now.date_naive() >= this_month {
            this_month
        } else {
            this_month.checked_sub_months(Months::new(1)).ok_or_else(invalid)?
        };
        let end_date = start_date.checked_add_months(Months::new(1)).ok_or_else(invalid)?;

        let midnight = |date: NaiveDate| date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).ok_or_else(invalid);
        Self::new(midnight(start_date)?, midnight(end_date)?, now)
    }

    pub fn total_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Negative when `now` precedes the cycle start
    pub fn elapsed_ms(&self) -> i64 {
        (self.now - self.start).num_milliseconds()
    }

    /// Raw fraction of the cycle elapsed; used for all projection math
    pub fn elapsed_fraction(&self) -> f64 {
        self.elapsed_ms() as f64 / self.total_ms() as f64
    }

    /// Elapsed percentage clamped to [0, 100], for progress display only
    pub fn display_elapsed_percent(&self) -> f64 {
        (self.elapsed_fraction() * 100.0).clamp(0.0, 100.0)
    }
}

/// One epoch's operator-side amounts, kept for the per-epoch breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochContribution {
    pub epoch: u64,
    pub summary: RewardsSummary,
}

/// Computed view of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitabilityReport {
    pub cycle: BillingCycle,
    /// Completed epochs covered by the cycle so far
    pub epochs: Range<u64>,
    /// Epoch in progress when the report was computed
    pub current_epoch: u64,
    pub summary: RewardsSummary,
    pub contributions: Vec<EpochContribution>,
    pub sol_price: f64,
    pub vote_cost_reimbursement_percent: f64,
    /// Vote cost left to the operator after reimbursement (SOL)
    pub reimbursed_vote_cost_native: f64,
    pub total_revenue_native: f64,
    pub net_gain_native: f64,
    pub revenue_fiat: f64,
    pub vote_cost_fiat: f64,
    pub monthly_base_expense_fiat: f64,
    pub accrued_base_expense_fiat: f64,
    pub accrued_expense_fiat: f64,
    pub monthly_total_expense_fiat: f64,
    pub projected_revenue_fiat: f64,
    pub projected_profit_fiat: f64,
    pub coverage_percent: f64,
    pub projected_coverage_percent: f64,
    pub warnings: Vec<RunWarning>,
}

impl ProfitabilityReport {
    /// Revenue so far covers the expenses accrued so far
    pub fn is_on_track(&self) -> bool {
        self.revenue_fiat >= self.accrued_expense_fiat
    }
}

fn guarded_div(numerator: f64, denominator: f64, what: &'static str) -> std::result::Result<f64, DivisionGuardError> {
    if denominator == 0.0 {
        Err(DivisionGuardError(what))
    } else {
        Ok(numerator / denominator)
    }
}

/// Project `summary` over `cycle`.
///
/// Zero denominators substitute 0 and record a [`RunWarning::DivisionGuard`].
pub fn project(
    cycle: &BillingCycle,
    summary: &RewardsSummary,
    sol_price: f64,
    monthly_base_expense_usd: f64,
    vote_cost_reimbursement_percent: f64,
) -> ProfitabilityReport {
    let mut warnings = Vec::new();
    let mut guard = |result: std::result::Result<f64, DivisionGuardError>| {
        result.unwrap_or_else(|e| {
            warnings.push(RunWarning::DivisionGuard(e));
            0.0
        })
    };

    let total_vote_cost = summary.total_vote_cost / constants::LAMPORTS_PER_SOL;
    let reimbursed_vote_cost = total_vote_cost * (1.0 - vote_cost_reimbursement_percent / 100.0);
    let total_revenue_native = summary.total_revenue() / constants::LAMPORTS_PER_SOL;
    let net_gain_native = total_revenue_native - reimbursed_vote_cost;

    let revenue_fiat = net_gain_native * sol_price;
    let vote_cost_fiat = reimbursed_vote_cost * sol_price;

    let accrued_base_expense_fiat = monthly_base_expense_usd * cycle.elapsed_fraction();
    let accrued_expense_fiat = accrued_base_expense_fiat + vote_cost_fiat;

    let elapsed_ms = cycle.elapsed_ms() as f64;
    let total_ms = cycle.total_ms() as f64;
    let projected_revenue_fiat = guard(guarded_div(revenue_fiat, elapsed_ms, "projected revenue").map(|rate| rate * total_ms));

    let monthly_total_expense_fiat = monthly_base_expense_usd + vote_cost_fiat;
    let projected_profit_fiat = projected_revenue_fiat - monthly_total_expense_fiat;

    let coverage_percent = guard(guarded_div(revenue_fiat, accrued_expense_fiat, "coverage").map(|r| r * 100.0));
    let projected_coverage_percent = guard(
        guarded_div(projected_revenue_fiat, monthly_total_expense_fiat, "projected coverage").map(|r| r * 100.0),
    );

    ProfitabilityReport {
        cycle: *cycle,
        epochs: 0..0,
        current_epoch: 0,
        summary: *summary,
        contributions: Vec::new(),
        sol_price,
        vote_cost_reimbursement_percent,
        reimbursed_vote_cost_native: reimbursed_vote_cost,
        total_revenue_native,
        net_gain_native,
        revenue_fiat,
        vote_cost_fiat,
        monthly_base_expense_fiat: monthly_base_expense_usd,
        accrued_base_expense_fiat,
        accrued_expense_fiat,
        monthly_total_expense_fiat,
        projected_revenue_fiat,
        projected_profit_fiat,
        coverage_percent,
        projected_coverage_percent,
        warnings,
    }
}
