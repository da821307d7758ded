use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Debt, DebtStatus};

// hard ceiling on amortization loops: 100 years of monthly payments
pub const MAX_SCHEDULE_MONTHS: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub month: u32,
    pub interest_cents: i64,
    pub principal_cents: i64,
    /// Remaining balance after this month's payment.
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayoffProjection {
    /// `None` means the debt never amortizes at this payment.
    pub months: Option<u32>,
    pub total_interest_cents: Option<i64>,
    pub payoff_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenarioComparison {
    pub baseline: PayoffProjection,
    pub scenario: PayoffProjection,
    pub months_saved: Option<i64>,
    pub interest_saved_cents: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentSplit {
    pub interest_cents: i64,
    pub principal_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffStrategy {
    Avalanche,
    Snowball,
}

struct MonthStep {
    interest_cents: i64,
    principal_cents: i64,
    balance_after_cents: i64,
}

/// One month of interest accrued on a balance at an annual rate.
pub fn monthly_interest_cents(balance_cents: i64, annual_rate: f64) -> i64 {
    ((balance_cents as f64) * (annual_rate / 12.0)).round().max(0.0) as i64
}

/// One month of the amortization loop. `None` when the payment does not
/// exceed the month's interest, i.e. the balance can never be paid down.
/// Every schedule-shaped computation below goes through this single step so
/// months, total interest and chart rows can never disagree.
fn step_month(balance_cents: i64, annual_rate: f64, payment_cents: i64) -> Option<MonthStep> {
    let interest = monthly_interest_cents(balance_cents, annual_rate);
    if payment_cents <= interest {
        return None;
    }
    // final month: never overshoot the remaining balance
    let principal = (payment_cents - interest).min(balance_cents);
    Some(MonthStep {
        interest_cents: interest,
        principal_cents: principal,
        balance_after_cents: balance_cents - principal,
    })
}

/// Share of the original balance already paid off, as a percentage in [0, 100].
pub fn progress_percent(original_balance_cents: i64, current_balance_cents: i64) -> f64 {
    if original_balance_cents <= 0 {
        return 0.0;
    }
    let paid = (original_balance_cents - current_balance_cents) as f64;
    (paid / original_balance_cents as f64 * 100.0).clamp(0.0, 100.0)
}

/// Months until payoff at a fixed monthly payment. `Some(0)` for an already
/// cleared balance; `None` when the payment never covers the interest (or
/// the 100-year ceiling is hit).
pub fn payoff_months(balance_cents: i64, annual_rate: f64, payment_cents: i64) -> Option<u32> {
    let mut balance = balance_cents;
    let mut months = 0u32;
    while balance > 0 {
        let step = step_month(balance, annual_rate, payment_cents)?;
        balance = step.balance_after_cents;
        months += 1;
        if months >= MAX_SCHEDULE_MONTHS && balance > 0 {
            return None;
        }
    }
    Some(months)
}

/// Total interest paid over the life of the debt, on the same stepping as
/// [`payoff_months`]. `None` when the debt never amortizes.
pub fn total_interest_cents(
    balance_cents: i64,
    annual_rate: f64,
    payment_cents: i64,
) -> Option<i64> {
    let mut balance = balance_cents;
    let mut months = 0u32;
    let mut interest_total = 0i64;
    while balance > 0 {
        let step = step_month(balance, annual_rate, payment_cents)?;
        interest_total += step.interest_cents;
        balance = step.balance_after_cents;
        months += 1;
        if months >= MAX_SCHEDULE_MONTHS && balance > 0 {
            return None;
        }
    }
    Some(interest_total)
}

pub fn payoff_date(today: NaiveDate, months: Option<u32>) -> Option<NaiveDate> {
    months.and_then(|m| today.checked_add_months(Months::new(m)))
}

/// Month-by-month rows for charting, capped at `max_months`. Empty when the
/// payment cannot amortize the balance, so callers surface that explicitly
/// instead of rendering an endlessly growing series.
pub fn payment_schedule(
    balance_cents: i64,
    annual_rate: f64,
    payment_cents: i64,
    max_months: u32,
) -> Vec<ScheduleRow> {
    let cap = max_months.min(MAX_SCHEDULE_MONTHS);
    let mut rows = Vec::new();
    let mut balance = balance_cents;
    for month in 1..=cap {
        if balance <= 0 {
            break;
        }
        let Some(step) = step_month(balance, annual_rate, payment_cents) else {
            break;
        };
        rows.push(ScheduleRow {
            month,
            interest_cents: step.interest_cents,
            principal_cents: step.principal_cents,
            balance_cents: step.balance_after_cents,
        });
        balance = step.balance_after_cents;
    }
    rows
}

pub fn projection(
    balance_cents: i64,
    annual_rate: f64,
    payment_cents: i64,
    today: NaiveDate,
) -> PayoffProjection {
    let months = payoff_months(balance_cents, annual_rate, payment_cents);
    PayoffProjection {
        months,
        total_interest_cents: total_interest_cents(balance_cents, annual_rate, payment_cents),
        payoff_date: payoff_date(today, months),
    }
}

/// What paying `extra_cents` on top of the minimum every month would change.
/// Pure re-computation for display; the stored debt is untouched.
pub fn what_if_extra_payment(debt: &Debt, extra_cents: i64, today: NaiveDate) -> ScenarioComparison {
    compare(
        projection(
            debt.current_balance_cents,
            debt.interest_rate,
            debt.minimum_payment_cents,
            today,
        ),
        projection(
            debt.current_balance_cents,
            debt.interest_rate,
            debt.minimum_payment_cents.saturating_add(extra_cents),
            today,
        ),
    )
}

/// What refinancing to `new_rate` (same minimum payment) would change.
pub fn what_if_refinance(debt: &Debt, new_rate: f64, today: NaiveDate) -> ScenarioComparison {
    compare(
        projection(
            debt.current_balance_cents,
            debt.interest_rate,
            debt.minimum_payment_cents,
            today,
        ),
        projection(
            debt.current_balance_cents,
            new_rate,
            debt.minimum_payment_cents,
            today,
        ),
    )
}

fn compare(baseline: PayoffProjection, scenario: PayoffProjection) -> ScenarioComparison {
    // savings are signed: a refinance to a worse rate comes out negative
    let months_saved = match (baseline.months, scenario.months) {
        (Some(b), Some(s)) => Some(i64::from(b) - i64::from(s)),
        _ => None,
    };
    let interest_saved_cents = match (baseline.total_interest_cents, scenario.total_interest_cents)
    {
        (Some(b), Some(s)) => Some(b - s),
        _ => None,
    };
    ScenarioComparison {
        baseline,
        scenario,
        months_saved,
        interest_saved_cents,
    }
}

/// Interest/principal attribution when recording a payment: one month of
/// accrued interest on the current balance, capped at the amount, with the
/// remainder applied to principal. Matches the amortization stepping so
/// recorded payments and projections agree.
pub fn split_payment(balance_cents: i64, annual_rate: f64, amount_cents: i64) -> PaymentSplit {
    let interest = monthly_interest_cents(balance_cents, annual_rate)
        .min(amount_cents)
        .max(0);
    PaymentSplit {
        interest_cents: interest,
        principal_cents: amount_cents - interest,
    }
}

/// Rank active debts for a payoff plan: avalanche pays the highest rate
/// first, snowball the smallest balance. Rank is 1-indexed.
pub fn rank_debts(debts: &[Debt], strategy: PayoffStrategy) -> Vec<(u32, &Debt)> {
    let mut active: Vec<&Debt> = debts
        .iter()
        .filter(|d| d.status == DebtStatus::Active)
        .collect();
    match strategy {
        PayoffStrategy::Avalanche => {
            active.sort_by(|a, b| b.interest_rate.total_cmp(&a.interest_rate))
        }
        PayoffStrategy::Snowball => active.sort_by_key(|d| d.current_balance_cents),
    }
    active
        .into_iter()
        .enumerate()
        .map(|(i, debt)| (i as u32 + 1, debt))
        .collect()
}
