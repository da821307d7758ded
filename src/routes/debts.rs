use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::debt::{
    self as debt_engine, PayoffProjection, PayoffStrategy, ScenarioComparison, ScheduleRow,
};
use crate::error::{AppError, Result};
use crate::models::{Debt, DebtStatus};
use crate::store::{DebtUpdate, NewDebt};
use crate::AppState;

const DEFAULT_SCHEDULE_MONTHS: u32 = 60;

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: Uuid,
    status: Option<DebtStatus>,
}

#[derive(Deserialize)]
struct CreateDebtBody {
    user_id: Uuid,
    #[serde(flatten)]
    debt: NewDebt,
}

#[derive(Deserialize)]
struct UpdateDebtBody {
    user_id: Uuid,
    #[serde(flatten)]
    update: DebtUpdate,
}

#[derive(Deserialize)]
struct ScheduleQuery {
    user_id: Uuid,
    months: Option<u32>,
}

#[derive(Deserialize)]
struct WhatIfQuery {
    user_id: Uuid,
    extra_payment_cents: Option<i64>,
    interest_rate: Option<f64>,
}

#[derive(Deserialize)]
struct PlanQuery {
    user_id: Uuid,
    strategy: Option<PayoffStrategy>,
}

#[derive(Serialize)]
struct DebtSummary {
    progress_percent: f64,
    monthly_interest_cents: i64,
    payoff: PayoffProjection,
    debt: Debt,
}

#[derive(Serialize)]
struct ScheduleResponse {
    amortizes: bool,
    rows: Vec<ScheduleRow>,
}

#[derive(Serialize)]
struct PlanEntry {
    rank: u32,
    debt: Debt,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/debts", get(list_debts).post(create_debt))
        .route("/debts/plan", get(payoff_plan))
        .route(
            "/debts/:id",
            get(get_debt).put(update_debt).delete(delete_debt),
        )
        .route("/debts/:id/summary", get(debt_summary))
        .route("/debts/:id/schedule", get(debt_schedule))
        .route("/debts/:id/what-if", get(what_if))
        .with_state(state)
}

async fn list_debts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Debt>>> {
    let mut debts = state.debts.list_debts(query.user_id).await?;
    if let Some(status) = query.status {
        debts.retain(|d| d.status == status);
    }
    Ok(Json(debts))
}

async fn create_debt(
    State(state): State<AppState>,
    Json(body): Json<CreateDebtBody>,
) -> Result<(StatusCode, Json<Debt>)> {
    validate_new_debt(&body.debt)?;
    let debt = state.debts.create_debt(body.user_id, body.debt).await?;
    Ok((StatusCode::CREATED, Json(debt)))
}

async fn get_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Debt>> {
    Ok(Json(state.debts.get_debt(query.user_id, id).await?))
}

async fn update_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDebtBody>,
) -> Result<Json<Debt>> {
    validate_update(&body.update)?;
    let debt = state.debts.update_debt(body.user_id, id, body.update).await?;
    Ok(Json(debt))
}

async fn delete_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<StatusCode> {
    state.debts.delete_debt(query.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn debt_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DebtSummary>> {
    let debt = state.debts.get_debt(query.user_id, id).await?;
    let today = Utc::now().naive_utc().date();
    Ok(Json(DebtSummary {
        progress_percent: debt_engine::progress_percent(
            debt.original_balance_cents,
            debt.current_balance_cents,
        ),
        monthly_interest_cents: debt_engine::monthly_interest_cents(
            debt.current_balance_cents,
            debt.interest_rate,
        ),
        payoff: debt_engine::projection(
            debt.current_balance_cents,
            debt.interest_rate,
            debt.minimum_payment_cents,
            today,
        ),
        debt,
    }))
}

async fn debt_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>> {
    let debt = state.debts.get_debt(query.user_id, id).await?;
    let rows = debt_engine::payment_schedule(
        debt.current_balance_cents,
        debt.interest_rate,
        debt.minimum_payment_cents,
        query.months.unwrap_or(DEFAULT_SCHEDULE_MONTHS),
    );
    let amortizes = debt_engine::payoff_months(
        debt.current_balance_cents,
        debt.interest_rate,
        debt.minimum_payment_cents,
    )
    .is_some();
    Ok(Json(ScheduleResponse { amortizes, rows }))
}

async fn what_if(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<WhatIfQuery>,
) -> Result<Json<ScenarioComparison>> {
    let debt = state.debts.get_debt(query.user_id, id).await?;
    let today = Utc::now().naive_utc().date();
    let comparison = match (query.extra_payment_cents, query.interest_rate) {
        (Some(extra), None) => {
            if extra <= 0 {
                return Err(AppError::InvalidInput(
                    "extra payment must be positive".to_string(),
                ));
            }
            debt_engine::what_if_extra_payment(&debt, extra, today)
        }
        (None, Some(rate)) => {
            validate_rate(rate)?;
            debt_engine::what_if_refinance(&debt, rate, today)
        }
        _ => {
            return Err(AppError::InvalidInput(
                "provide exactly one of extra_payment_cents or interest_rate".to_string(),
            ))
        }
    };
    Ok(Json(comparison))
}

async fn payoff_plan(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<Vec<PlanEntry>>> {
    let debts = state.debts.list_debts(query.user_id).await?;
    let strategy = query.strategy.unwrap_or(PayoffStrategy::Avalanche);
    let plan = debt_engine::rank_debts(&debts, strategy)
        .into_iter()
        .map(|(rank, debt)| PlanEntry {
            rank,
            debt: debt.clone(),
        })
        .collect();
    Ok(Json(plan))
}

fn validate_new_debt(new: &NewDebt) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name must not be empty".to_string()));
    }
    if new.original_balance_cents < 0 {
        return Err(AppError::InvalidInput(
            "original balance must not be negative".to_string(),
        ));
    }
    if let Some(current) = new.current_balance_cents {
        if current < 0 {
            return Err(AppError::InvalidInput(
                "current balance must not be negative".to_string(),
            ));
        }
        if current > new.original_balance_cents {
            return Err(AppError::InvalidInput(
                "current balance cannot exceed the original balance".to_string(),
            ));
        }
    }
    validate_rate(new.interest_rate)?;
    if new.minimum_payment_cents <= 0 {
        return Err(AppError::InvalidInput(
            "minimum payment must be positive".to_string(),
        ));
    }
    validate_due_day(new.due_day)
}

fn validate_update(update: &DebtUpdate) -> Result<()> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("name must not be empty".to_string()));
        }
    }
    if let Some(rate) = update.interest_rate {
        validate_rate(rate)?;
    }
    if let Some(minimum) = update.minimum_payment_cents {
        if minimum <= 0 {
            return Err(AppError::InvalidInput(
                "minimum payment must be positive".to_string(),
            ));
        }
    }
    if let Some(day) = update.due_day {
        validate_due_day(day)?;
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<()> {
    // NaN fails the range check and is rejected with the rest
    if !(0.0..1.0).contains(&rate) {
        return Err(AppError::InvalidInput(
            "interest rate must be a fraction in [0, 1)".to_string(),
        ));
    }
    Ok(())
}

fn validate_due_day(day: i16) -> Result<()> {
    if !(1..=31).contains(&day) {
        return Err(AppError::InvalidInput(
            "due day must be between 1 and 31".to_string(),
        ));
    }
    Ok(())
}
