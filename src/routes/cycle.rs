use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::cycle::{
    self as cycle_engine, CyclePolicy, PeriodPrediction, PhaseInfo, PregnancyChance,
};
use crate::error::{AppError, Result};
use crate::models::CycleSettings;
use crate::store::CycleSettingsUpdate;
use crate::AppState;

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct DateQuery {
    user_id: Uuid,
    /// Reference date for viewpoint-relative figures; defaults to today.
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct SettingsBody {
    user_id: Uuid,
    #[serde(flatten)]
    update: CycleSettingsUpdate,
}

#[derive(Serialize)]
struct CycleSummary {
    date: NaiveDate,
    phase: Option<PhaseInfo>,
    pregnancy_chance: Option<PregnancyChance>,
    has_ongoing_period: bool,
    prediction: Option<PeriodPrediction>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/cycle/summary", get(get_cycle_summary))
        .route("/cycle/prediction", get(get_prediction))
        .route("/cycle/settings", get(get_settings).put(put_settings))
        .with_state(state)
}

/// Everything the calendar screen needs for one date. Each field degrades to
/// null on its own when there is not enough data behind it.
async fn get_cycle_summary(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<CycleSummary>> {
    let date = query.date.unwrap_or_else(|| Utc::now().naive_utc().date());
    let cycles = state.periods.list_cycles(query.user_id).await?;
    let settings = state.periods.get_settings(query.user_id).await?;
    let policy = CyclePolicy::default();

    let phase = cycle_engine::cycle_phase_for_date(date, &cycles, &settings, &policy);
    Ok(Json(CycleSummary {
        date,
        phase,
        pregnancy_chance: phase.map(|p| cycle_engine::pregnancy_chance(p.day_in_cycle)),
        has_ongoing_period: cycle_engine::has_ongoing_period(&cycles, date, &policy),
        prediction: cycle_engine::next_period_prediction(&cycles, &settings, date, &policy),
    }))
}

async fn get_prediction(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Option<PeriodPrediction>>> {
    let date = query.date.unwrap_or_else(|| Utc::now().naive_utc().date());
    let cycles = state.periods.list_cycles(query.user_id).await?;
    let settings = state.periods.get_settings(query.user_id).await?;
    Ok(Json(cycle_engine::next_period_prediction(
        &cycles,
        &settings,
        date,
        &CyclePolicy::default(),
    )))
}

async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CycleSettings>> {
    Ok(Json(state.periods.get_settings(query.user_id).await?))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<CycleSettings>> {
    let current = state.periods.get_settings(body.user_id).await?;
    validate_settings(&current, &body.update)?;
    let settings = state
        .periods
        .update_settings(body.user_id, body.update)
        .await?;
    Ok(Json(settings))
}

fn validate_settings(current: &CycleSettings, update: &CycleSettingsUpdate) -> Result<()> {
    // validate the values that will be in effect after the partial update
    let cycle_length = update.cycle_length.unwrap_or(current.cycle_length);
    let period_length = update.period_length.unwrap_or(current.period_length);
    if !(15..=90).contains(&cycle_length) {
        return Err(AppError::InvalidInput(
            "cycle length must be between 15 and 90 days".to_string(),
        ));
    }
    if !(1..=15).contains(&period_length) {
        return Err(AppError::InvalidInput(
            "period length must be between 1 and 15 days".to_string(),
        ));
    }
    if period_length >= cycle_length {
        return Err(AppError::InvalidInput(
            "period length must be shorter than the cycle length".to_string(),
        ));
    }
    Ok(())
}
