use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{FlowIntensity, PeriodLog};
use crate::store::NewPeriodLog;
use crate::AppState;

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct NewLogBody {
    user_id: Uuid,
    #[serde(flatten)]
    log: NewPeriodLog,
}

#[derive(Deserialize)]
struct DeleteLogBody {
    user_id: Uuid,
    date: NaiveDate,
}

#[derive(Serialize)]
struct HistoryDay {
    date: NaiveDate,
    flow_intensity: Option<FlowIntensity>,
}

#[derive(Serialize)]
struct CycleHistory {
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    days: Vec<HistoryDay>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/period-log", post(log_period_day).delete(delete_period_day)) // toggle-delete
        .route("/period-logs", get(get_period_logs))
        .route("/period-history", get(get_period_history))
        .with_state(state)
}

async fn log_period_day(
    State(state): State<AppState>,
    Json(body): Json<NewLogBody>,
) -> Result<(StatusCode, Json<PeriodLog>)> {
    let log = state
        .periods
        .upsert_period_log(body.user_id, body.log)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn delete_period_day(
    State(state): State<AppState>,
    Json(body): Json<DeleteLogBody>,
) -> Result<StatusCode> {
    state
        .periods
        .delete_period_log(body.user_id, body.date)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_period_logs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<PeriodLog>>> {
    let mut logs = state.periods.list_period_logs(query.user_id).await?;
    // newest first
    logs.reverse();
    Ok(Json(logs))
}

/// Logged days grouped under the cycle they belong to. An open cycle claims
/// days up to the next cycle's start.
async fn get_period_history(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<CycleHistory>>> {
    let cycles = state.periods.list_cycles(query.user_id).await?;
    let logs = state.periods.list_period_logs(query.user_id).await?;

    let history: Vec<CycleHistory> = cycles
        .iter()
        .enumerate()
        .map(|(i, cycle)| {
            let next_start = cycles.get(i + 1).map(|c| c.start_date);
            CycleHistory {
                start_date: cycle.start_date,
                end_date: cycle.end_date,
                days: logs
                    .iter()
                    .filter(|l| {
                        l.date >= cycle.start_date
                            && match (cycle.end_date, next_start) {
                                (Some(end), _) => l.date <= end,
                                (None, Some(next)) => l.date < next,
                                (None, None) => true,
                            }
                    })
                    .map(|l| HistoryDay {
                        date: l.date,
                        flow_intensity: l.flow_intensity,
                    })
                    .collect(),
            }
        })
        .collect();

    Ok(Json(history))
}
