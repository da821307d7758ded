use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::cycle as cycle_engine;
use crate::error::Result;
use crate::AppState;

#[derive(Deserialize)]
struct CycleStatsQuery {
    user_id: Uuid,
}

#[derive(Serialize)]
struct CycleStat {
    cycle_number: i32,
    /// Null while the cycle is still open.
    period_length: Option<i64>,
    /// Start-to-next-start; null for the latest cycle.
    cycle_length: Option<i64>,
}

#[derive(Serialize)]
struct CycleStatsResponse {
    total_cycles: usize,
    completed_cycles: usize,
    average_cycle_length: Option<f64>,
    average_period_length: Option<f64>,
    shortest_cycle: Option<i64>,
    longest_cycle: Option<i64>,
    cycle_stats: Vec<CycleStat>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/cycle-stats", get(get_cycle_stats))
        .with_state(state)
}

async fn get_cycle_stats(
    State(state): State<AppState>,
    Query(query): Query<CycleStatsQuery>,
) -> Result<Json<CycleStatsResponse>> {
    let cycles = state.periods.list_cycles(query.user_id).await?;
    let stats = cycle_engine::cycle_statistics(&cycles);

    let cycle_stats = cycles
        .iter()
        .enumerate()
        .map(|(i, cycle)| CycleStat {
            cycle_number: (i + 1) as i32,
            period_length: cycle
                .end_date
                .map(|end| (end - cycle.start_date).num_days() + 1),
            cycle_length: cycles
                .get(i + 1)
                .map(|next| (next.start_date - cycle.start_date).num_days()),
        })
        .collect();

    Ok(Json(CycleStatsResponse {
        total_cycles: stats.total_cycles,
        completed_cycles: stats.completed_cycles,
        average_cycle_length: stats.avg_cycle_length,
        average_period_length: stats.avg_period_length,
        shortest_cycle: stats.shortest_cycle,
        longest_cycle: stats.longest_cycle,
        cycle_stats,
    }))
}
