use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

use store::{DebtStore, PeriodStore};

#[derive(Clone)]
pub struct AppState {
    pub debts: Arc<dyn DebtStore>,
    pub periods: Arc<dyn PeriodStore>,
}

/// The full HTTP surface over whichever store backs the state. Tests drive
/// this router in-process against the memory store.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::debts::routes(state.clone()))
        .merge(routes::payments::routes(state.clone()))
        .merge(routes::period::routes(state.clone()))
        .merge(routes::cycle::routes(state.clone()))
        .merge(routes::cycle_stats::routes(state))
        .route("/health", get(|| async { "✅ Backend up" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
