use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Debt, Payment};
use crate::AppState;

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct NewPaymentBody {
    user_id: Uuid,
    amount_cents: i64,
    /// Defaults to today when omitted.
    payment_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct PaymentResponse {
    payment: Payment,
    debt: Debt,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/debts/:id/payments",
            get(list_payments).post(record_payment),
        )
        .with_state(state)
}

async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<NewPaymentBody>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    if body.amount_cents <= 0 {
        return Err(AppError::InvalidInput(
            "payment amount must be positive".to_string(),
        ));
    }
    let date = body
        .payment_date
        .unwrap_or_else(|| Utc::now().naive_utc().date());
    let (payment, debt) = state
        .debts
        .record_payment(body.user_id, id, body.amount_cents, date)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse { payment, debt })))
}

async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Payment>>> {
    let mut payments = state.debts.list_payments(query.user_id, id).await?;
    // history renders newest first
    payments.reverse();
    Ok(Json(payments))
}
