use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::debt as debt_engine;
use crate::error::Result;
use crate::models::{
    CycleSettings, Debt, DebtCategory, EnergyLevel, FlowIntensity, Payment, PeriodCycle,
    PeriodLog, SymptomSeverity,
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, Deserialize)]
pub struct NewDebt {
    pub name: String,
    pub category: DebtCategory,
    pub original_balance_cents: i64,
    /// Defaults to the original balance when omitted.
    #[serde(default)]
    pub current_balance_cents: Option<i64>,
    pub interest_rate: f64,
    pub minimum_payment_cents: i64,
    pub due_day: i16,
}

/// Partial update; balances are deliberately absent, only payments move them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebtUpdate {
    pub name: Option<String>,
    pub category: Option<DebtCategory>,
    pub interest_rate: Option<f64>,
    pub minimum_payment_cents: Option<i64>,
    pub due_day: Option<i16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPeriodLog {
    pub date: NaiveDate,
    #[serde(default)]
    pub is_start_day: bool,
    #[serde(default)]
    pub is_end_day: bool,
    #[serde(default)]
    pub flow_intensity: Option<FlowIntensity>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default)]
    pub severity: Option<SymptomSeverity>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleSettingsUpdate {
    pub cycle_length: Option<i32>,
    pub period_length: Option<i32>,
    pub last_period_date: Option<NaiveDate>,
}

#[async_trait]
pub trait DebtStore: Send + Sync {
    async fn list_debts(&self, user_id: Uuid) -> Result<Vec<Debt>>;
    async fn get_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<Debt>;
    async fn create_debt(&self, user_id: Uuid, new: NewDebt) -> Result<Debt>;
    async fn update_debt(&self, user_id: Uuid, debt_id: Uuid, update: DebtUpdate) -> Result<Debt>;
    async fn delete_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<()>;
    /// Applies the payment atomically: splits it into interest and principal,
    /// reduces the balance (never below zero) and flips the debt to paid off
    /// when it reaches zero. Rejects payments against paid-off debts and
    /// balances already at zero.
    async fn record_payment(
        &self,
        user_id: Uuid,
        debt_id: Uuid,
        amount_cents: i64,
        payment_date: NaiveDate,
    ) -> Result<(Payment, Debt)>;
    async fn list_payments(&self, user_id: Uuid, debt_id: Uuid) -> Result<Vec<Payment>>;
}

/// Period logs plus the cycle rows derived from them. Mutations keep the
/// cycle table and `last_period_date` in step with the logs in one
/// transaction, so reads never recompute from scratch.
#[async_trait]
pub trait PeriodStore: Send + Sync {
    /// One log per user per day; logging the same date again replaces it.
    async fn upsert_period_log(&self, user_id: Uuid, log: NewPeriodLog) -> Result<PeriodLog>;
    async fn delete_period_log(&self, user_id: Uuid, date: NaiveDate) -> Result<()>;
    async fn list_period_logs(&self, user_id: Uuid) -> Result<Vec<PeriodLog>>;
    async fn list_cycles(&self, user_id: Uuid) -> Result<Vec<PeriodCycle>>;
    /// Falls back to defaults for users who never saved settings.
    async fn get_settings(&self, user_id: Uuid) -> Result<CycleSettings>;
    async fn update_settings(
        &self,
        user_id: Uuid,
        update: CycleSettingsUpdate,
    ) -> Result<CycleSettings>;
}

pub(crate) struct PaymentOutcome {
    pub interest_cents: i64,
    pub principal_cents: i64,
    pub new_balance_cents: i64,
    pub paid_off: bool,
}

/// Shared attribution rule for both store backends: one month of accrued
/// interest first, the rest to principal. The payment row keeps the full
/// split (interest + principal == amount) while the balance itself floors
/// at zero, so overpayment can never drive it negative.
pub(crate) fn apply_payment(debt: &Debt, amount_cents: i64) -> PaymentOutcome {
    let split = debt_engine::split_payment(
        debt.current_balance_cents,
        debt.interest_rate,
        amount_cents,
    );
    let new_balance = (debt.current_balance_cents - split.principal_cents).max(0);
    PaymentOutcome {
        interest_cents: split.interest_cents,
        principal_cents: split.principal_cents,
        new_balance_cents: new_balance,
        paid_off: new_balance == 0,
    }
}
