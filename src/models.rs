use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "debt_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DebtCategory {
    CreditCard,
    PersonalLoan,
    AutoLoan,
    StudentLoan,
    Mortgage,
    Medical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "debt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Active,
    PaidOff,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Debt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: DebtCategory,
    // money lives in i64 cents (Postgres BIGINT) so amortization math never
    // accumulates float drift across long schedules
    pub original_balance_cents: i64,
    pub current_balance_cents: i64,
    // annual rate as a fraction, e.g. 0.1999 for 19.99% APR
    pub interest_rate: f64,
    pub minimum_payment_cents: i64,
    // day of month the payment is due, 1-31
    pub due_day: i16,
    pub status: DebtStatus,
    pub paid_off_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub amount_cents: i64,
    pub principal_paid_cents: i64,
    pub interest_paid_cents: i64,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "flow_intensity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlowIntensity {
    Spotting,
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "energy_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "symptom_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SymptomSeverity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeriodLog {
    pub id: Uuid,
    pub user_id: Uuid,
    // one log per calendar day per user
    pub date: NaiveDate,
    pub is_start_day: bool,
    pub is_end_day: bool,
    pub flow_intensity: Option<FlowIntensity>,
    pub symptoms: Vec<String>,
    pub mood: Option<String>,
    pub energy_level: Option<EnergyLevel>,
    pub severity: Option<SymptomSeverity>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A menstrual cycle span. Open until a later end day is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeriodCycle {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

pub const DEFAULT_CYCLE_LENGTH: i32 = 28;
pub const DEFAULT_PERIOD_LENGTH: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CycleSettings {
    pub user_id: Uuid,
    pub cycle_length: i32,
    pub period_length: i32,
    pub last_period_date: Option<NaiveDate>,
}

impl CycleSettings {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            cycle_length: DEFAULT_CYCLE_LENGTH,
            period_length: DEFAULT_PERIOD_LENGTH,
            last_period_date: None,
        }
    }
}
