use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    apply_payment, CycleSettingsUpdate, DebtStore, DebtUpdate, NewDebt, NewPeriodLog, PeriodStore,
};
use crate::engine::cycle as cycle_engine;
use crate::error::{AppError, Result};
use crate::models::{CycleSettings, Debt, DebtStatus, Payment, PeriodCycle, PeriodLog};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-derives the cycle rows for one user from their logs. Runs inside
    /// the caller's transaction so logs and cycles never drift apart.
    async fn rebuild_cycles(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<()> {
        let logs = sqlx::query_as::<_, PeriodLog>(
            "SELECT * FROM period_logs WHERE user_id = $1 ORDER BY date",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;
        let cycles = cycle_engine::period_cycles(&logs);

        sqlx::query("DELETE FROM period_cycles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        for cycle in &cycles {
            sqlx::query(
                "INSERT INTO period_cycles (id, user_id, start_date, end_date) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(cycle.start_date)
            .bind(cycle.end_date)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DebtStore for PgStore {
    async fn list_debts(&self, user_id: Uuid) -> Result<Vec<Debt>> {
        let debts =
            sqlx::query_as::<_, Debt>("SELECT * FROM debts WHERE user_id = $1 ORDER BY created_at")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(debts)
    }

    async fn get_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<Debt> {
        sqlx::query_as::<_, Debt>("SELECT * FROM debts WHERE id = $1 AND user_id = $2")
            .bind(debt_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("debt".to_string()))
    }

    async fn create_debt(&self, user_id: Uuid, new: NewDebt) -> Result<Debt> {
        let debt = sqlx::query_as::<_, Debt>(
            "INSERT INTO debts (id, user_id, name, category, original_balance_cents, \
             current_balance_cents, interest_rate, minimum_payment_cents, due_day) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&new.name)
        .bind(new.category)
        .bind(new.original_balance_cents)
        .bind(
            new.current_balance_cents
                .unwrap_or(new.original_balance_cents),
        )
        .bind(new.interest_rate)
        .bind(new.minimum_payment_cents)
        .bind(new.due_day)
        .fetch_one(&self.pool)
        .await?;
        Ok(debt)
    }

    async fn update_debt(&self, user_id: Uuid, debt_id: Uuid, update: DebtUpdate) -> Result<Debt> {
        sqlx::query_as::<_, Debt>(
            "UPDATE debts SET \
                 name = COALESCE($3, name), \
                 category = COALESCE($4, category), \
                 interest_rate = COALESCE($5, interest_rate), \
                 minimum_payment_cents = COALESCE($6, minimum_payment_cents), \
                 due_day = COALESCE($7, due_day), \
                 updated_at = now() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING *",
        )
        .bind(debt_id)
        .bind(user_id)
        .bind(update.name)
        .bind(update.category)
        .bind(update.interest_rate)
        .bind(update.minimum_payment_cents)
        .bind(update.due_day)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("debt".to_string()))
    }

    async fn delete_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM debts WHERE id = $1 AND user_id = $2")
            .bind(debt_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("debt".to_string()));
        }
        Ok(())
    }

    async fn record_payment(
        &self,
        user_id: Uuid,
        debt_id: Uuid,
        amount_cents: i64,
        payment_date: NaiveDate,
    ) -> Result<(Payment, Debt)> {
        let mut tx = self.pool.begin().await?;

        let debt = sqlx::query_as::<_, Debt>(
            "SELECT * FROM debts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(debt_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("debt".to_string()))?;
        if debt.status == DebtStatus::PaidOff {
            return Err(AppError::Conflict("debt is already paid off".to_string()));
        }
        if debt.current_balance_cents == 0 {
            return Err(AppError::Conflict("debt balance is already zero".to_string()));
        }

        let outcome = apply_payment(&debt, amount_cents);

        let payment = sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, debt_id, amount_cents, principal_paid_cents, \
             interest_paid_cents, payment_date) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(debt_id)
        .bind(amount_cents)
        .bind(outcome.principal_cents)
        .bind(outcome.interest_cents)
        .bind(payment_date)
        .fetch_one(&mut *tx)
        .await?;

        let updated = if outcome.paid_off {
            sqlx::query_as::<_, Debt>(
                "UPDATE debts SET current_balance_cents = $2, status = 'paid_off', \
                 paid_off_date = $3, minimum_payment_cents = 0, updated_at = now() \
                 WHERE id = $1 RETURNING *",
            )
            .bind(debt_id)
            .bind(outcome.new_balance_cents)
            .bind(payment_date)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, Debt>(
                "UPDATE debts SET current_balance_cents = $2, updated_at = now() \
                 WHERE id = $1 RETURNING *",
            )
            .bind(debt_id)
            .bind(outcome.new_balance_cents)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok((payment, updated))
    }

    async fn list_payments(&self, user_id: Uuid, debt_id: Uuid) -> Result<Vec<Payment>> {
        let owned =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM debts WHERE id = $1 AND user_id = $2")
                .bind(debt_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        if owned.is_none() {
            return Err(AppError::NotFound("debt".to_string()));
        }

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE debt_id = $1 ORDER BY payment_date, created_at",
        )
        .bind(debt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}

#[async_trait]
impl PeriodStore for PgStore {
    async fn upsert_period_log(&self, user_id: Uuid, new: NewPeriodLog) -> Result<PeriodLog> {
        let mut tx = self.pool.begin().await?;

        let log = sqlx::query_as::<_, PeriodLog>(
            "INSERT INTO period_logs (id, user_id, date, is_start_day, is_end_day, \
             flow_intensity, symptoms, mood, energy_level, severity, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                 is_start_day = EXCLUDED.is_start_day, \
                 is_end_day = EXCLUDED.is_end_day, \
                 flow_intensity = EXCLUDED.flow_intensity, \
                 symptoms = EXCLUDED.symptoms, \
                 mood = EXCLUDED.mood, \
                 energy_level = EXCLUDED.energy_level, \
                 severity = EXCLUDED.severity, \
                 notes = EXCLUDED.notes \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(new.date)
        .bind(new.is_start_day)
        .bind(new.is_end_day)
        .bind(new.flow_intensity)
        .bind(&new.symptoms)
        .bind(&new.mood)
        .bind(new.energy_level)
        .bind(new.severity)
        .bind(&new.notes)
        .fetch_one(&mut *tx)
        .await?;

        self.rebuild_cycles(&mut tx, user_id).await?;

        if log.is_start_day {
            sqlx::query(
                "INSERT INTO cycle_settings (user_id, last_period_date) VALUES ($1, $2) \
                 ON CONFLICT (user_id) DO UPDATE SET last_period_date = EXCLUDED.last_period_date",
            )
            .bind(user_id)
            .bind(log.date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(log)
    }

    async fn delete_period_log(&self, user_id: Uuid, date: NaiveDate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM period_logs WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("period log".to_string()));
        }

        self.rebuild_cycles(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_period_logs(&self, user_id: Uuid) -> Result<Vec<PeriodLog>> {
        let logs = sqlx::query_as::<_, PeriodLog>(
            "SELECT * FROM period_logs WHERE user_id = $1 ORDER BY date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn list_cycles(&self, user_id: Uuid) -> Result<Vec<PeriodCycle>> {
        let cycles = sqlx::query_as::<_, PeriodCycle>(
            "SELECT start_date, end_date FROM period_cycles \
             WHERE user_id = $1 ORDER BY start_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(cycles)
    }

    async fn get_settings(&self, user_id: Uuid) -> Result<CycleSettings> {
        let settings =
            sqlx::query_as::<_, CycleSettings>("SELECT * FROM cycle_settings WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(settings.unwrap_or_else(|| CycleSettings::defaults_for(user_id)))
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        update: CycleSettingsUpdate,
    ) -> Result<CycleSettings> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO cycle_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let settings = sqlx::query_as::<_, CycleSettings>(
            "UPDATE cycle_settings SET \
                 cycle_length = COALESCE($2, cycle_length), \
                 period_length = COALESCE($3, period_length), \
                 last_period_date = COALESCE($4, last_period_date) \
             WHERE user_id = $1 \
             RETURNING *",
        )
        .bind(user_id)
        .bind(update.cycle_length)
        .bind(update.period_length)
        .bind(update.last_period_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(settings)
    }
}
