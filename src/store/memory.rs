use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{
    apply_payment, CycleSettingsUpdate, DebtStore, DebtUpdate, NewDebt, NewPeriodLog, PeriodStore,
};
use crate::engine::cycle as cycle_engine;
use crate::error::{AppError, Result};
use crate::models::{CycleSettings, Debt, DebtStatus, Payment, PeriodCycle, PeriodLog};

/// In-memory backend with the same observable behavior as Postgres, used by
/// the API tests so they stay hermetic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    debts: Vec<Debt>,
    payments: Vec<Payment>,
    period_logs: Vec<PeriodLog>,
    cycles: HashMap<Uuid, Vec<PeriodCycle>>,
    settings: HashMap<Uuid, CycleSettings>,
}

impl State {
    fn rebuild_cycles(&mut self, user_id: Uuid) {
        let logs: Vec<PeriodLog> = self
            .period_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        self.cycles
            .insert(user_id, cycle_engine::period_cycles(&logs));
    }

    fn settings_entry(&mut self, user_id: Uuid) -> &mut CycleSettings {
        self.settings
            .entry(user_id)
            .or_insert_with(|| CycleSettings::defaults_for(user_id))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DebtStore for MemoryStore {
    async fn list_debts(&self, user_id: Uuid) -> Result<Vec<Debt>> {
        let state = self.read();
        let mut debts: Vec<Debt> = state
            .debts
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        debts.sort_by_key(|d| d.created_at);
        Ok(debts)
    }

    async fn get_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<Debt> {
        self.read()
            .debts
            .iter()
            .find(|d| d.id == debt_id && d.user_id == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("debt".to_string()))
    }

    async fn create_debt(&self, user_id: Uuid, new: NewDebt) -> Result<Debt> {
        let now = Utc::now();
        let debt = Debt {
            id: Uuid::new_v4(),
            user_id,
            name: new.name,
            category: new.category,
            original_balance_cents: new.original_balance_cents,
            current_balance_cents: new
                .current_balance_cents
                .unwrap_or(new.original_balance_cents),
            interest_rate: new.interest_rate,
            minimum_payment_cents: new.minimum_payment_cents,
            due_day: new.due_day,
            status: DebtStatus::Active,
            paid_off_date: None,
            created_at: now,
            updated_at: now,
        };
        self.write().debts.push(debt.clone());
        Ok(debt)
    }

    async fn update_debt(&self, user_id: Uuid, debt_id: Uuid, update: DebtUpdate) -> Result<Debt> {
        let mut state = self.write();
        let debt = state
            .debts
            .iter_mut()
            .find(|d| d.id == debt_id && d.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("debt".to_string()))?;
        if let Some(name) = update.name {
            debt.name = name;
        }
        if let Some(category) = update.category {
            debt.category = category;
        }
        if let Some(rate) = update.interest_rate {
            debt.interest_rate = rate;
        }
        if let Some(minimum) = update.minimum_payment_cents {
            debt.minimum_payment_cents = minimum;
        }
        if let Some(due_day) = update.due_day {
            debt.due_day = due_day;
        }
        debt.updated_at = Utc::now();
        Ok(debt.clone())
    }

    async fn delete_debt(&self, user_id: Uuid, debt_id: Uuid) -> Result<()> {
        let mut state = self.write();
        let before = state.debts.len();
        state
            .debts
            .retain(|d| !(d.id == debt_id && d.user_id == user_id));
        if state.debts.len() == before {
            return Err(AppError::NotFound("debt".to_string()));
        }
        state.payments.retain(|p| p.debt_id != debt_id);
        Ok(())
    }

    async fn record_payment(
        &self,
        user_id: Uuid,
        debt_id: Uuid,
        amount_cents: i64,
        payment_date: NaiveDate,
    ) -> Result<(Payment, Debt)> {
        let mut state = self.write();
        let debt = state
            .debts
            .iter_mut()
            .find(|d| d.id == debt_id && d.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("debt".to_string()))?;
        if debt.status == DebtStatus::PaidOff {
            return Err(AppError::Conflict("debt is already paid off".to_string()));
        }
        if debt.current_balance_cents == 0 {
            return Err(AppError::Conflict("debt balance is already zero".to_string()));
        }

        let outcome = apply_payment(debt, amount_cents);
        debt.current_balance_cents = outcome.new_balance_cents;
        debt.updated_at = Utc::now();
        if outcome.paid_off {
            debt.status = DebtStatus::PaidOff;
            debt.paid_off_date = Some(payment_date);
            debt.minimum_payment_cents = 0;
        }
        let debt = debt.clone();

        let payment = Payment {
            id: Uuid::new_v4(),
            debt_id,
            amount_cents,
            principal_paid_cents: outcome.principal_cents,
            interest_paid_cents: outcome.interest_cents,
            payment_date,
            created_at: Utc::now(),
        };
        state.payments.push(payment.clone());
        Ok((payment, debt))
    }

    async fn list_payments(&self, user_id: Uuid, debt_id: Uuid) -> Result<Vec<Payment>> {
        let state = self.read();
        state
            .debts
            .iter()
            .find(|d| d.id == debt_id && d.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("debt".to_string()))?;
        let mut payments: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| p.debt_id == debt_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.payment_date, p.created_at));
        Ok(payments)
    }
}

#[async_trait]
impl PeriodStore for MemoryStore {
    async fn upsert_period_log(&self, user_id: Uuid, new: NewPeriodLog) -> Result<PeriodLog> {
        let mut state = self.write();
        let position = state
            .period_logs
            .iter()
            .position(|l| l.user_id == user_id && l.date == new.date);
        let log = match position {
            Some(i) => {
                let existing = &mut state.period_logs[i];
                existing.is_start_day = new.is_start_day;
                existing.is_end_day = new.is_end_day;
                existing.flow_intensity = new.flow_intensity;
                existing.symptoms = new.symptoms;
                existing.mood = new.mood;
                existing.energy_level = new.energy_level;
                existing.severity = new.severity;
                existing.notes = new.notes;
                existing.clone()
            }
            None => {
                let log = PeriodLog {
                    id: Uuid::new_v4(),
                    user_id,
                    date: new.date,
                    is_start_day: new.is_start_day,
                    is_end_day: new.is_end_day,
                    flow_intensity: new.flow_intensity,
                    symptoms: new.symptoms,
                    mood: new.mood,
                    energy_level: new.energy_level,
                    severity: new.severity,
                    notes: new.notes,
                    created_at: Utc::now(),
                };
                state.period_logs.push(log.clone());
                log
            }
        };

        state.rebuild_cycles(user_id);
        if log.is_start_day {
            state.settings_entry(user_id).last_period_date = Some(log.date);
        }
        Ok(log)
    }

    async fn delete_period_log(&self, user_id: Uuid, date: NaiveDate) -> Result<()> {
        let mut state = self.write();
        let before = state.period_logs.len();
        state
            .period_logs
            .retain(|l| !(l.user_id == user_id && l.date == date));
        if state.period_logs.len() == before {
            return Err(AppError::NotFound("period log".to_string()));
        }
        state.rebuild_cycles(user_id);
        Ok(())
    }

    async fn list_period_logs(&self, user_id: Uuid) -> Result<Vec<PeriodLog>> {
        let mut logs: Vec<PeriodLog> = self
            .read()
            .period_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    async fn list_cycles(&self, user_id: Uuid) -> Result<Vec<PeriodCycle>> {
        Ok(self
            .read()
            .cycles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_settings(&self, user_id: Uuid) -> Result<CycleSettings> {
        Ok(self
            .read()
            .settings
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| CycleSettings::defaults_for(user_id)))
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        update: CycleSettingsUpdate,
    ) -> Result<CycleSettings> {
        let mut state = self.write();
        let settings = state.settings_entry(user_id);
        if let Some(cycle_length) = update.cycle_length {
            settings.cycle_length = cycle_length;
        }
        if let Some(period_length) = update.period_length {
            settings.period_length = period_length;
        }
        if let Some(last) = update.last_period_date {
            settings.last_period_date = Some(last);
        }
        Ok(settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DebtCategory;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_debt(balance_cents: i64, rate: f64, minimum_cents: i64) -> NewDebt {
        NewDebt {
            name: "Visa".to_string(),
            category: DebtCategory::CreditCard,
            original_balance_cents: balance_cents,
            current_balance_cents: None,
            interest_rate: rate,
            minimum_payment_cents: minimum_cents,
            due_day: 15,
        }
    }

    fn log_on(date: &str, is_start_day: bool, is_end_day: bool) -> NewPeriodLog {
        NewPeriodLog {
            date: d(date),
            is_start_day,
            is_end_day,
            flow_intensity: None,
            symptoms: Vec::new(),
            mood: None,
            energy_level: None,
            severity: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn payment_splits_into_interest_and_principal() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let debt = store
            .create_debt(user, new_debt(100_000, 0.12, 10_000))
            .await
            .unwrap();

        let (payment, updated) = store
            .record_payment(user, debt.id, 10_000, d("2025-01-15"))
            .await
            .unwrap();
        assert_eq!(payment.interest_paid_cents, 1_000);
        assert_eq!(payment.principal_paid_cents, 9_000);
        assert_eq!(updated.current_balance_cents, 91_000);
        assert_eq!(updated.status, DebtStatus::Active);
        assert_eq!(updated.paid_off_date, None);
    }

    #[tokio::test]
    async fn overpayment_floors_the_balance_and_pays_off() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let debt = store
            .create_debt(user, new_debt(50_000, 0.12, 5_000))
            .await
            .unwrap();

        let (payment, updated) = store
            .record_payment(user, debt.id, 100_000, d("2025-02-01"))
            .await
            .unwrap();
        // the row keeps the full split even when the balance clamps
        assert_eq!(payment.interest_paid_cents, 500);
        assert_eq!(payment.principal_paid_cents, 99_500);
        assert_eq!(updated.current_balance_cents, 0);
        assert_eq!(updated.status, DebtStatus::PaidOff);
        assert_eq!(updated.paid_off_date, Some(d("2025-02-01")));
        assert_eq!(updated.minimum_payment_cents, 0);

        let err = store
            .record_payment(user, debt.id, 1_000, d("2025-02-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn zero_balance_debt_rejects_payments() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        // created already cleared, so there is nothing left to pay against
        let mut new = new_debt(10_000, 0.12, 1_000);
        new.current_balance_cents = Some(0);
        let debt = store.create_debt(user, new).await.unwrap();
        assert_eq!(debt.status, DebtStatus::Active);

        let err = store
            .record_payment(user, debt.id, 5_000, d("2025-01-15"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.list_payments(user, debt.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn debts_are_scoped_to_their_user() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let debt = store
            .create_debt(owner, new_debt(10_000, 0.1, 1_000))
            .await
            .unwrap();

        let err = store.get_debt(Uuid::new_v4(), debt.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.list_debts(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_cannot_touch_balances() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let debt = store
            .create_debt(user, new_debt(80_000, 0.15, 4_000))
            .await
            .unwrap();

        let updated = store
            .update_debt(
                user,
                debt.id,
                DebtUpdate {
                    name: Some("Renamed".to_string()),
                    interest_rate: Some(0.09),
                    ..DebtUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.interest_rate, 0.09);
        assert_eq!(updated.current_balance_cents, 80_000);
        assert_eq!(updated.original_balance_cents, 80_000);
    }

    #[tokio::test]
    async fn deleting_a_debt_removes_its_payments() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let debt = store
            .create_debt(user, new_debt(30_000, 0.1, 3_000))
            .await
            .unwrap();
        store
            .record_payment(user, debt.id, 3_000, d("2025-01-10"))
            .await
            .unwrap();

        store.delete_debt(user, debt.id).await.unwrap();
        let err = store.list_payments(user, debt.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn log_mutations_keep_cycles_and_settings_in_step() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store
            .upsert_period_log(user, log_on("2025-01-01", true, false))
            .await
            .unwrap();
        let cycles = store.list_cycles(user).await.unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].end_date, None);
        assert_eq!(
            store.get_settings(user).await.unwrap().last_period_date,
            Some(d("2025-01-01"))
        );

        store
            .upsert_period_log(user, log_on("2025-01-05", false, true))
            .await
            .unwrap();
        let cycles = store.list_cycles(user).await.unwrap();
        assert_eq!(cycles[0].end_date, Some(d("2025-01-05")));
        // end days never move the last period date
        assert_eq!(
            store.get_settings(user).await.unwrap().last_period_date,
            Some(d("2025-01-01"))
        );

        store.delete_period_log(user, d("2025-01-05")).await.unwrap();
        let cycles = store.list_cycles(user).await.unwrap();
        assert_eq!(cycles[0].end_date, None);
        assert_eq!(
            store.get_settings(user).await.unwrap().last_period_date,
            Some(d("2025-01-01"))
        );
    }

    #[tokio::test]
    async fn same_day_log_is_replaced_not_duplicated() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store
            .upsert_period_log(user, log_on("2025-01-01", true, false))
            .await
            .unwrap();
        store
            .upsert_period_log(user, log_on("2025-01-01", false, false))
            .await
            .unwrap();

        let logs = store.list_period_logs(user).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].is_start_day);
        assert!(store.list_cycles(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_log_delete_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .delete_period_log(Uuid::new_v4(), d("2025-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
