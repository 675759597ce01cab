//! Medication registry: add, soft delete into a bounded recently-deleted
//! list, restore, and the guard on manual logging.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    models::{ExpiryState, Medication, NewMedication},
    settings::Settings,
};

use super::{alerts::alarm_transition, effects::AlertEffect, ReminderBook, MAX_DELETED};

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ReminderBook {
    pub fn add_medication(
        &mut self,
        input: NewMedication,
        ai_insight: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Medication> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            bail!("medication name is required");
        }

        let medication = Medication {
            id: Uuid::new_v4().to_string(),
            name,
            dose: input.dose.trim().to_string(),
            time: input.time,
            frequency: input.frequency,
            duration_days: input.duration_days,
            remaining_doses: input.remaining_doses,
            refill_threshold: input.refill_threshold,
            expiry_date: input.expiry_date,
            notes: non_empty(input.notes),
            ai_insight: non_empty(ai_insight),
            start_date: now,
        };

        self.medications.push(medication.clone());
        Ok(medication)
    }

    /// Move the medication to the front of the deleted list, dropping the
    /// oldest entry past `MAX_DELETED`. Its alert ledger keys, pending snooze
    /// and alert slot go with it.
    pub fn delete_medication(&mut self, id: &str, settings: &Settings) -> Result<Vec<AlertEffect>> {
        let index = self
            .medications
            .iter()
            .position(|med| med.id == id)
            .ok_or_else(|| anyhow!("no active medication with id {id}"))?;

        let was_alerting = self.is_alerting();
        let medication = self.medications.remove(index);

        self.deleted.insert(0, medication);
        self.deleted.truncate(MAX_DELETED);

        let scheduled_prefix = format!("{id}-");
        let snooze_prefix = format!("snooze-{id}-");
        self.last_notified.retain(|key, _| {
            !key.starts_with(&scheduled_prefix) && !key.starts_with(&snooze_prefix)
        });
        self.snoozed.remove(id);
        if self.active_alert.as_deref() == Some(id) {
            self.active_alert = None;
        }

        Ok(alarm_transition(was_alerting, self, settings)
            .into_iter()
            .collect())
    }

    /// Put a deleted medication back in the active list exactly as it was.
    pub fn restore_medication(&mut self, id: &str) -> Result<Medication> {
        let index = self
            .deleted
            .iter()
            .position(|med| med.id == id)
            .ok_or_else(|| anyhow!("no deleted medication with id {id}"))?;

        if self.medication(id).is_some() {
            bail!("medication {id} is already active");
        }

        let medication = self.deleted.remove(index);
        self.medications.push(medication.clone());
        Ok(medication)
    }

    /// Manual logging is refused for expired or out-of-stock medications and
    /// for doses already resolved today.
    pub fn ensure_loggable(&self, id: &str, today: NaiveDate) -> Result<&Medication> {
        let medication = self
            .medication(id)
            .ok_or_else(|| anyhow!("no active medication with id {id}"))?;

        if medication.expiry_state(today) == ExpiryState::Expired {
            bail!("{} has expired; replace it before logging doses", medication.name);
        }
        if medication.is_out_of_stock() {
            bail!("{} is out of stock", medication.name);
        }
        if let Some(status) = self.status_on(id, today) {
            bail!("{} is already logged as {} today", medication.name, status.as_str());
        }
        Ok(medication)
    }
}
