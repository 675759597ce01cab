use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DoseLog, DoseStatus, DoseTime, Medication};

/// Most recently deleted medications kept for restore.
pub const MAX_DELETED: usize = 10;

/// Everything the scheduler and the alert transitions read and write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderBook {
    pub medications: Vec<Medication>,
    /// Most recent first, at most `MAX_DELETED`.
    pub deleted: Vec<Medication>,
    /// Newest first.
    pub logs: Vec<DoseLog>,
    /// Alert dedupe ledger: notification key -> day it fired.
    pub last_notified: BTreeMap<String, NaiveDate>,
    /// Medication id -> epoch milliseconds at which the snoozed alert fires again.
    pub snoozed: BTreeMap<String, i64>,
    /// Medication currently demanding attention. A newer alert replaces it.
    pub active_alert: Option<String>,
}

/// Dedupe key for a scheduled alert: one per medication, day and minute.
pub fn notification_key(medication_id: &str, date: NaiveDate, time: DoseTime) -> String {
    format!("{}-{}-{}", medication_id, date.format("%Y-%m-%d"), time)
}

/// Ledger key written when a snoozed alert fires again. Never looked up.
pub fn snooze_key(medication_id: &str, at_ms: i64) -> String {
    format!("snooze-{medication_id}-{at_ms}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub taken: usize,
    pub total: usize,
}

impl DailyProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.taken * 100) / self.total) as u32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub log: DoseLog,
    /// `None` once the medication has fallen off the deleted list too.
    pub medication_name: Option<String>,
}

impl ReminderBook {
    pub fn medication(&self, id: &str) -> Option<&Medication> {
        self.medications.iter().find(|med| med.id == id)
    }

    pub(crate) fn medication_mut(&mut self, id: &str) -> Option<&mut Medication> {
        self.medications.iter_mut().find(|med| med.id == id)
    }

    /// Active or recently deleted medication.
    pub fn any_medication(&self, id: &str) -> Option<&Medication> {
        self.medication(id)
            .or_else(|| self.deleted.iter().find(|med| med.id == id))
    }

    pub fn is_alerting(&self) -> bool {
        self.active_alert.is_some()
    }

    pub fn active_medication(&self) -> Option<&Medication> {
        self.active_alert
            .as_deref()
            .and_then(|id| self.medication(id))
    }

    pub fn has_log_on(&self, medication_id: &str, date: NaiveDate) -> bool {
        self.status_on(medication_id, date).is_some()
    }

    /// Latest resolution recorded for the medication on `date`.
    pub fn status_on(&self, medication_id: &str, date: NaiveDate) -> Option<DoseStatus> {
        self.logs
            .iter()
            .find(|log| log.medication_id == medication_id && log.local_date() == date)
            .map(|log| log.status)
    }

    /// Ledger entries from earlier days can no longer suppress anything.
    pub fn prune_notifications_before(&mut self, today: NaiveDate) {
        self.last_notified.retain(|_, fired_on| *fired_on >= today);
    }

    pub fn refill_list(&self) -> Vec<&Medication> {
        self.medications
            .iter()
            .filter(|med| med.needs_refill())
            .collect()
    }

    pub fn daily_progress(&self, today: NaiveDate) -> DailyProgress {
        let taken = self
            .medications
            .iter()
            .filter(|med| self.status_on(&med.id, today) == Some(DoseStatus::Taken))
            .count();
        DailyProgress {
            taken,
            total: self.medications.len(),
        }
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.logs
            .iter()
            .take(limit)
            .map(|log| HistoryEntry {
                log: log.clone(),
                medication_name: self
                    .any_medication(&log.medication_id)
                    .map(|med| med.name.clone()),
            })
            .collect()
    }
}
