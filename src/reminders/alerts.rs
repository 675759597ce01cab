//! Alert slot transitions: raising an alert, and the three ways a user
//! resolves one (taken, snoozed, skipped).

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::{
    models::{DoseLog, DoseStatus},
    settings::Settings,
};

use super::{
    effects::{AlertEffect, AlertNotification, VIBRATION_PATTERN},
    ReminderBook,
};

/// Start the alarm when the slot fills, stop it when it empties.
pub(crate) fn alarm_transition(
    was_alerting: bool,
    book: &ReminderBook,
    settings: &Settings,
) -> Option<AlertEffect> {
    match (was_alerting, book.is_alerting()) {
        (false, true) if settings.sound_enabled => {
            Some(AlertEffect::StartAlarm(settings.alarm_style))
        }
        (true, false) => Some(AlertEffect::StopAlarm),
        _ => None,
    }
}

/// Bring a sounding alarm in line with changed settings: a new style restarts
/// the tone, toggling sound starts or silences it. Nothing happens while the
/// slot is empty.
pub(crate) fn settings_transition(
    alerting: bool,
    old: &Settings,
    new: &Settings,
) -> Vec<AlertEffect> {
    if !alerting {
        return Vec::new();
    }
    match (old.sound_enabled, new.sound_enabled) {
        (true, true) if old.alarm_style != new.alarm_style => vec![
            AlertEffect::StopAlarm,
            AlertEffect::StartAlarm(new.alarm_style),
        ],
        (true, false) => vec![AlertEffect::StopAlarm],
        (false, true) => vec![AlertEffect::StartAlarm(new.alarm_style)],
        _ => Vec::new(),
    }
}

impl ReminderBook {
    /// Raise an alert for the medication: record the ledger key, take over the
    /// alert slot, and request the notification and vibration the settings
    /// allow. Alarm start is left to the caller's slot transition.
    pub(crate) fn trigger_alert(
        &mut self,
        medication_id: &str,
        key: String,
        today: NaiveDate,
        settings: &Settings,
    ) -> Vec<AlertEffect> {
        self.last_notified.insert(key, today);
        self.active_alert = Some(medication_id.to_string());

        let mut effects = Vec::new();
        if settings.notifications_enabled {
            if let Some(med) = self.medication(medication_id) {
                effects.push(AlertEffect::Notify(AlertNotification::for_medication(med)));
            }
        }
        if settings.vibrate_enabled {
            effects.push(AlertEffect::Vibrate(VIBRATION_PATTERN));
        }
        effects
    }

    /// Append a log entry and clear whatever was pending for the medication.
    pub(crate) fn record_dose(
        &mut self,
        medication_id: &str,
        status: DoseStatus,
        at: DateTime<FixedOffset>,
    ) {
        self.logs.insert(0, DoseLog::new(medication_id, status, at));

        if status == DoseStatus::Taken {
            if let Some(med) = self.medication_mut(medication_id) {
                med.consume_dose();
            }
        }

        if self.active_alert.as_deref() == Some(medication_id) {
            self.active_alert = None;
        }
        self.snoozed.remove(medication_id);
    }

    pub fn log_dose(
        &mut self,
        medication_id: &str,
        status: DoseStatus,
        at: DateTime<FixedOffset>,
        settings: &Settings,
    ) -> Vec<AlertEffect> {
        let was_alerting = self.is_alerting();
        self.record_dose(medication_id, status, at);
        alarm_transition(was_alerting, self, settings)
            .into_iter()
            .collect()
    }

    pub fn mark_taken(
        &mut self,
        medication_id: &str,
        at: DateTime<FixedOffset>,
        settings: &Settings,
    ) -> Vec<AlertEffect> {
        self.log_dose(medication_id, DoseStatus::Taken, at, settings)
    }

    fn active_alert_id(&self) -> Result<String> {
        self.active_alert
            .clone()
            .ok_or_else(|| anyhow!("no alert is active"))
    }

    pub fn take_active(
        &mut self,
        at: DateTime<FixedOffset>,
        settings: &Settings,
    ) -> Result<Vec<AlertEffect>> {
        let medication_id = self.active_alert_id()?;
        Ok(self.mark_taken(&medication_id, at, settings))
    }

    /// Put the active alert off for the configured snooze duration. No log
    /// entry is written, so the missed-dose rule still applies.
    pub fn snooze_active(
        &mut self,
        at: DateTime<FixedOffset>,
        settings: &Settings,
    ) -> Result<Vec<AlertEffect>> {
        let medication_id = self.active_alert_id()?;
        let target = at.timestamp_millis() + i64::from(settings.snooze_duration) * 60_000;

        self.snoozed.insert(medication_id, target);
        self.active_alert = None;

        Ok(alarm_transition(true, self, settings).into_iter().collect())
    }

    /// Dismiss the active alert; the dose is recorded as missed.
    pub fn skip_active(
        &mut self,
        at: DateTime<FixedOffset>,
        settings: &Settings,
    ) -> Result<Vec<AlertEffect>> {
        let medication_id = self.active_alert_id()?;
        Ok(self.log_dose(&medication_id, DoseStatus::Missed, at, settings))
    }
}
