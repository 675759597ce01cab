//! Once-a-tick reconciliation of the wall clock against every medication.
//!
//! For each active medication, in registry order, three rules run and apply
//! their writes immediately so later rules see them:
//!
//! 1. New alert: the current minute equals the scheduled time, that minute's
//!    ledger key is absent, and nothing is logged for the medication today.
//! 2. Snooze re-fire: a pending snooze target has been reached.
//! 3. Auto-miss: the scheduled time plus the missed window has passed and
//!    nothing is logged today. The entry it writes satisfies its own guard,
//!    so it writes once per day.
//!
//! `evaluate` only mutates the book and returns effect requests; the caller
//! persists and performs them.

use chrono::{DateTime, Duration, FixedOffset};

use crate::{
    models::{DoseStatus, DoseTime},
    settings::Settings,
};

use super::{
    alerts::alarm_transition, effects::AlertEffect, notification_key, snooze_key, ReminderBook,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub effects: Vec<AlertEffect>,
    /// Whether the book needs to be written back.
    pub changed: bool,
}

pub fn evaluate(
    book: &mut ReminderBook,
    settings: &Settings,
    now: DateTime<FixedOffset>,
) -> TickOutcome {
    let wall = now.naive_local();
    let today = wall.date();
    let current_minute = DoseTime::from_wall_clock(wall.time());
    let now_ms = now.timestamp_millis();
    let missed_window = Duration::minutes(i64::from(settings.missed_window));

    let was_alerting = book.is_alerting();
    let mut outcome = TickOutcome::default();

    let schedule: Vec<(String, DoseTime)> = book
        .medications
        .iter()
        .map(|med| (med.id.clone(), med.time))
        .collect();

    for (id, time) in schedule {
        if time == current_minute {
            let key = notification_key(&id, today, current_minute);
            if !book.last_notified.contains_key(&key) && !book.has_log_on(&id, today) {
                log_info!("dose due for {} at {}", id, current_minute);
                let effects = book.trigger_alert(&id, key, today, settings);
                outcome.effects.extend(effects);
                outcome.changed = true;
            }
        }

        if let Some(&target) = book.snoozed.get(&id) {
            if target <= now_ms {
                log_info!("snooze elapsed for {}", id);
                let effects = book.trigger_alert(&id, snooze_key(&id, now_ms), today, settings);
                outcome.effects.extend(effects);
                book.snoozed.remove(&id);
                outcome.changed = true;
            }
        }

        let deadline = today.and_time(time.as_naive_time()) + missed_window;
        if wall > deadline && !book.has_log_on(&id, today) {
            log_info!("no resolution for {} by {}; logging missed", id, deadline);
            book.record_dose(&id, DoseStatus::Missed, now);
            outcome.changed = true;
        }
    }

    if let Some(effect) = alarm_transition(was_alerting, book, settings) {
        outcome.effects.push(effect);
    }

    log_debug!(
        "tick {} evaluated {} medications, {} effects",
        wall,
        book.medications.len(),
        outcome.effects.len()
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::{
        effects::VIBRATION_PATTERN,
        testing::{at, book_with, medication},
    };
    use crate::settings::AlarmStyle;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings {
            missed_window: 60,
            snooze_duration: 5,
            ..Settings::default()
        }
    }

    fn notifications(outcome: &TickOutcome) -> usize {
        outcome
            .effects
            .iter()
            .filter(|effect| matches!(effect, AlertEffect::Notify(_)))
            .count()
    }

    #[test]
    fn fires_once_per_scheduled_minute() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        let mut fired = 0;
        for second in 0..60 {
            let now = at(&format!("2025-03-01T08:00:{second:02}"));
            let outcome = evaluate(&mut book, &settings, now);
            fired += notifications(&outcome);
            if second == 0 {
                assert!(outcome.changed);
                assert!(outcome
                    .effects
                    .contains(&AlertEffect::StartAlarm(AlarmStyle::Urgent)));
            } else {
                assert_eq!(outcome, TickOutcome::default());
            }
        }

        assert_eq!(fired, 1);
        assert_eq!(book.active_alert.as_deref(), Some("m1"));
        assert_eq!(book.last_notified.len(), 1);
    }

    #[test]
    fn fire_requests_notification_and_vibration() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));

        assert_eq!(outcome.effects.len(), 3);
        assert!(matches!(&outcome.effects[0], AlertEffect::Notify(n) if n.medication_id == "m1"));
        assert_eq!(outcome.effects[1], AlertEffect::Vibrate(VIBRATION_PATTERN));
        assert_eq!(outcome.effects[2], AlertEffect::StartAlarm(AlarmStyle::Urgent));
    }

    #[test]
    fn disabled_channels_are_not_requested() {
        let settings = Settings {
            sound_enabled: false,
            notifications_enabled: false,
            vibrate_enabled: false,
            ..settings()
        };
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));

        assert!(outcome.changed);
        assert!(outcome.effects.is_empty());
        assert_eq!(book.active_alert.as_deref(), Some("m1"));
    }

    #[test]
    fn no_alert_when_already_logged_today() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);
        book.mark_taken("m1", at("2025-03-01T07:45:00"), &settings);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));

        assert_eq!(outcome, TickOutcome::default());
        assert_eq!(book.active_alert, None);
    }

    #[test]
    fn yesterdays_log_does_not_suppress_today() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);
        book.mark_taken("m1", at("2025-02-28T08:00:00"), &settings);

        evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));

        assert_eq!(book.active_alert.as_deref(), Some("m1"));
    }

    #[test]
    fn rescheduled_time_can_fire_again_same_day() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));
        book.snooze_active(at("2025-03-01T08:00:05"), &settings).unwrap();
        book.snoozed.clear();
        book.medications[0].time = "08:30".parse().unwrap();

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:30:00"));

        assert_eq!(notifications(&outcome), 1);
        assert_eq!(book.last_notified.len(), 2);
    }

    #[test]
    fn missed_is_logged_once_and_clears_alert() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));
        assert_eq!(book.active_alert.as_deref(), Some("m1"));

        let on_deadline = evaluate(&mut book, &settings, at("2025-03-01T09:00:00"));
        assert!(!on_deadline.changed);
        assert!(book.logs.is_empty());

        let past = evaluate(&mut book, &settings, at("2025-03-01T09:01:00"));
        assert!(past.changed);
        assert_eq!(past.effects, vec![AlertEffect::StopAlarm]);
        assert_eq!(book.active_alert, None);
        assert_eq!(book.logs.len(), 1);
        assert_eq!(book.logs[0].status, DoseStatus::Missed);
        assert_eq!(book.medications[0].remaining_doses, 10);

        for minute in 2..59 {
            let now = at(&format!("2025-03-01T09:{minute:02}:30"));
            let later = evaluate(&mut book, &settings, now);
            assert_eq!(later, TickOutcome::default());
        }
        let evening = evaluate(&mut book, &settings, at("2025-03-01T20:00:00"));
        assert_eq!(evening, TickOutcome::default());
        assert_eq!(book.logs.len(), 1);
    }

    #[test]
    fn scheduled_alert_does_not_fire_again_after_auto_miss() {
        let settings = Settings {
            missed_window: 1,
            ..settings()
        };
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        evaluate(&mut book, &settings, at("2025-03-01T08:02:00"));
        assert_eq!(book.logs.len(), 1);

        book.medications[0].time = "08:05".parse().unwrap();
        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:05:00"));
        assert_eq!(outcome, TickOutcome::default());
    }

    #[test]
    fn snooze_refires_at_target() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));
        book.snooze_active(at("2025-03-01T08:00:00"), &settings).unwrap();
        assert_eq!(book.active_alert, None);

        let early = evaluate(&mut book, &settings, at("2025-03-01T08:04:59"));
        assert_eq!(early, TickOutcome::default());
        assert_eq!(book.active_alert, None);

        let due = evaluate(&mut book, &settings, at("2025-03-01T08:05:00"));
        assert_eq!(notifications(&due), 1);
        assert!(due.effects.contains(&AlertEffect::StartAlarm(AlarmStyle::Urgent)));
        assert_eq!(book.active_alert.as_deref(), Some("m1"));
        assert!(book.snoozed.is_empty());
        assert!(book.logs.is_empty());

        let after = evaluate(&mut book, &settings, at("2025-03-01T08:05:01"));
        assert_eq!(after, TickOutcome::default());
    }

    #[test]
    fn snooze_past_deadline_ends_missed() {
        let settings = Settings {
            missed_window: 3,
            ..settings()
        };
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));
        book.snooze_active(at("2025-03-01T08:00:10"), &settings).unwrap();

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:03:30"));
        assert!(outcome.changed);
        assert_eq!(book.logs[0].status, DoseStatus::Missed);
        assert!(book.snoozed.is_empty());
        assert_eq!(book.active_alert, None);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:06:00"));
        assert_eq!(outcome, TickOutcome::default());
    }

    #[test]
    fn two_due_medications_last_one_wins() {
        let settings = settings();
        let mut book = book_with(vec![
            medication("m1", "08:00", 10),
            medication("m2", "08:00", 10),
        ]);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));

        assert_eq!(notifications(&outcome), 2);
        assert_eq!(book.active_alert.as_deref(), Some("m2"));
        let starts = outcome
            .effects
            .iter()
            .filter(|effect| matches!(effect, AlertEffect::StartAlarm(_)))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn startup_after_deadline_logs_missed_immediately() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T13:00:00"));

        assert!(outcome.changed);
        assert!(outcome.effects.is_empty());
        assert_eq!(
            book.status_on("m1", at("2025-03-01T13:00:00").date_naive()),
            Some(DoseStatus::Missed)
        );
    }

    #[test]
    fn deleted_medications_are_ignored() {
        let settings = settings();
        let mut book = book_with(vec![medication("m1", "08:00", 10)]);
        book.delete_medication("m1", &settings).unwrap();

        let outcome = evaluate(&mut book, &settings, at("2025-03-01T08:00:00"));
        assert_eq!(outcome, TickOutcome::default());
        let outcome = evaluate(&mut book, &settings, at("2025-03-01T12:00:00"));
        assert_eq!(outcome, TickOutcome::default());
        assert!(book.logs.is_empty());
    }
}
