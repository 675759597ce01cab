mod alerts;
mod book;
pub mod controller;
pub mod effects;
mod registry;
pub mod scheduler;

pub use book::{
    notification_key, snooze_key, DailyProgress, HistoryEntry, ReminderBook, MAX_DELETED,
};
pub use controller::ReminderController;
pub use effects::{
    AlertEffect, AlertNotification, EffectSink, NotificationPermission, TerminalEffects,
};
pub use scheduler::{evaluate, TickOutcome};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

    use crate::models::{Frequency, Medication};

    use super::ReminderBook;

    /// Wall-clock reading in a fixed +02:00 zone.
    pub fn at(wall: &str) -> DateTime<FixedOffset> {
        let naive = NaiveDateTime::parse_from_str(wall, "%Y-%m-%dT%H:%M:%S").unwrap();
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .from_local_datetime(&naive)
            .unwrap()
    }

    pub fn medication(id: &str, time: &str, remaining: u32) -> Medication {
        Medication {
            id: id.to_string(),
            name: format!("Medication {id}"),
            dose: "1 tablet".into(),
            time: time.parse().unwrap(),
            frequency: Frequency::Daily,
            duration_days: 30,
            remaining_doses: remaining,
            refill_threshold: 5,
            expiry_date: None,
            notes: None,
            ai_insight: None,
            start_date: Utc::now(),
        }
    }

    pub fn book_with(medications: Vec<Medication>) -> ReminderBook {
        ReminderBook {
            medications,
            ..ReminderBook::default()
        }
    }
}
