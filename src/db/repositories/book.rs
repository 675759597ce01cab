use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::{
    db::{
        helpers::{decode_list, decode_or_default},
        keys, Database,
    },
    reminders::{ReminderBook, MAX_DELETED},
};

const BOOK_KEYS: [&str; 5] = [
    keys::MEDICATIONS,
    keys::DELETED_MEDICATIONS,
    keys::DOSE_LOGS,
    keys::LAST_NOTIFIED,
    keys::SNOOZED,
];

impl Database {
    /// Read the persisted reminder state. Malformed documents come back
    /// empty; the alert slot always starts clear.
    pub async fn load_book(&self, today: NaiveDate) -> Result<ReminderBook> {
        let values = self
            .get_values(BOOK_KEYS.to_vec())
            .await
            .context("Failed to read reminder state")?;
        let [medications, deleted, logs, last_notified, snoozed]: [Option<String>; 5] = values
            .try_into()
            .map_err(|_| anyhow!("unexpected number of reminder documents"))?;

        let mut book = ReminderBook {
            medications: decode_list(keys::MEDICATIONS, medications),
            deleted: decode_list(keys::DELETED_MEDICATIONS, deleted),
            logs: decode_list(keys::DOSE_LOGS, logs),
            last_notified: decode_or_default(keys::LAST_NOTIFIED, last_notified),
            snoozed: decode_or_default(keys::SNOOZED, snoozed),
            active_alert: None,
        };
        book.deleted.truncate(MAX_DELETED);
        book.prune_notifications_before(today);

        Ok(book)
    }

    pub async fn save_book(&self, book: &ReminderBook) -> Result<()> {
        let entries = vec![
            (keys::MEDICATIONS, serde_json::to_string(&book.medications)?),
            (keys::DELETED_MEDICATIONS, serde_json::to_string(&book.deleted)?),
            (keys::DOSE_LOGS, serde_json::to_string(&book.logs)?),
            (keys::LAST_NOTIFIED, serde_json::to_string(&book.last_notified)?),
            (keys::SNOOZED, serde_json::to_string(&book.snoozed)?),
        ];

        self.put_values(entries)
            .await
            .context("Failed to write reminder state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::DoseStatus,
        reminders::testing::{at, book_with, medication},
    };
    use pretty_assertions::assert_eq;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("book.sqlite3")).unwrap();
        (dir, db)
    }

    fn day(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn empty_store_loads_empty_book() {
        let (_dir, db) = open();
        let book = db.load_book(day("2025-03-01")).await.unwrap();
        assert_eq!(book, ReminderBook::default());
    }

    #[tokio::test]
    async fn saved_book_reloads_without_alert() {
        let (_dir, db) = open();
        let mut book = book_with(vec![medication("m1", "08:00", 10), medication("m2", "21:30", 3)]);
        book.deleted.push(medication("old", "12:00", 1));
        book.record_dose("m1", DoseStatus::Taken, at("2025-03-01T08:02:00"));
        book.last_notified
            .insert("m2-2025-03-01-21:30".into(), day("2025-03-01"));
        book.snoozed.insert("m2".into(), 1_740_860_000_000);
        book.active_alert = Some("m2".into());

        db.save_book(&book).await.unwrap();
        let loaded = db.load_book(day("2025-03-01")).await.unwrap();

        let expected = ReminderBook {
            active_alert: None,
            ..book
        };
        assert_eq!(loaded, expected);
    }

    #[tokio::test]
    async fn stale_ledger_days_are_pruned_on_load() {
        let (_dir, db) = open();
        let mut book = ReminderBook::default();
        book.last_notified
            .insert("m1-2025-02-28-08:00".into(), day("2025-02-28"));
        book.last_notified
            .insert("m1-2025-03-01-08:00".into(), day("2025-03-01"));
        db.save_book(&book).await.unwrap();

        let loaded = db.load_book(day("2025-03-01")).await.unwrap();
        assert_eq!(loaded.last_notified.len(), 1);
        assert!(loaded.last_notified.contains_key("m1-2025-03-01-08:00"));
    }

    #[tokio::test]
    async fn malformed_documents_fall_back() {
        let (_dir, db) = open();
        let good = serde_json::to_value(medication("m1", "08:00", 10)).unwrap();
        let meds = serde_json::json!([good, {"id": "broken"}]).to_string();
        db.put_values(vec![
            (keys::MEDICATIONS, meds),
            (keys::DOSE_LOGS, "not json".into()),
            (keys::SNOOZED, "[]".into()),
        ])
        .await
        .unwrap();

        let loaded = db.load_book(day("2025-03-01")).await.unwrap();
        assert_eq!(loaded.medications.len(), 1);
        assert_eq!(loaded.medications[0].id, "m1");
        assert!(loaded.logs.is_empty());
        assert!(loaded.snoozed.is_empty());
    }
}
