use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{keys, Database};

impl Database {
    pub async fn get_value(&self, key: &'static str) -> Result<Option<String>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
        .await
    }

    pub async fn get_values(&self, wanted: Vec<&'static str>) -> Result<Vec<Option<String>>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
            let mut values = Vec::with_capacity(wanted.len());
            for key in wanted {
                let value = stmt
                    .query_row(params![key], |row| row.get::<_, String>(0))
                    .optional()
                    .with_context(|| format!("failed to read key {key}"))?;
                values.push(value);
            }
            Ok(values)
        })
        .await
    }

    /// Write every entry in one transaction, replacing existing values.
    pub async fn put_values(&self, entries: Vec<(&'static str, String)>) -> Result<()> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO kv_store (key, value, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                )?;
                for (key, value) in &entries {
                    stmt.execute(params![key, value, now])
                        .with_context(|| format!("failed to write key {key}"))?;
                }
            }
            tx.commit().context("failed to commit key-value write")?;
            Ok(())
        })
        .await
    }

    pub async fn delete_values(&self, doomed: Vec<&'static str>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for key in &doomed {
                tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                    .with_context(|| format!("failed to delete key {key}"))?;
            }
            tx.commit().context("failed to commit key-value delete")?;
            Ok(())
        })
        .await
    }

    /// Remove every persisted document.
    pub async fn reset_all(&self) -> Result<()> {
        self.delete_values(keys::ALL.to_vec()).await
    }
}
