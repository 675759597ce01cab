use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Skipped,
    Missed,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Taken => "taken",
            DoseStatus::Skipped => "skipped",
            DoseStatus::Missed => "missed",
        }
    }
}

/// One resolution event. Entries are never edited once written; the log is
/// kept newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoseLog {
    pub id: String,
    /// May point at a medication that has since been deleted.
    pub medication_id: String,
    /// Recorded with the local offset in effect, so the wall-clock date the
    /// dose belongs to survives later timezone changes.
    pub timestamp: DateTime<FixedOffset>,
    pub status: DoseStatus,
}

impl DoseLog {
    pub fn new(medication_id: &str, status: DoseStatus, at: DateTime<FixedOffset>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            medication_id: medication_id.to_string(),
            timestamp: at,
            status,
        }
    }

    /// Local calendar date the entry was recorded on.
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.naive_local().date()
    }
}
