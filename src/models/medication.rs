//! Medication records and the stock/expiry classifications derived from them.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A time of day in local wall-clock hours and minutes, serialised as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoseTime {
    hour: u32,
    minute: u32,
}

impl DoseTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            bail!("invalid time of day {hour}:{minute:02}");
        }
        Ok(Self { hour, minute })
    }

    /// The minute a wall-clock reading falls in; seconds are truncated.
    pub fn from_wall_clock(time: NaiveTime) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default()
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for DoseTime {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (hour, minute) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow!("time '{value}' must look like HH:MM"))?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            bail!("time '{value}' must look like HH:MM");
        }
        let hour = hour
            .parse::<u32>()
            .map_err(|_| anyhow!("invalid hour in '{value}'"))?;
        let minute = minute
            .parse::<u32>()
            .map_err(|_| anyhow!("invalid minute in '{value}'"))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for DoseTime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DoseTime> for String {
    fn from(time: DoseTime) -> Self {
        time.to_string()
    }
}

/// How often the medication is meant to be taken. Informational only: the
/// scheduler always treats a medication as once a day at `time`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    Daily,
    TwiceDaily,
    Weekly,
    AsNeeded,
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::TwiceDaily => "Twice daily",
            Frequency::Weekly => "Weekly",
            Frequency::AsNeeded => "As needed",
        }
    }
}

fn default_duration_days() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dose: String,
    pub time: DoseTime,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    pub remaining_doses: u32,
    pub refill_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insight: Option<String>,
    pub start_date: DateTime<Utc>,
}

/// Input captured by the add form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedication {
    pub name: String,
    pub dose: String,
    pub time: DoseTime,
    pub frequency: Frequency,
    pub duration_days: u32,
    pub remaining_doses: u32,
    pub refill_threshold: u32,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewMedication {
    /// Form defaults: 30 doses on hand, refill warning at 5.
    pub fn new(name: impl Into<String>, dose: impl Into<String>, time: DoseTime) -> Self {
        Self {
            name: name.into(),
            dose: dose.into(),
            time,
            frequency: Frequency::Daily,
            duration_days: default_duration_days(),
            remaining_doses: 30,
            refill_threshold: 5,
            expiry_date: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StockState {
    InStock,
    NeedsRefill,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpiryState {
    Safe,
    Warning,
    Critical,
    Expired,
}

impl ExpiryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryState::Safe => "safe",
            ExpiryState::Warning => "expires soon",
            ExpiryState::Critical => "expiring",
            ExpiryState::Expired => "expired",
        }
    }
}

/// Classify an expiry date by whole days remaining from `today`.
/// No expiry date is always safe.
pub fn classify_expiry(expiry: Option<NaiveDate>, today: NaiveDate) -> ExpiryState {
    let Some(expiry) = expiry else {
        return ExpiryState::Safe;
    };

    let days_left = (expiry - today).num_days();
    if days_left < 0 {
        ExpiryState::Expired
    } else if days_left <= 5 {
        ExpiryState::Critical
    } else if days_left <= 30 {
        ExpiryState::Warning
    } else {
        ExpiryState::Safe
    }
}

impl Medication {
    pub fn stock_state(&self) -> StockState {
        if self.remaining_doses == 0 {
            StockState::OutOfStock
        } else if self.remaining_doses <= self.refill_threshold {
            StockState::NeedsRefill
        } else {
            StockState::InStock
        }
    }

    pub fn needs_refill(&self) -> bool {
        self.stock_state() == StockState::NeedsRefill
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_state() == StockState::OutOfStock
    }

    pub fn expiry_state(&self, today: NaiveDate) -> ExpiryState {
        classify_expiry(self.expiry_date, today)
    }

    /// Remove one dose from the count, never going below zero.
    pub fn consume_dose(&mut self) {
        self.remaining_doses = self.remaining_doses.saturating_sub(1);
    }
}
