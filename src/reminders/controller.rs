use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::AudioEngineHandle,
    config::AppConfig,
    db::Database,
    models::{DoseStatus, Medication, NewMedication},
    settings::{Settings, SettingsStore},
};

use super::{
    alerts::settings_transition,
    effects::{execute_effects, AlertEffect, EffectSink},
    scheduler::{self, TickOutcome},
    ReminderBook,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Owns the reminder book. Scheduler ticks and user resolutions both go
/// through the book lock, so they never interleave; every committed change
/// is written back before the lock is released.
#[derive(Clone)]
pub struct ReminderController {
    book: Arc<Mutex<ReminderBook>>,
    db: Database,
    settings: Arc<SettingsStore>,
    audio: Arc<AudioEngineHandle>,
    effects: Arc<dyn EffectSink>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel: CancellationToken,
    tick_interval: Duration,
    debug: bool,
}

fn now_local() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

impl ReminderController {
    pub async fn load(
        db: Database,
        settings: Arc<SettingsStore>,
        audio: Arc<AudioEngineHandle>,
        effects: Arc<dyn EffectSink>,
        config: &AppConfig,
    ) -> Result<Self> {
        let today = Local::now().date_naive();
        let book = db.load_book(today).await?;

        log_info!(
            "Loaded {} medications, {} log entries",
            book.medications.len(),
            book.logs.len()
        );

        Ok(Self {
            book: Arc::new(Mutex::new(book)),
            db,
            settings,
            audio,
            effects,
            ticker: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            tick_interval: config.tick_interval,
            debug: config.debug,
        })
    }

    pub async fn snapshot(&self) -> ReminderBook {
        self.book.lock().await.clone()
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    /// Store new settings. An alarm already sounding picks up the change.
    pub async fn update_settings(&self, settings: Settings) -> Result<Settings> {
        let (updated, effects) = {
            let book = self.book.lock().await;
            let previous = self.settings.current();
            let updated = self.settings.update(settings).await?;
            let effects = settings_transition(book.is_alerting(), &previous, &updated);
            (updated, effects)
        };

        execute_effects(&effects, self.effects.as_ref(), &self.audio);
        Ok(updated)
    }

    /// Run one scheduler pass as of `now`. A pass whose write fails leaves
    /// the book as it was, so the next tick evaluates it again.
    pub async fn tick_at(&self, now: DateTime<FixedOffset>) -> Result<TickOutcome> {
        let settings = self.settings.current();
        let outcome = {
            let mut book = self.book.lock().await;
            let mut draft = book.clone();
            let outcome = scheduler::evaluate(&mut draft, &settings, now);
            if outcome.changed {
                self.db.save_book(&draft).await?;
                *book = draft;
            }
            outcome
        };

        execute_effects(&outcome.effects, self.effects.as_ref(), &self.audio);
        Ok(outcome)
    }

    /// Apply a change to the book, persist it, then perform its effects.
    async fn commit<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut ReminderBook, &Settings) -> Result<(T, Vec<AlertEffect>)>,
    {
        let settings = self.settings.current();
        let (value, effects) = {
            let mut book = self.book.lock().await;
            let mut draft = book.clone();
            let result = change(&mut draft, &settings)?;
            self.db.save_book(&draft).await?;
            *book = draft;
            result
        };

        execute_effects(&effects, self.effects.as_ref(), &self.audio);
        Ok(value)
    }

    /// Resolve as taken: the active alert, or a specific medication (the
    /// notification action names one even if the slot has moved on).
    pub async fn take(&self, medication_id: Option<&str>) -> Result<String> {
        let now = now_local();
        let wanted = medication_id.map(str::to_string);
        self.commit(move |book, settings| {
            let id = match wanted {
                Some(id) => id,
                None => book
                    .active_alert
                    .clone()
                    .ok_or_else(|| anyhow!("no alert is active"))?,
            };
            let name = book
                .medication(&id)
                .map(|med| med.name.clone())
                .ok_or_else(|| anyhow!("no active medication with id {id}"))?;
            let effects = book.mark_taken(&id, now, settings);
            Ok((name, effects))
        })
        .await
    }

    /// Snooze the active alert; returns when it will fire again.
    pub async fn snooze(&self) -> Result<DateTime<FixedOffset>> {
        let now = now_local();
        self.commit(move |book, settings| {
            let effects = book.snooze_active(now, settings)?;
            let until = now + chrono::Duration::minutes(i64::from(settings.snooze_duration));
            Ok((until, effects))
        })
        .await
    }

    pub async fn skip(&self) -> Result<()> {
        let now = now_local();
        self.commit(move |book, settings| Ok(((), book.skip_active(now, settings)?)))
            .await
    }

    /// Manual log from the medication list.
    pub async fn log_manual(&self, medication_id: &str, status: DoseStatus) -> Result<()> {
        let now = now_local();
        let id = medication_id.to_string();
        self.commit(move |book, settings| {
            book.ensure_loggable(&id, now.date_naive())?;
            Ok(((), book.log_dose(&id, status, now, settings)))
        })
        .await
    }

    pub async fn add_medication(
        &self,
        input: NewMedication,
        ai_insight: Option<String>,
    ) -> Result<Medication> {
        self.commit(move |book, _| {
            let medication = book.add_medication(input, ai_insight, Utc::now())?;
            Ok((medication, Vec::new()))
        })
        .await
    }

    pub async fn delete_medication(&self, medication_id: &str) -> Result<Medication> {
        let id = medication_id.to_string();
        self.commit(move |book, settings| {
            let effects = book.delete_medication(&id, settings)?;
            let medication = book
                .deleted
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("deleted list unexpectedly empty"))?;
            Ok((medication, effects))
        })
        .await
    }

    pub async fn restore_medication(&self, medication_id: &str) -> Result<Medication> {
        let id = medication_id.to_string();
        self.commit(move |book, _| Ok((book.restore_medication(&id)?, Vec::new())))
            .await
    }

    /// Forget everything: medications, logs, ledgers, settings and profile.
    pub async fn reset(&self) -> Result<()> {
        {
            let mut book = self.book.lock().await;
            self.db.reset_all().await?;
            *book = ReminderBook::default();
        }
        self.settings.reset_in_memory();
        if let Err(err) = self.audio.stop_alarm() {
            log_error!("failed to stop alarm on reset: {err}");
        }
        log_info!("All reminder data cleared");
        Ok(())
    }

    /// Start the once-a-second scheduler.
    pub async fn start(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(controller.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        ticks = ticks.wrapping_add(1);
                        match controller.tick_at(now_local()).await {
                            Ok(outcome) => {
                                if controller.debug {
                                    log_info!(
                                        "tick #{}: changed={} effects={}",
                                        ticks,
                                        outcome.changed,
                                        outcome.effects.len()
                                    );
                                }
                            }
                            Err(err) => log_error!("reminder tick failed: {err:#}"),
                        }
                    }
                    _ = cancel.cancelled() => {
                        log_info!("reminder ticker shutting down");
                        break;
                    }
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    /// Stop the ticker and silence any alarm.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.ticker.lock().await.take() {
            if let Err(err) = handle.await {
                log_error!("reminder ticker failed to join: {err}");
            }
        }
        if let Err(err) = self.audio.stop_alarm() {
            log_error!("failed to stop alarm on shutdown: {err}");
        }
    }
}
