//! Handlers shared by the one-shot subcommands and the daemon's input loop.
//! Each returns the text to show the user.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};

use crate::{
    cli::{AddArgs, BookCommand, SettingsArgs},
    models::{
        photo_data_url, ExpiryState, Medication, NewMedication, StockState, UserProfile,
    },
    pharmacy::pharmacy_search_url,
    reminders::ReminderBook,
    settings::Settings,
    AppState,
};

pub async fn execute(state: &AppState, command: BookCommand) -> Result<String> {
    match command {
        BookCommand::Add(args) => add(state, args).await,
        BookCommand::List => {
            let book = state.reminders.snapshot().await;
            Ok(render_list(&book, today()))
        }
        BookCommand::Deleted => {
            let book = state.reminders.snapshot().await;
            Ok(render_deleted(&book))
        }
        BookCommand::Delete { id } => {
            let med = state.reminders.delete_medication(&id).await?;
            Ok(format!(
                "Deleted {} ({}). Restore with `restore {}`.",
                med.name, med.dose, med.id
            ))
        }
        BookCommand::Restore { id } => {
            let med = state.reminders.restore_medication(&id).await?;
            Ok(format!("Restored {} at {}.", med.name, med.time))
        }
        BookCommand::Log { id, status } => {
            state.reminders.log_manual(&id, status).await?;
            Ok(format!("Logged {id} as {}.", status.as_str()))
        }
        BookCommand::History { limit } => {
            let book = state.reminders.snapshot().await;
            Ok(render_history(&book, limit))
        }
        BookCommand::Progress => {
            let book = state.reminders.snapshot().await;
            Ok(render_progress(&book, today()))
        }
        BookCommand::Settings(args) => settings(state, args).await,
        BookCommand::Profile { name, photo } => {
            let mut profile = state.db.load_profile().await?;
            if name.is_none() && photo.is_none() {
                return Ok(render_profile(&profile));
            }
            if let Some(name) = name {
                let name = name.trim().to_string();
                profile.display_name = (!name.is_empty()).then_some(name);
            }
            if let Some(path) = photo {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                profile.photo = Some(photo_data_url(&path, &bytes));
            }
            state.db.save_profile(&profile).await?;
            Ok(render_profile(&profile))
        }
        BookCommand::Tip => Ok(state.insight.daily_tip().await),
        BookCommand::Pharmacy { lat, lng } => pharmacy_search_url(lat, lng),
        BookCommand::Reset => {
            state.reminders.reset().await?;
            Ok("All data cleared.".to_string())
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn add(state: &AppState, args: AddArgs) -> Result<String> {
    if args.name.trim().is_empty() {
        bail!("medication name is required");
    }

    let insight = state.insight.medication_tip(args.name.trim(), args.dose.trim()).await;
    let input = NewMedication {
        name: args.name,
        dose: args.dose,
        time: args.time,
        frequency: args.frequency,
        duration_days: args.duration,
        remaining_doses: args.remaining,
        refill_threshold: args.threshold,
        expiry_date: args.expiry,
        notes: args.notes,
    };
    let med = state.reminders.add_medication(input, Some(insight)).await?;

    let mut out = format!("Added {} ({}) daily at {} [{}]", med.name, med.dose, med.time, med.id);
    if let Some(insight) = &med.ai_insight {
        let _ = write!(out, "\nTip: {insight}");
    }
    Ok(out)
}

fn apply_settings(mut settings: Settings, args: SettingsArgs) -> Settings {
    if let Some(sound) = args.sound {
        settings.sound_enabled = sound.enabled();
    }
    if let Some(notifications) = args.notifications {
        settings.notifications_enabled = notifications.enabled();
    }
    if let Some(vibrate) = args.vibrate {
        settings.vibrate_enabled = vibrate.enabled();
    }
    if let Some(style) = args.alarm_style {
        settings.alarm_style = style;
    }
    if let Some(snooze) = args.snooze {
        settings.snooze_duration = snooze;
    }
    if let Some(window) = args.missed_window {
        settings.missed_window = window;
    }
    settings
}

async fn settings(state: &AppState, args: SettingsArgs) -> Result<String> {
    let current = state.settings.current();
    if args.is_empty() {
        return Ok(render_settings(&current));
    }
    let updated = state
        .reminders
        .update_settings(apply_settings(current, args))
        .await?;
    Ok(render_settings(&updated))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

pub fn render_settings(settings: &Settings) -> String {
    format!(
        concat!(
            "sound: {}\nnotifications: {}\nvibrate: {}\n",
            "alarm style: {:?}\nsnooze: {} min\nmissed after: {} min"
        ),
        on_off(settings.sound_enabled),
        on_off(settings.notifications_enabled),
        on_off(settings.vibrate_enabled),
        settings.alarm_style,
        settings.snooze_duration,
        settings.missed_window,
    )
}

fn stock_note(med: &Medication) -> String {
    match med.stock_state() {
        StockState::InStock => format!("{} left", med.remaining_doses),
        StockState::NeedsRefill => format!("{} left, refill soon", med.remaining_doses),
        StockState::OutOfStock => "out of stock".to_string(),
    }
}

pub fn render_list(book: &ReminderBook, today: NaiveDate) -> String {
    if book.medications.is_empty() {
        return "No medications yet. Add one with `add`.".to_string();
    }

    let mut meds: Vec<&Medication> = book.medications.iter().collect();
    meds.sort_by_key(|med| med.time);

    let mut out = String::new();
    for med in meds {
        let status = book
            .status_on(&med.id, today)
            .map(|status| status.as_str())
            .unwrap_or("pending");
        let _ = write!(
            out,
            "{}  {:<20} {:<10} {:<8} {}",
            med.time,
            med.name,
            med.dose,
            status,
            stock_note(med)
        );
        let expiry = med.expiry_state(today);
        if expiry != ExpiryState::Safe {
            let _ = write!(out, ", {}", expiry.as_str());
        }
        if book.active_alert.as_deref() == Some(med.id.as_str()) {
            out.push_str("  <- ALERT");
        }
        let _ = writeln!(out, "\n       id {}", med.id);
    }
    out.trim_end().to_string()
}

pub fn render_deleted(book: &ReminderBook) -> String {
    if book.deleted.is_empty() {
        return "Nothing recently deleted.".to_string();
    }
    book.deleted
        .iter()
        .map(|med| format!("{}  {} ({})  id {}", med.time, med.name, med.dose, med.id))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(book: &ReminderBook, limit: usize) -> String {
    let entries = book.history(limit);
    if entries.is_empty() {
        return "No doses logged yet.".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<8} {}",
                entry.log.timestamp.format("%Y-%m-%d %H:%M"),
                entry.log.status.as_str(),
                entry
                    .medication_name
                    .as_deref()
                    .unwrap_or("deleted medication")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_progress(book: &ReminderBook, today: NaiveDate) -> String {
    let progress = book.daily_progress(today);
    let mut out = format!(
        "Today: {}/{} taken ({}%)",
        progress.taken,
        progress.total,
        progress.percent()
    );
    let refills = book.refill_list();
    if !refills.is_empty() {
        out.push_str("\nRefill soon:");
        for med in refills {
            let _ = write!(out, "\n  {} ({} left)", med.name, med.remaining_doses);
        }
    }
    out
}

fn render_profile(profile: &UserProfile) -> String {
    format!(
        "name: {}\nphoto: {}",
        profile.display_name.as_deref().unwrap_or("(not set)"),
        if profile.photo.is_some() { "set" } else { "(not set)" }
    )
}
