//! Foreground reminder loop: the scheduler ticks in the background while
//! stdin carries the user's answers to alerts.

use std::{fmt::Write as _, sync::Arc};

use anyhow::Result;
use chrono::{Local, TimeZone};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    cli::{parse_shell_line, ShellCommand},
    commands::{self, render_progress},
    reminders::{NotificationPermission, ReminderBook},
    AppState,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

enum Flow {
    Continue,
    Quit,
}

pub async fn run(state: AppState, audio_unlocked: bool) -> Result<()> {
    if audio_unlocked {
        state.audio.unlock();
    }
    if state.effects.permission() == NotificationPermission::Default {
        state.effects.request_permission();
    }

    state.reminders.start().await;
    log_info!("reminder daemon started");

    let insight = Arc::clone(&state.insight);
    tokio::spawn(async move {
        let tip = insight.daily_tip().await;
        println!("Tip of the day: {tip}");
    });

    println!("Watching your medication schedule. Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        // Any input is a user gesture.
                        state.audio.unlock();
                        if let Flow::Quit = handle_line(&state, &line).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        log_info!("stdin closed; reminders keep running until interrupted");
                        stdin_open = false;
                    }
                    Err(err) => {
                        log_warn!("failed to read stdin: {err}");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log_info!("interrupt received");
                break;
            }
        }
    }

    state.reminders.shutdown().await;
    log_info!("reminder daemon stopped");
    Ok(())
}

async fn handle_line(state: &AppState, line: &str) -> Flow {
    let parsed = match parse_shell_line(line) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return Flow::Continue,
        Err(err) => {
            println!("{}", err.to_string().trim_end());
            return Flow::Continue;
        }
    };

    let result = match parsed.command {
        ShellCommand::Quit => return Flow::Quit,
        ShellCommand::Take { id } => state
            .reminders
            .take(id.as_deref())
            .await
            .map(|name| format!("Marked {name} as taken.")),
        ShellCommand::Snooze => state
            .reminders
            .snooze()
            .await
            .map(|until| format!("Snoozed until {}.", until.format("%H:%M"))),
        ShellCommand::Skip => state
            .reminders
            .skip()
            .await
            .map(|_| "Skipped; logged as missed.".to_string()),
        ShellCommand::Status => {
            let book = state.reminders.snapshot().await;
            Ok(render_status(&book))
        }
        ShellCommand::Book(command) => commands::execute(state, command).await,
    };

    match result {
        Ok(text) => println!("{text}"),
        Err(err) => println!("error: {err:#}"),
    }
    Flow::Continue
}

fn render_status(book: &ReminderBook) -> String {
    let today = Local::now().date_naive();
    let mut out = match book.active_medication() {
        Some(med) => {
            let mut alert = format!("ALERT: {} ({}) scheduled {}", med.name, med.dose, med.time);
            if let Some(notes) = &med.notes {
                let _ = write!(alert, "\n  note: {notes}");
            }
            if let Some(insight) = &med.ai_insight {
                let _ = write!(alert, "\n  tip: {insight}");
            }
            alert.push_str("\n  reply `take`, `snooze` or `skip`");
            alert
        }
        None => "No active alert.".to_string(),
    };

    for (id, target_ms) in &book.snoozed {
        let name = book
            .medication(id)
            .map(|med| med.name.as_str())
            .unwrap_or(id.as_str());
        let until = Local
            .timestamp_millis_opt(*target_ms)
            .single()
            .map(|at| at.format("%H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = write!(out, "\nSnoozed: {name} until {until}");
    }

    let _ = write!(out, "\n{}", render_progress(book, today));
    out
}
