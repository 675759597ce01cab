use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::{
    models::{DoseStatus, DoseTime, Frequency},
    settings::AlarmStyle,
};

/// Personal medication reminders.
#[derive(Debug, Parser)]
#[command(name = "mednotify", version, about)]
pub struct Cli {
    /// Directory holding the reminder database.
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the reminder daemon; resolve alerts by typing commands on stdin.
    Run {
        /// Allow alarm sound before the first line of input.
        #[arg(long)]
        audio_unlocked: bool,
    },
    #[command(flatten)]
    Book(BookCommand),
}

/// Commands available both from the shell and inside a running daemon.
#[derive(Debug, Subcommand)]
pub enum BookCommand {
    /// Add a medication.
    Add(AddArgs),
    /// Active medications with today's status.
    List,
    /// Recently deleted medications.
    Deleted,
    /// Move a medication to the recently deleted list.
    Delete { id: String },
    /// Bring back a recently deleted medication.
    Restore { id: String },
    /// Record a dose by hand.
    Log {
        id: String,
        #[arg(value_enum)]
        status: DoseStatus,
    },
    /// Dose history, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Today's adherence and medications that need a refill.
    Progress,
    /// Show or change alert settings.
    Settings(SettingsArgs),
    /// Show or change the user profile.
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Image file to use as the profile picture.
        #[arg(long, value_name = "PATH")]
        photo: Option<PathBuf>,
    },
    /// A short health tip for the day.
    Tip,
    /// Link to a map search for nearby pharmacies.
    Pharmacy {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Delete every medication, log entry, setting and the profile.
    Reset,
}

fn parse_dose_time(value: &str) -> Result<DoseTime, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub dose: String,
    /// Daily reminder time, HH:MM.
    #[arg(long, value_parser = parse_dose_time)]
    pub time: DoseTime,
    #[arg(long, value_enum, default_value_t = Frequency::Daily)]
    pub frequency: Frequency,
    /// Course length in days.
    #[arg(long, default_value_t = 30)]
    pub duration: u32,
    /// Doses on hand.
    #[arg(long, default_value_t = 30)]
    pub remaining: u32,
    /// Warn about a refill at or below this many doses.
    #[arg(long, default_value_t = 5)]
    pub threshold: u32,
    /// YYYY-MM-DD
    #[arg(long)]
    pub expiry: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(self) -> bool {
        self == Switch::On
    }
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[arg(long, value_enum)]
    pub sound: Option<Switch>,
    #[arg(long, value_enum)]
    pub notifications: Option<Switch>,
    #[arg(long, value_enum)]
    pub vibrate: Option<Switch>,
    #[arg(long, value_enum)]
    pub alarm_style: Option<AlarmStyle>,
    /// Minutes before a snoozed alert fires again.
    #[arg(long, value_name = "MIN")]
    pub snooze: Option<u32>,
    /// Minutes after the scheduled time before a dose counts as missed.
    #[arg(long, value_name = "MIN")]
    pub missed_window: Option<u32>,
}

impl SettingsArgs {
    pub fn is_empty(&self) -> bool {
        self.sound.is_none()
            && self.notifications.is_none()
            && self.vibrate.is_none()
            && self.alarm_style.is_none()
            && self.snooze.is_none()
            && self.missed_window.is_none()
    }
}

/// A line typed into a running daemon.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShellCommand {
    /// Mark the alerting dose (or the given medication) as taken.
    Take { id: Option<String> },
    /// Put the alert off for the snooze duration.
    Snooze,
    /// Dismiss the alert; the dose is logged as missed.
    Skip,
    /// Current alert, pending snoozes and today's progress.
    Status,
    /// Stop the daemon.
    #[command(alias = "exit")]
    Quit,
    #[command(flatten)]
    Book(BookCommand),
}

/// Split a daemon input line the way a shell would and parse it. `Ok(None)`
/// for a blank line.
pub fn parse_shell_line(line: &str) -> Result<Option<ShellLine>> {
    let words = shlex::split(line).ok_or_else(|| anyhow!("unbalanced quotes in input"))?;
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words)
        .map(Some)
        .map_err(|err| anyhow!(err.render().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
        ShellLine::command().debug_assert();
    }

    #[test]
    fn parses_add_with_defaults() {
        let cli = Cli::try_parse_from([
            "mednotify",
            "--data-dir",
            "/tmp/x",
            "add",
            "--name",
            "Metformin",
            "--dose",
            "500mg",
            "--time",
            "8:30",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Command::Book(BookCommand::Add(args)) => {
                assert_eq!(args.time, DoseTime::new(8, 30).unwrap());
                assert_eq!(args.remaining, 30);
                assert_eq!(args.threshold, 5);
                assert_eq!(args.frequency, Frequency::Daily);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_time() {
        let result = Cli::try_parse_from([
            "mednotify", "add", "--name", "X", "--dose", "1", "--time", "25:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn shell_lines() {
        assert!(parse_shell_line("   ").unwrap().is_none());

        let line = parse_shell_line("take").unwrap().unwrap();
        assert!(matches!(line.command, ShellCommand::Take { id: None }));

        let line = parse_shell_line("log m1 skipped").unwrap().unwrap();
        assert!(matches!(
            line.command,
            ShellCommand::Book(BookCommand::Log {
                status: DoseStatus::Skipped,
                ..
            })
        ));

        let line = parse_shell_line(r#"add --name "Vitamin D" --dose 1000IU --time 09:00"#)
            .unwrap()
            .unwrap();
        match line.command {
            ShellCommand::Book(BookCommand::Add(args)) => assert_eq!(args.name, "Vitamin D"),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(parse_shell_line("frobnicate").is_err());
        assert!(parse_shell_line("add --name \"open").is_err());
    }
}
