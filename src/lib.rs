pub mod audio;
mod cli;
mod commands;
pub mod config;
mod daemon;
pub mod db;
pub mod insight;
pub mod models;
pub mod pharmacy;
pub mod reminders;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use audio::AudioEngineHandle;
use cli::{Cli, Command};
use config::AppConfig;
use db::Database;
use insight::InsightClient;
use reminders::{EffectSink, ReminderController, TerminalEffects};
use settings::SettingsStore;

pub(crate) struct AppState {
    pub(crate) audio: Arc<AudioEngineHandle>,
    pub(crate) db: Database,
    pub(crate) reminders: ReminderController,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) insight: Arc<InsightClient>,
    pub(crate) effects: Arc<dyn EffectSink>,
}

impl AppState {
    pub(crate) async fn open(
        config: &AppConfig,
        effects: Arc<dyn EffectSink>,
    ) -> anyhow::Result<Self> {
        let db = Database::new(config.database_path())?;
        let settings = Arc::new(SettingsStore::load(db.clone()).await?);
        let audio = Arc::new(AudioEngineHandle::new());
        let reminders = ReminderController::load(
            db.clone(),
            settings.clone(),
            audio.clone(),
            effects.clone(),
            config,
        )
        .await?;
        let insight = Arc::new(InsightClient::new(config.ai.clone())?);

        Ok(Self {
            audio,
            db,
            reminders,
            settings,
            insight,
            effects,
        })
    }
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env(cli.data_dir.clone())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::open(&config, Arc::new(TerminalEffects::new())).await?;

        match cli.command {
            Command::Run { audio_unlocked } => {
                log::info!("MedNotify starting up...");
                daemon::run(state, audio_unlocked).await
            }
            Command::Book(command) => {
                let text = commands::execute(&state, command).await?;
                println!("{text}");
                Ok(())
            }
        }
    })
}
