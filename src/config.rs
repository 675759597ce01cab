use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};

const DEFAULT_AI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_AI_MODEL: &str = "gemini-3-flash-preview";

/// Process-level configuration, resolved once at startup from the command
/// line and the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
    /// `MEDNOTIFY_DEBUG=1` logs every scheduler tick.
    pub debug: bool,
    pub ai: AiConfig,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    /// Without a key the tip calls go straight to their fallback text.
    pub api_key: Option<String>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn from_env(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir_override
            .or_else(|| env_non_empty("MEDNOTIFY_DATA_DIR").map(PathBuf::from))
        {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|dir| dir.join("mednotify"))
                .context("no data directory for this platform; pass --data-dir")?,
        };

        Ok(Self {
            data_dir,
            tick_interval: Duration::from_secs(1),
            debug: env_flag("MEDNOTIFY_DEBUG"),
            ai: AiConfig {
                endpoint: env_non_empty("MEDNOTIFY_AI_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_AI_ENDPOINT.to_string()),
                model: env_non_empty("MEDNOTIFY_AI_MODEL")
                    .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                api_key: env_non_empty("MEDNOTIFY_API_KEY"),
            },
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("mednotify.sqlite3")
    }

    /// Configuration rooted in `data_dir` with no AI key, for tests.
    #[cfg(test)]
    pub fn for_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            tick_interval: Duration::from_millis(20),
            debug: false,
            ai: AiConfig {
                endpoint: DEFAULT_AI_ENDPOINT.to_string(),
                model: DEFAULT_AI_MODEL.to_string(),
                api_key: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_wins() {
        let config = AppConfig::from_env(Some(PathBuf::from("/tmp/mednotify-test"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/mednotify-test"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/mednotify-test/mednotify.sqlite3")
        );
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }
}
