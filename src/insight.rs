//! Short AI-written texts: a usage tip stored with each new medication and a
//! daily wellness sentence. Every failure path ends in static text.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::json;

use crate::config::AiConfig;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

pub const MEDICATION_TIP_FALLBACK: &str = "Remember to take as prescribed by your doctor.";
pub const EMPTY_TIP_FALLBACK: &str =
    "Consistency is the key to effective treatment. Stay on track!";

pub const DAILY_TIP_FALLBACKS: [&str; 5] = [
    "Drink a full glass of water with your medication for better absorption.",
    "Try to take your medicine at the same time every day to build a habit.",
    "Keep a list of all your medications in your wallet for emergencies.",
    "Store your medications in a cool, dry place away from direct sunlight.",
    "Don't hesitate to ask your pharmacist if you have questions about side effects.",
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenated text of the first candidate, `None` when there is none.
fn response_text(body: GenerateResponse) -> Option<String> {
    let text: String = body
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn medication_prompt(name: &str, dose: &str) -> String {
    format!(
        "Provide a very brief (max 2 sentences) tip for taking {name} ({dose}). \
         Focus on common advice like \"take with food\" or \"avoid alcohol\". \
         Keep it professional and helpful."
    )
}

const DAILY_PROMPT: &str = "Provide a unique, one-sentence health tip for someone taking daily \
    medications. Focus on hydration, consistency, safety, or general wellness. \
    Make it encouraging and short.";

fn random_daily_fallback() -> &'static str {
    DAILY_TIP_FALLBACKS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DAILY_TIP_FALLBACKS[0])
}

pub struct InsightClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl InsightClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// One generation request. `Ok(None)` means the service answered with no text.
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no API key configured"))?;

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("generation service returned {}", status.as_u16());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("unreadable generation response")?;
        Ok(response_text(body))
    }

    /// Usage advice for a medication being added.
    pub async fn medication_tip(&self, name: &str, dose: &str) -> String {
        if self.config.api_key.is_none() {
            log_debug!("no API key; using the default medication tip");
            return MEDICATION_TIP_FALLBACK.to_string();
        }
        match self.generate(&medication_prompt(name, dose)).await {
            Ok(Some(text)) => text,
            Ok(None) => MEDICATION_TIP_FALLBACK.to_string(),
            Err(err) => {
                log_error!("AI insight error: {err:#}");
                MEDICATION_TIP_FALLBACK.to_string()
            }
        }
    }

    pub async fn daily_tip(&self) -> String {
        if self.config.api_key.is_none() {
            log_debug!("no API key; using a built-in daily tip");
            return random_daily_fallback().to_string();
        }
        match self.generate(DAILY_PROMPT).await {
            Ok(Some(text)) => text,
            Ok(None) => EMPTY_TIP_FALLBACK.to_string(),
            Err(err) => {
                log_error!("daily tip error: {err:#}");
                random_daily_fallback().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, api_key: Option<&str>) -> AiConfig {
        AiConfig {
            endpoint: endpoint.to_string(),
            model: "test-model".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let client = InsightClient::new(config("https://ai.example.com/", None)).unwrap();
        assert_eq!(
            client.generate_url(),
            "https://ai.example.com/v1beta/models/test-model:generateContent"
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body: GenerateResponse = serde_json::from_str(concat!(
            r#"{"candidates":[{"content":{"parts":["#,
            r#"{"text":"Take with food. "},{"text":"Avoid alcohol."}]}}]}"#
        ))
        .unwrap();
        assert_eq!(
            response_text(body).as_deref(),
            Some("Take with food. Avoid alcohol.")
        );

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(response_text(empty), None);

        let blank: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(blank), None);
    }

    #[test]
    fn prompt_names_the_medication() {
        let prompt = medication_prompt("Metformin", "500mg");
        assert!(prompt.contains("Metformin (500mg)"));
    }

    #[tokio::test]
    async fn missing_key_uses_fallbacks() {
        let client = InsightClient::new(config("https://ai.example.com", None)).unwrap();
        assert_eq!(
            client.medication_tip("Metformin", "500mg").await,
            MEDICATION_TIP_FALLBACK
        );
        let tip = client.daily_tip().await;
        assert!(DAILY_TIP_FALLBACKS.contains(&tip.as_str()));
    }

    #[tokio::test]
    async fn unreachable_service_uses_fallbacks() {
        let client = InsightClient::new(config("http://127.0.0.1:9", Some("key"))).unwrap();
        assert_eq!(
            client.medication_tip("Metformin", "500mg").await,
            MEDICATION_TIP_FALLBACK
        );
        let tip = client.daily_tip().await;
        assert!(DAILY_TIP_FALLBACKS.contains(&tip.as_str()));
    }
}
