//! Text-generation providers behind one capability seam.
//!
//! Generation never fails the caller: a missing key yields a sentinel
//! message and transport or HTTP errors come back as an explanatory string,
//! so review screens degrade instead of breaking.

use crate::domain::models::{AiProvider, AppSettings};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use keyring::Entry;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Mutex;
use url::Url;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const DEEPSEEK_DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
const QWEN_DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const QWEN_DEFAULT_MODEL: &str = "qwen-plus";
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
const GEMINI_ENV_KEY: &str = "GEMINI_API_KEY";
const KEYRING_SERVICE: &str = "focusflow-ai";
const CHAT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Fills provider defaults over whatever the settings leave blank.
pub fn resolve_provider_config(settings: &AppSettings) -> ProviderConfig {
    let configured_base = non_empty(&settings.ai_base_url);
    let configured_model = non_empty(&settings.ai_model);

    let (base_url, model) = match settings.ai_provider {
        AiProvider::Openai => (
            configured_base.unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            configured_model.unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        ),
        AiProvider::Deepseek => (
            configured_base.unwrap_or_else(|| DEEPSEEK_DEFAULT_BASE_URL.to_string()),
            configured_model.unwrap_or_else(|| DEEPSEEK_DEFAULT_MODEL.to_string()),
        ),
        AiProvider::Qwen => (
            configured_base.unwrap_or_else(|| QWEN_DEFAULT_BASE_URL.to_string()),
            configured_model.unwrap_or_else(|| QWEN_DEFAULT_MODEL.to_string()),
        ),
        AiProvider::Custom => (
            configured_base.unwrap_or_default(),
            configured_model.unwrap_or_default(),
        ),
        AiProvider::Gemini => (
            configured_base.unwrap_or_else(|| GEMINI_API_BASE_URL.to_string()),
            configured_model.unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        ),
    };

    ProviderConfig {
        provider: settings.ai_provider,
        api_key: resolve_api_key(settings),
        base_url,
        model,
    }
}

/// Settings value first, then the OS keyring, then (for Gemini only) the
/// environment.
fn resolve_api_key(settings: &AppSettings) -> Option<String> {
    if let Some(key) = non_empty(&settings.ai_api_key) {
        return Some(key);
    }
    if let Some(key) = keyring_api_key(settings.ai_provider) {
        return Some(key);
    }
    if settings.ai_provider == AiProvider::Gemini {
        return std::env::var(GEMINI_ENV_KEY)
            .ok()
            .as_deref()
            .and_then(non_empty);
    }
    None
}

fn keyring_api_key(provider: AiProvider) -> Option<String> {
    let entry = Entry::new(KEYRING_SERVICE, provider.as_str()).ok()?;
    entry.get_password().ok().as_deref().and_then(non_empty)
}

pub fn missing_key_message(provider: AiProvider) -> String {
    match provider {
        AiProvider::Gemini => "Missing API key (no environment variable found).".to_string(),
        other => format!("Missing {} API key; check Settings.", other.as_str()),
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> String;
}

#[derive(Debug)]
pub struct ReqwestTextGenerator {
    client: Client,
    config: ProviderConfig,
}

impl ReqwestTextGenerator {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::with_config(resolve_provider_config(settings))
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn try_generate(
        &self,
        api_key: &str,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, InfraError> {
        let text = match self.config.provider {
            AiProvider::Gemini => self.gemini_generate(api_key, prompt, system_instruction).await?,
            _ => {
                self.chat_completion_generate(api_key, prompt, system_instruction)
                    .await?
            }
        };
        if text.trim().is_empty() {
            return Ok("The AI service returned no response.".to_string());
        }
        Ok(text)
    }

    async fn chat_completion_generate(
        &self,
        api_key: &str,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, InfraError> {
        let url = chat_completions_endpoint(&self.config.base_url)?;
        let mut messages = Vec::new();
        if let Some(system) = system_instruction {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": CHAT_TEMPERATURE,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| InfraError::InvalidConfig(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::InvalidConfig(error.to_string()))?;
        if !status.is_success() {
            return Err(InfraError::InvalidConfig(format!(
                "API error {}: {body}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(extract_chat_completion_text(&value).unwrap_or_default())
    }

    async fn gemini_generate(
        &self,
        api_key: &str,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, InfraError> {
        let url = gemini_endpoint(&self.config.base_url, &self.config.model, api_key)?;
        let mut payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        if let Some(system) = system_instruction {
            payload["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| InfraError::InvalidConfig(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::InvalidConfig(error.to_string()))?;
        if !status.is_success() {
            return Err(InfraError::InvalidConfig(format!(
                "API error {}: {body}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(extract_gemini_text(&value).unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for ReqwestTextGenerator {
    async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> String {
        let Some(api_key) = self.config.api_key.clone() else {
            return missing_key_message(self.config.provider);
        };

        match self.try_generate(&api_key, prompt, system_instruction).await {
            Ok(text) => text,
            Err(error) => format!("Error: {error}"),
        }
    }
}

fn chat_completions_endpoint(base_url: &str) -> Result<Url, InfraError> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|error| InfraError::InvalidConfig(format!("invalid AI base url: {error}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("AI base URL cannot be a base".to_string()))?;
        segments.pop_if_empty();
        segments.push("chat");
        segments.push("completions");
    }
    Ok(url)
}

fn gemini_endpoint(base_url: &str, model: &str, api_key: &str) -> Result<Url, InfraError> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|error| InfraError::InvalidConfig(format!("invalid Gemini base url: {error}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("Gemini base URL cannot be a base".to_string()))?;
        segments.pop_if_empty();
        segments.push(&format!("{model}:generateContent"));
    }
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

pub fn extract_chat_completion_text(value: &Value) -> Option<String> {
    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

pub fn extract_gemini_text(value: &Value) -> Option<String> {
    let parts = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)?;
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

/// Test double that answers with a fixed response and records every prompt.
#[derive(Debug, Default)]
pub struct CannedTextGenerator {
    response: String,
    prompts: Mutex<Vec<(String, Option<String>)>>,
}

impl CannedTextGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, Option<String>)> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for CannedTextGenerator {
    async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> String {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), system_instruction.map(ToOwned::to_owned)));
        }
        self.response.clone()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_for(provider: AiProvider) -> AppSettings {
        AppSettings {
            ai_provider: provider,
            ai_api_key: "test-key".to_string(),
            ..AppSettings::default()
        }
    }

    #[test]
    fn provider_defaults_fill_blank_settings() {
        let config = resolve_provider_config(&settings_for(AiProvider::Openai));
        assert_eq!(config.base_url, OPENAI_DEFAULT_BASE_URL);
        assert_eq!(config.model, OPENAI_DEFAULT_MODEL);

        let config = resolve_provider_config(&settings_for(AiProvider::Deepseek));
        assert_eq!(config.base_url, DEEPSEEK_DEFAULT_BASE_URL);
        assert_eq!(config.model, DEEPSEEK_DEFAULT_MODEL);

        let config = resolve_provider_config(&settings_for(AiProvider::Qwen));
        assert_eq!(config.base_url, QWEN_DEFAULT_BASE_URL);
        assert_eq!(config.model, QWEN_DEFAULT_MODEL);

        let config = resolve_provider_config(&settings_for(AiProvider::Gemini));
        assert_eq!(config.model, GEMINI_DEFAULT_MODEL);
    }

    #[test]
    fn configured_values_override_provider_defaults() {
        let settings = AppSettings {
            ai_base_url: "https://proxy.example.com/v1".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ..settings_for(AiProvider::Openai)
        };
        let config = resolve_provider_config(&settings);
        assert_eq!(config.base_url, "https://proxy.example.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn settings_key_wins_and_is_trimmed() {
        let settings = AppSettings {
            ai_api_key: "  spaced-key  ".to_string(),
            ..settings_for(AiProvider::Openai)
        };
        let config = resolve_provider_config(&settings);
        assert_eq!(config.api_key.as_deref(), Some("spaced-key"));
    }

    #[tokio::test]
    async fn missing_key_yields_sentinel_not_error() {
        let generator = ReqwestTextGenerator::with_config(ProviderConfig {
            provider: AiProvider::Deepseek,
            api_key: None,
            base_url: DEEPSEEK_DEFAULT_BASE_URL.to_string(),
            model: DEEPSEEK_DEFAULT_MODEL.to_string(),
        });
        let text = generator.generate("summarize", None).await;
        assert!(text.contains("Missing deepseek API key"));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_error_string() {
        let generator = ReqwestTextGenerator::with_config(ProviderConfig {
            provider: AiProvider::Custom,
            api_key: Some("key".to_string()),
            base_url: "http://127.0.0.1:1/v1".to_string(),
            model: "local".to_string(),
        });
        let text = generator.generate("summarize", None).await;
        assert!(text.starts_with("Error: "), "got: {text}");
    }

    #[test]
    fn chat_endpoint_appends_completions_path() {
        let url = chat_completions_endpoint("https://api.openai.com/v1").expect("endpoint");
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let url = chat_completions_endpoint("https://api.deepseek.com/").expect("endpoint");
        assert_eq!(url.as_str(), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn gemini_endpoint_embeds_model_and_key() {
        let url = gemini_endpoint(GEMINI_API_BASE_URL, "gemini-2.5-flash", "k123").expect("endpoint");
        assert!(url.path().ends_with("/gemini-2.5-flash:generateContent"));
        assert_eq!(url.query(), Some("key=k123"));
    }

    #[test]
    fn chat_completion_extraction_follows_choices_path() {
        let value = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "A fine day."}}]
        });
        assert_eq!(
            extract_chat_completion_text(&value).as_deref(),
            Some("A fine day.")
        );
        assert!(extract_chat_completion_text(&serde_json::json!({})).is_none());
    }

    #[test]
    fn gemini_extraction_joins_candidate_parts() {
        let value = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "First."}, {"text": "Second."}]}}]
        });
        assert_eq!(
            extract_gemini_text(&value).as_deref(),
            Some("First.\nSecond.")
        );
        assert!(extract_gemini_text(&serde_json::json!({"candidates": []})).is_none());
    }

    #[tokio::test]
    async fn canned_generator_records_prompts() {
        let generator = CannedTextGenerator::new("canned reply");
        let text = generator.generate("what happened", Some("be brief")).await;
        assert_eq!(text, "canned reply");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "what happened");
        assert_eq!(prompts[0].1.as_deref(), Some("be brief"));
    }
}
