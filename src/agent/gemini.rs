//! Client for the Gemini `generateContent` endpoint.
//!
//! Only the subset of the request/response schema used by the sweep,
//! SITREP and speech calls is modelled.

use crate::config::ModelConfig;
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_name: String,
    pub tts_model: String,
    pub voice: String,
    pub temperature: f64,
    pub timeout_seconds: u64,
    /// Show a spinner while waiting on the model
    pub show_progress: bool,
}

impl GeminiConfig {
    pub fn from_model_config(config: &ModelConfig, api_key: String, show_progress: bool) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model_name: config.name.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.voice.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            show_progress,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
}

impl GenerateRequest {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::user(text)],
            system_instruction: None,
            tools: vec![],
            generation_config: None,
        }
    }

    /// Set the sampling temperature, keeping any other generation settings.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        let config = self.generation_config.get_or_insert_with(|| json!({}));
        if let Some(map) = config.as_object_mut() {
            map.insert("temperature".to_string(), json!(temperature));
        }
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    fn first_part(&self) -> Option<&Part> {
        self.candidates.first()?.content.as_ref()?.parts.first()
    }

    /// Text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.first_part()?.text.as_deref()
    }

    /// Inline payload of the first part of the first candidate.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.first_part()?.inline_data.as_ref()
    }
}

/// Thin async client.
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Call `generateContent` on the main model.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.generate_with(&self.config.model_name, request).await
    }

    /// Call `generateContent` on a specific model.
    pub async fn generate_with(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.config.api_url, model);
        debug!("POST {}", url);

        let spinner = self.spinner(model);

        let result = self
            .http_client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow!("Cannot connect to {}", self.config.api_url)
                } else {
                    anyhow!("Failed to send request: {}", e.without_url())
                }
            });

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let response = result?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, body));
        }

        response
            .json::<GenerateResponse>()
            .await
            .context("Failed to parse Gemini response")
    }

    fn spinner(&self, model: &str) -> Option<ProgressBar> {
        if !self.config.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Waiting on {}...", model));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let mut request = GenerateRequest::prompt("hello");
        request.system_instruction = Some(Content::system("be brief"));
        request.tools = vec![json!({ "google_search": {} })];
        request.generation_config = Some(json!({ "responseMimeType": "application/json" }));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value["contents"][0]["parts"][0].get("inlineData").is_none());
    }

    #[test]
    fn test_plain_prompt_omits_optional_fields() {
        let value = serde_json::to_value(GenerateRequest::prompt("x")).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("systemInstruction").is_none());
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_with_temperature_keeps_other_settings() {
        let mut request = GenerateRequest::prompt("x");
        request.generation_config = Some(json!({ "responseMimeType": "application/json" }));

        let value = serde_json::to_value(request.with_temperature(0.5)).unwrap();
        assert_eq!(
            value["generationConfig"],
            json!({ "responseMimeType": "application/json", "temperature": 0.5 })
        );
    }

    #[test]
    fn test_response_text() {
        let response: GenerateResponse = serde_json::from_str(include_str!(
            "../../fixtures/sweep_response.json"
        ))
        .unwrap();
        assert!(response.text().unwrap().contains("\"military\""));
        assert!(response.inline_data().is_none());
    }

    #[test]
    fn test_response_inline_data() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": { "mimeType": "audio/L16;rate=24000", "data": "AAE=" }
                    }]
                }
            }]
        }))
        .unwrap();
        assert_eq!(response.inline_data().unwrap().data, "AAE=");
        assert!(response.text().is_none());
    }

    #[test]
    fn test_empty_response() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.text().is_none());
    }
}
