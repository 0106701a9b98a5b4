//! External reasoning call surface
//!
//! The only AI call surface in the engine. Triage, planning, and narrative
//! synthesis all go through the `Reasoner` trait so production (a local LLM
//! server over HTTP) and tests (a deterministic stub) are interchangeable.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::metrics;

/// A classification/generation call against an external model.
///
/// Implementations must honor future cancellation: callers wrap every call in
/// a timeout and drop the future when the budget elapses.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Send a prompt, return the raw model output
    async fn classify(&self, prompt: &str) -> Result<String>;

    /// Implementation name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Call a reasoner under a budget with metrics attribution.
///
/// Returns Err on timeout or model failure; every caller has a deterministic
/// fallback for that case.
pub async fn call_bounded(
    reasoner: &dyn Reasoner,
    caller: &'static str,
    budget: Duration,
    prompt: &str,
) -> Result<String> {
    let start = Instant::now();
    let outcome = tokio::time::timeout(budget, reasoner.classify(prompt)).await;

    metrics::REASONER_DURATION
        .with_label_values(&[caller])
        .observe(start.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(output)) => {
            metrics::REASONER_CALLS_TOTAL
                .with_label_values(&[caller, "ok"])
                .inc();
            Ok(output)
        }
        Ok(Err(e)) => {
            metrics::REASONER_CALLS_TOTAL
                .with_label_values(&[caller, "error"])
                .inc();
            Err(e)
        }
        Err(_) => {
            metrics::REASONER_CALLS_TOTAL
                .with_label_values(&[caller, "timeout"])
                .inc();
            Err(anyhow!("reasoner call exceeded budget of {budget:?}"))
        }
    }
}

// =============================================================================
// HTTP REASONER (Ollama / OpenAI-compatible local servers)
// =============================================================================

/// Request format for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

/// Response format from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Request format for OpenAI-compatible APIs (LM Studio, vLLM, etc.)
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: i32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// Response format from OpenAI-compatible APIs
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: String,
}

/// Reasoner backed by a local LLM server over HTTP.
///
/// Tries the Ollama API first and falls back to the OpenAI-compatible
/// endpoint, so the same config works against Ollama, LM Studio, or vLLM.
pub struct HttpReasoner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpReasoner {
    /// # Arguments
    /// * `endpoint` - Base URL (e.g., "http://localhost:11434" for Ollama)
    /// * `model` - Model name (e.g., "qwen2.5:1.5b", "llama3.2:1b")
    pub fn new(endpoint: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: 512,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("API returned status: {}", response.status()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }

    async fn generate_openai(&self, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.1,
            max_tokens: 512,
        };

        let url = format!("{}/v1/chat/completions", self.endpoint);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("API returned status: {}", response.status()));
        }

        let openai_response: OpenAIResponse = response.json().await?;

        openai_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("No response from API"))
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn classify(&self, prompt: &str) -> Result<String> {
        // Try Ollama first, fall back to OpenAI-compatible API
        match self.generate_ollama(prompt).await {
            Ok(response) => Ok(response),
            Err(_) => self.generate_openai(prompt).await,
        }
    }

    fn name(&self) -> &'static str {
        "HttpReasoner"
    }
}

// =============================================================================
// STATIC REASONER (deterministic stub)
// =============================================================================

/// Deterministic reasoner returning a fixed response. Used for flake-free
/// unit tests of triage and planning without live model calls.
pub struct StaticReasoner {
    response: String,
}

impl StaticReasoner {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl Reasoner for StaticReasoner {
    async fn classify(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }

    fn name(&self) -> &'static str {
        "StaticReasoner"
    }
}

// =============================================================================
// OUTPUT PARSING
// =============================================================================

/// Extract JSON from potentially messy LLM output
pub fn extract_json(output: &str) -> String {
    // Remove markdown code blocks if present
    let cleaned = output
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Find the first { and matching }
    if let Some(start) = cleaned.find('{') {
        let mut depth = 0;
        let mut end = start;
        for (i, c) in cleaned[start..].chars().enumerate() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        cleaned[start..end].to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json() {
        let output = r#"Here is the JSON: {"remember": true, "content": "x"} and some more text"#;
        let json = extract_json(output);
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
    }

    #[test]
    fn test_extract_json_with_markdown() {
        let output = "```json\n{\"remember\": false}\n```";
        let json = extract_json(output);
        assert_eq!(json, r#"{"remember": false}"#);
    }

    #[tokio::test]
    async fn test_static_reasoner() {
        let reasoner = StaticReasoner::new("canned");
        assert_eq!(reasoner.classify("anything").await.unwrap(), "canned");
    }

    #[tokio::test]
    async fn test_call_bounded_times_out() {
        struct SlowReasoner;

        #[async_trait]
        impl Reasoner for SlowReasoner {
            async fn classify(&self, _prompt: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            }
            fn name(&self) -> &'static str {
                "SlowReasoner"
            }
        }

        let start = Instant::now();
        let result =
            call_bounded(&SlowReasoner, "triage", Duration::from_millis(50), "p").await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
