//! services/portal/src/adapters/gemini.rs
//!
//! This module contains the adapter for the generative text API.
//! It implements the `GenerativeModel` port over the Generative Language
//! REST API; which of the two configured models to use is the caller's
//! decision (the conversation manager owns the primary/fallback policy).

use crate::adapters::firestore::http_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use studyhall_core::ports::{ChatTurn, GenerativeModel, PortError, PortResult, TurnRole};

const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Overall deadline for one generation request; generation is slow but a
/// hung call must not stall the conversation forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeModel` against the hosted
/// generative-language endpoint.
#[derive(Clone)]
pub struct GeminiAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(
            "https://generativelanguage.googleapis.com".to_string(),
            api_key,
        )
    }

    /// Constructor with an explicit endpoint, for tests against a local stub.
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url,
            api_key,
        }
    }
}

/// Builds the request body: the prior history in the API's role vocabulary
/// plus the new prompt, with any context folded into the prompt text.
fn build_request(history: &[ChatTurn], message: &str, context: Option<&str>) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Model => "model",
                },
                "parts": [{ "text": turn.text }]
            })
        })
        .collect();

    let prompt = match context {
        Some(context) => format!("Context: {}\n\nUser Question: {}", context, message),
        None => message.to_string(),
    };
    contents.push(json!({ "role": "user", "parts": [{ "text": prompt }] }));

    json!({
        "contents": contents,
        "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS }
    })
}

/// Pulls the generated text out of the first candidate.
fn extract_text(payload: &Value) -> PortResult<String> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PortError::Unexpected("Generation response carried no candidates.".to_string())
        })?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(PortError::Unexpected(
            "Generation response carried no text parts.".to_string(),
        ));
    }
    Ok(text)
}

//=========================================================================================
// `GenerativeModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeModel for GeminiAdapter {
    async fn generate(
        &self,
        model_id: &str,
        history: &[ChatTurn],
        message: &str,
        context: Option<&str>,
    ) -> PortResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );
        let body = build_request(history, message, context);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("generation request failed")
                .to_string();
            return Err(PortError::Unexpected(format!("HTTP {}: {}", status, message)));
        }

        extract_text(&payload)
    }
}
