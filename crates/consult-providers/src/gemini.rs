//! Minimal client for the Gemini `generateContent` endpoint.
//!
//! One request, one text reply. No retries: the consultation controller
//! treats a failed call as "no result" and falls back.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use consult_core::config::LlmConfig;
use consult_core::error::ConsultError;

/// HTTP client bound to one model and API key.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConsultError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsultError::Llm(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: LlmConfig::default().base_url,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from the `[llm]` section, reading the key from the
    /// configured environment variable.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConsultError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ConsultError::Config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        if api_key.trim().is_empty() {
            return Err(ConsultError::Config(format!(
                "environment variable {} is empty",
                config.api_key_env
            )));
        }
        Ok(Self::new(api_key, &config.model, Duration::from_secs(config.timeout_secs))?
            .with_base_url(&config.base_url))
    }

    /// Override the endpoint base (everything before `/{model}:generateContent`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user turn and return the reply text.
    pub async fn generate(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, ConsultError> {
        let request = GenerateContentRequest {
            contents: vec![Content::text("user", prompt)],
            system_instruction: system_instruction.map(|text| Content::text("system", text)),
        };
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ConsultError::Llm(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ConsultError::Llm(format!("failed to parse Gemini response: {e}")))?;
        extract_text(parsed)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, ConsultError> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ConsultError::Llm(
            "Gemini returned no text in the response candidates".to_string(),
        ));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> ConsultError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let msg = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(s) if !s.is_empty() => format!("{s}: {msg}"),
                _ => msg,
            })
        })
        .unwrap_or_else(|| body.to_string());
    ConsultError::Llm(format!("Gemini returned {}: {}", status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-test";

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", MODEL, Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    fn text_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] }
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{MODEL}:generateContent")))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                "systemInstruction": { "parts": [{ "text": "be brief" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server).generate(Some("be brief"), "hello").await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn test_generate_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
            })))
            .mount(&server)
            .await;

        let reply = client(&server).generate(None, "x").await.unwrap();
        assert_eq!(reply, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_http_error_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate(None, "x").await.unwrap_err();
        match err {
            ConsultError::Llm(msg) => {
                assert!(msg.contains("429"), "{msg}");
                assert!(msg.contains("RESOURCE_EXHAUSTED: quota exceeded"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let result = client(&server).generate(None, "x").await;
        assert!(matches!(result, Err(ConsultError::Llm(_))));
    }

    #[test]
    fn test_from_config_requires_key_variable() {
        let config = LlmConfig {
            api_key_env: "CONSULT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(ConsultError::Config(_))
        ));
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = GeminiClient::new("k", MODEL, Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://localhost:9000/models/");
        assert_eq!(client.base_url, "http://localhost:9000/models");
        assert_eq!(client.model(), MODEL);
    }
}
