//! Google Gemini `generateContent` adapter.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use palaver_core::config::LlmConfig;

use crate::llm::{GatewayError, LlmGateway, PromptEntry, PromptRole};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

pub struct GeminiGateway {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiGateway {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            max_output_tokens,
        }
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
            config.temperature,
            config.max_output_tokens,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, prompt: &[PromptEntry]) -> GenerateRequest {
        let mut system_instruction = None;
        let mut contents = Vec::with_capacity(prompt.len());

        for entry in prompt {
            let role = match entry.role {
                PromptRole::System => {
                    system_instruction = Some(Content {
                        role: None,
                        parts: vec![Part { text: Some(entry.content.clone()) }],
                    });
                    continue;
                }
                PromptRole::Human => "user",
                PromptRole::Model => "model",
            };
            contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![Part { text: Some(entry.content.clone()) }],
            });
        }

        GenerateRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                candidate_count: 1,
            },
        }
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, GatewayError> {
    if let Some(error) = response.error {
        return Err(GatewayError::MalformedResponse(error.message));
    }

    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .map(|error| error.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn generate(&self, prompt: &[PromptEntry]) -> Result<String, GatewayError> {
        let request = self.build_request(prompt);
        debug!(model = %self.model, entries = prompt.len(), "sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = error_message(&body);
            error!(status = %status, message = %message, "gemini request failed");
            return Err(GatewayError::Status { status: status.as_u16(), message });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        extract_text(parsed)
    }
}

impl fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::GeminiGateway;
    use crate::llm::{GatewayError, LlmGateway, PromptEntry, PromptRole};

    const GENERATE_PATH: &str = "/models/gemini-2.5-flash-lite:generateContent";

    fn gateway(server: &MockServer) -> GeminiGateway {
        GeminiGateway::new(
            "test-key".to_string().into(),
            server.uri(),
            "gemini-2.5-flash-lite",
            0.5,
            2048,
        )
    }

    fn prompt() -> Vec<PromptEntry> {
        vec![
            PromptEntry::new(PromptRole::System, "be helpful"),
            PromptEntry::new(PromptRole::Human, "hi"),
            PromptEntry::new(PromptRole::Model, "hello"),
            PromptEntry::new(PromptRole::Human, "how are you?"),
        ]
    }

    #[tokio::test]
    async fn maps_prompt_roles_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "be helpful"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "how are you?"}]}
                ],
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 2048}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Doing well."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = gateway(&server).generate(&prompt()).await.expect("reply");

        assert_eq!(reply, "Doing well.");
    }

    #[tokio::test]
    async fn provider_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let outcome = gateway(&server).generate(&prompt()).await;

        assert!(matches!(
            outcome,
            Err(GatewayError::Status { status: 429, ref message }) if message == "Resource has been exhausted"
        ));
    }

    #[tokio::test]
    async fn response_without_text_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"candidates": [{"finishReason": "SAFETY"}]})),
            )
            .mount(&server)
            .await;

        let outcome = gateway(&server).generate(&prompt()).await;

        assert!(matches!(outcome, Err(GatewayError::EmptyResponse)));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let outcome = gateway(&server).generate(&prompt()).await;

        assert!(matches!(outcome, Err(GatewayError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let unreachable = GeminiGateway::new(
            "test-key".to_string().into(),
            "http://127.0.0.1:9",
            "gemini-2.5-flash-lite",
            0.5,
            2048,
        );

        let outcome = unreachable.generate(&prompt()).await;

        assert!(matches!(outcome, Err(GatewayError::Transport(_))));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let gateway = GeminiGateway::new(
            "super-secret".to_string().into(),
            "https://example.test/v1beta/",
            "m",
            0.5,
            16,
        );

        let debug = format!("{gateway:?}");

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("https://example.test/v1beta\""));
    }
}
