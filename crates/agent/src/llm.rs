use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptRole {
    /// Instruction to the model; never persisted or shown to the user.
    System,
    Human,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptEntry {
    pub role: PromptRole,
    pub content: String,
}

impl PromptEntry {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("provider response contained no text")]
    EmptyResponse,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(&self, prompt: &[PromptEntry]) -> Result<String, GatewayError>;
}

/// Gateway with a canned outcome. Records every prompt it receives.
pub struct ScriptedGateway {
    reply: Result<String, String>,
    delay: Duration,
    calls: Mutex<Vec<Vec<PromptEntry>>>,
}

impl ScriptedGateway {
    pub fn replying(text: impl Into<String>) -> Self {
        Self { reply: Ok(text.into()), delay: Duration::ZERO, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { reply: Err(message.into()), delay: Duration::ZERO, calls: Mutex::new(Vec::new()) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<PromptEntry>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn generate(&self, prompt: &[PromptEntry]) -> Result<String, GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.to_vec());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(GatewayError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayError, LlmGateway, PromptEntry, PromptRole, ScriptedGateway};

    #[tokio::test]
    async fn scripted_gateway_records_prompts() {
        let gateway = ScriptedGateway::replying("pong");
        let prompt = vec![PromptEntry::new(PromptRole::Human, "ping")];

        let reply = gateway.generate(&prompt).await.expect("reply");

        assert_eq!(reply, "pong");
        assert_eq!(gateway.calls(), vec![prompt]);
    }

    #[tokio::test]
    async fn failing_gateway_reports_transport_error() {
        let gateway = ScriptedGateway::failing("connection reset");

        let outcome = gateway.generate(&[]).await;

        assert!(matches!(outcome, Err(GatewayError::Transport(msg)) if msg == "connection reset"));
        assert_eq!(gateway.call_count(), 1);
    }
}
