//! Chat turn engine.
//!
//! A turn runs the user's message through a fixed pipeline:
//! 1. **Ownership** - the conversation must belong to the caller
//! 2. **Budget** (`guardrails`) - admit only if the projected spend fits the ceiling
//! 3. **History** (`history`) - rebuild the prompt from stored messages
//! 4. **Generation** (`llm`, `gemini`) - one call to the model
//! 5. **Persistence** - both messages and the token charge commit together
//!
//! A rejected or failed turn leaves no trace in storage. See
//! [`runtime::ChatRuntime`] for the entry point.

pub mod gemini;
pub mod guardrails;
pub mod history;
pub mod llm;
pub mod runtime;

pub use gemini::GeminiGateway;
pub use guardrails::{BudgetDecision, BudgetGuard};
pub use llm::{GatewayError, LlmGateway, PromptEntry, PromptRole, ScriptedGateway};
pub use runtime::{ChatRuntime, TurnError, TurnOutcome, TurnRequest};
