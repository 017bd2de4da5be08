use palaver_core::domain::message::{Message, Role};

use crate::llm::{PromptEntry, PromptRole};

pub const DEFAULT_DIRECTIVE: &str = "You are Palaver, a helpful, knowledgeable and friendly \
assistant. Answer clearly and accurately, and keep answers as short as the question allows. \
When a question is ambiguous, say what you are assuming or ask a brief clarifying question. \
If you do not know something, say so instead of guessing. Use Markdown for lists and code \
when it helps readability. Stay respectful, avoid harmful or unsafe guidance, and never \
claim to have performed actions outside this conversation.";

/// Builds the prompt for one turn: the directive, every stored message in
/// order, then the new user text.
pub fn assemble(history: &[Message], directive: &str, new_user_text: &str) -> Vec<PromptEntry> {
    let mut prompt = Vec::with_capacity(history.len() + 2);
    prompt.push(PromptEntry::new(PromptRole::System, directive));
    prompt.extend(history.iter().map(|message| {
        let role = match message.role {
            Role::User => PromptRole::Human,
            Role::Assistant => PromptRole::Model,
        };
        PromptEntry::new(role, message.content.clone())
    }));
    prompt.push(PromptEntry::new(PromptRole::Human, new_user_text));
    prompt
}
