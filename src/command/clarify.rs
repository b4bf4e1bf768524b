//! Clarifying questions for references the context cannot resolve

use crate::llm::context::{substitute_references, ContextStore, Reference};

/// Replies with at most this many words count as an answer to a question
const MAX_ANSWER_WORDS: usize = 4;

/// Result of checking a command before it reaches the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clarity {
    /// Ready to plan, references already rewritten
    Clear(String),
    /// A question to put to the user instead
    Ask(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Clarifier;

impl Clarifier {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, text: &str, context: &ContextStore) -> Clarity {
        match context.resolve_references(text) {
            Reference::None => Clarity::Clear(text.to_string()),
            Reference::Resolved { text, referent } => {
                tracing::debug!("resolved reference to {}", referent);
                Clarity::Clear(text)
            }
            Reference::Unresolved => Clarity::Ask(self.question(context)),
        }
    }

    pub fn question(&self, context: &ContextStore) -> String {
        let options = context.known_objects();
        if options.is_empty() {
            "Which object do you mean?".to_string()
        } else {
            format!("Which object do you mean? Options: {}", options.join(", "))
        }
    }

    /// Short replies answer the pending question; anything longer is a new command
    pub fn looks_like_answer(&self, reply: &str) -> bool {
        let words = reply.split_whitespace().count();
        (1..=MAX_ANSWER_WORDS).contains(&words)
    }

    /// The pending command with its references replaced by the answer
    pub fn apply_answer(&self, pending: &str, answer: &str) -> String {
        let answer = answer.trim().trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'));
        substitute_references(pending, &answer.replace('_', " "))
    }
}
