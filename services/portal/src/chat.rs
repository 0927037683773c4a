//! services/portal/src/chat.rs
//!
//! The assistant conversation manager: one instance per open document view,
//! owning a linear, append-only message history seeded with a greeting.
//!
//! Model failures never escape `send_message` — the primary model is retried
//! against the fallback, and if both fail a local assistant message reports
//! the error instead.

use crate::error::PortalError;
use chrono::Utc;
use std::sync::Arc;
use studyhall_core::domain::{ChatRole, ConversationMessage, DocumentRecord};
use studyhall_core::ports::{ChatTurn, GenerativeModel, TurnRole};
use tracing::{error, warn};
use uuid::Uuid;

/// At most this many characters of extracted text go into the context block.
pub const CONTEXT_CHAR_LIMIT: usize = 30_000;

/// Fixed instruction appended to every context block.
const RESPONSE_INSTRUCTION: &str = "You are a helpful AI study assistant. Answer the user's \
questions based primarily on the Document Content provided above.\n\
IMPORTANT: Keep your responses in simple text (as markdown is not supported), super concise \
and to the point (under 3-4 sentences) unless the user explicitly asks for a response of \
certain number of words.";

/// Quick prompts offered by the chat panel.
pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Summarize this page",
    "Explain the core concept",
    "Key takeaways",
    "Generate quiz questions",
];

//=========================================================================================
// Document context
//=========================================================================================

/// The slice of a document record the assistant is allowed to see.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub title: String,
    pub subject: String,
    pub description: String,
    pub extracted_text: Option<String>,
}

impl DocumentContext {
    pub fn from_record(record: &DocumentRecord) -> Self {
        Self {
            title: record.title.clone(),
            subject: record.subject.clone(),
            description: record.description.clone(),
            extracted_text: record.extracted_text.clone(),
        }
    }
}

//=========================================================================================
// Conversation
//=========================================================================================

/// A single open-document conversation.
///
/// `send_message` takes `&mut self`, so a caller cannot have two sends in
/// flight on the same conversation; multiple conversations (one per open
/// document) are independent.
pub struct Conversation {
    model: Arc<dyn GenerativeModel>,
    primary_model: String,
    fallback_model: String,
    document: DocumentContext,
    messages: Vec<ConversationMessage>,
    typing: bool,
}

impl Conversation {
    /// Creates the conversation, seeded with the greeting that names the
    /// open document. The greeting is never sent to the external API.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        primary_model: String,
        fallback_model: String,
        document: DocumentContext,
    ) -> Self {
        let greeting = format!(
            "Hi! I've analyzed \"{}\". How can I help you study today?",
            document.title
        );
        Self {
            model,
            primary_model,
            fallback_model,
            document,
            messages: vec![ConversationMessage {
                id: Uuid::new_v4(),
                role: ChatRole::Assistant,
                text: greeting,
                timestamp: Utc::now(),
            }],
            typing: false,
        }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Sends one user message and appends the assistant's reply.
    ///
    /// Never returns an error: model failures fall back, and a double
    /// failure is reported inside the conversation itself.
    pub async fn send_message(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            role: ChatRole::User,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        self.typing = true;

        // History excludes the seed greeting and the message being sent,
        // which travels separately as the prompt.
        let history = self.outbound_history();
        let context = self.build_context();

        let reply = self.generate_with_fallback(&history, text, &context).await;

        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            role: ChatRole::Assistant,
            text: reply,
            timestamp: Utc::now(),
        });
        self.typing = false;
    }

    /// Primary model first; on any failure the identical request goes to the
    /// fallback model; on a double failure the error is reported as text.
    async fn generate_with_fallback(
        &self,
        history: &[ChatTurn],
        message: &str,
        context: &str,
    ) -> String {
        match self
            .model
            .generate(&self.primary_model, history, message, Some(context))
            .await
        {
            Ok(reply) => reply,
            Err(primary_err) => {
                warn!(
                    model = %self.primary_model,
                    "Primary model failed, utilizing fallback: {}",
                    primary_err
                );
                match self
                    .model
                    .generate(&self.fallback_model, history, message, Some(context))
                    .await
                {
                    Ok(reply) => reply,
                    Err(fallback_err) => {
                        let err = PortalError::Assistant(fallback_err.to_string());
                        error!("All models failed: {}", err);
                        format!(
                            "I'm having trouble connecting to both primary and fallback \
                             services. Error: {}",
                            fallback_err
                        )
                    }
                }
            }
        }
    }

    /// The prior exchange, remapped to the external API's role vocabulary.
    fn outbound_history(&self) -> Vec<ChatTurn> {
        let len = self.messages.len();
        self.messages[..len.saturating_sub(1)]
            .iter()
            .skip(1) // seed greeting
            .map(|m| ChatTurn {
                role: match m.role {
                    ChatRole::User => TurnRole::User,
                    ChatRole::Assistant => TurnRole::Model,
                },
                text: m.text.clone(),
            })
            .collect()
    }

    /// The bounded context block: title, subject, description and at most
    /// the first 30,000 characters of extracted text.
    fn build_context(&self) -> String {
        let body = match &self.document.extracted_text {
            Some(text) => truncate_chars(text, CONTEXT_CHAR_LIMIT),
            None => "No text content extractable. Rely on description.".to_string(),
        };
        format!(
            "Document Title: {}\nSubject: {}\nDescription: {}\n\nDocument Content:\n{}\n\n{}",
            self.document.title, self.document.subject, self.document.description, body,
            RESPONSE_INSTRUCTION
        )
    }
}

/// Truncates to at most `limit` characters on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
