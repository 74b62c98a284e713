use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

mod openai;

pub use openai::OpenAI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

/// Resolves to the text of the single returned choice, untrimmed.
pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

pub trait Provider: Send + Sync {
    fn complete(&self, request: ChatRequest) -> ProviderFuture;
}
