use anyhow::Error;
use std::time::Duration;
use tracing::{error, warn};

use crate::conversation::Conversation;
use crate::progress::truncate_text;
use crate::providers::{ChatRequest, Provider};
use crate::translations;

#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub target_language: String,
    pub temperature: f64,
    pub timeout: Duration,
}

/// Sends one entry at a time to the provider, carrying the conversation
/// window between calls.
pub struct Translator<P: Provider> {
    provider: P,
    conversation: Conversation,
    options: TranslatorOptions,
}

impl<P: Provider> Translator<P> {
    pub fn new(provider: P, conversation: Conversation, options: TranslatorOptions) -> Self {
        Self {
            provider,
            conversation,
            options,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the trimmed model output, or `text` unchanged when the request
    /// fails or times out. Only successful exchanges join the conversation.
    pub async fn translate(&mut self, text: &str) -> String {
        let prompt = translations::user_prompt(&self.options.target_language, text);
        let request = ChatRequest {
            messages: self.conversation.request_messages(&prompt),
            temperature: self.options.temperature,
        };

        let timeout = self.options.timeout;
        match tokio::time::timeout(timeout, self.provider.complete(request)).await {
            Ok(Ok(content)) => {
                let content = content.trim().to_string();
                self.conversation.push_exchange(prompt, content.clone());
                content
            }
            Ok(Err(err)) if is_timeout(&err) => {
                log_timeout(timeout, text);
                text.to_string()
            }
            Ok(Err(err)) => {
                error!("translation request failed: {:#}", err);
                text.to_string()
            }
            Err(_) => {
                log_timeout(timeout, text);
                text.to_string()
            }
        }
    }
}

fn is_timeout(err: &Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .is_some_and(reqwest::Error::is_timeout)
}

fn log_timeout(timeout: Duration, text: &str) {
    warn!(
        "request timed out after {:.1}s for \"{}\"",
        timeout.as_secs_f32(),
        truncate_text(text, 50)
    );
}
