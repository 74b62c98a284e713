use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{ChatRequest, Provider, ProviderFuture};

/// No cap on generated tokens, as understood by llama.cpp-style servers.
const UNLIMITED_TOKENS: i64 = -1;

/// Client for an OpenAI-compatible `chat/completions` endpoint, typically a
/// model served locally.
#[derive(Debug, Clone)]
pub struct OpenAI {
    client: reqwest::Client,
    url: String,
    model: String,
    key: Option<String>,
}

impl OpenAI {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            key: None,
        })
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key.filter(|value| !value.trim().is_empty());
        self
    }
}

impl Provider for OpenAI {
    fn complete(&self, request: ChatRequest) -> ProviderFuture {
        let provider = self.clone();
        Box::pin(async move { call_chat_completions(provider, request).await })
    }
}

async fn call_chat_completions(provider: OpenAI, request: ChatRequest) -> Result<String> {
    let body = chat_body(&provider.model, &request);
    debug!(
        "POST {} ({} messages)",
        provider.url,
        request.messages.len()
    );

    let mut builder = provider.client.post(&provider.url).json(&body);
    if let Some(key) = provider.key.as_deref() {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(anyhow!(
            "chat completion failed ({}): {}",
            status,
            extract_error(&text).unwrap_or(text)
        ));
    }
    extract_content(&text)
}

pub(crate) fn chat_body(model: &str, request: &ChatRequest) -> Value {
    json!({
        "model": model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": UNLIMITED_TOKENS
    })
}

fn extract_content(text: &str) -> Result<String> {
    let payload: ChatResponse =
        serde_json::from_str(text).with_context(|| "failed to parse chat completion JSON")?;
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no message content returned: {}", text))
}

/// Pulls a readable message out of an error body; OpenAI-style servers nest
/// it under `error.message`, others send a bare string.
fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<Value>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.error? {
        Value::String(message) if !message.trim().is_empty() => Some(message),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
