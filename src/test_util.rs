use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::providers::{ChatRequest, MessageRole, Provider, ProviderFuture};

const PO_HEADER: &str = r#"msgid ""
msgstr ""
"Project-Id-Version: test\n"
"POT-Creation-Date: 2024-01-01 00:00+0000\n"
"PO-Revision-Date: 2024-01-01 00:00+0000\n"
"Language-Team: French\n"
"Language: fr\n"
"MIME-Version: 1.0\n"
"Content-Type: text/plain; charset=UTF-8\n"
"Content-Transfer-Encoding: 8bit\n"
"Plural-Forms: nplurals=2; plural=(n > 1);\n"
"#;

/// Writes a catalog made of a standard header followed by `body`.
pub(crate) fn write_po(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{}{}", PO_HEADER, body)).expect("write po");
    path
}

type Responder = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Provider double that records every request and answers from a closure
/// given the source text, or never answers at all.
#[derive(Clone)]
pub(crate) struct ScriptedProvider {
    responder: Option<Responder>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    pub(crate) fn reply<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            requests: Arc::default(),
        }
    }

    pub(crate) fn stalled() -> Self {
        Self {
            responder: None,
            requests: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Provider for ScriptedProvider {
    fn complete(&self, request: ChatRequest) -> ProviderFuture {
        let source = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| {
                message
                    .content
                    .split_once('\n')
                    .map(|(_, text)| text.to_string())
                    .unwrap_or_else(|| message.content.clone())
            })
            .unwrap_or_default();
        self.requests.lock().expect("requests lock").push(request);

        match &self.responder {
            Some(responder) => {
                let result = responder(&source);
                Box::pin(async move { result })
            }
            None => Box::pin(std::future::pending::<Result<String>>()),
        }
    }
}
