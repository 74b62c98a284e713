use anyhow::{Context, Result};
use tera::{Context as TeraContext, Tera};

use crate::settings::Settings;

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("system_prompt.tera");

#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub game: String,
    pub source_language: String,
    pub target_language: String,
}

impl PromptOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            game: settings.game.clone(),
            source_language: settings.source_language.clone(),
            target_language: settings.target_language.clone(),
        }
    }
}

pub fn render_system_prompt(options: &PromptOptions) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("game", options.game.as_str());
    context.insert("source_language", options.source_language.as_str());
    context.insert("target_language", options.target_language.as_str());

    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .map(|prompt| prompt.trim().to_string())
        .with_context(|| "failed to render system prompt")
}

pub fn user_prompt(target_language: &str, text: &str) -> String {
    format!("Translate this text to {}:\n{}", target_language, text)
}
