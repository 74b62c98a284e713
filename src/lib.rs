use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod catalog;
pub mod conversation;
pub mod logging;
pub mod memory;
pub mod paths;
pub mod progress;
pub mod providers;
pub mod runner;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translations;
mod translator;

pub use conversation::Conversation;
pub use memory::{MemoryRecord, TranslationMemory};
pub use paths::OutputPaths;
pub use providers::{ChatMessage, ChatRequest, MessageRole, OpenAI, Provider, ProviderFuture};
pub use runner::{BatchOptions, BatchRunner, RunSummary};
pub use settings::Settings;
pub use translator::{Translator, TranslatorOptions};

/// Command-line overrides applied on top of the layered settings files.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
    pub input: Option<String>,
    pub original: Option<String>,
    pub output_dir: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub save_interval: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub max_history: Option<usize>,
}

pub fn resolve_settings(config: &Config) -> Result<Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;

    if let Some(input) = &config.input {
        settings.input = PathBuf::from(input);
    }
    if let Some(original) = &config.original {
        settings.original = PathBuf::from(original);
    }
    if let Some(dir) = &config.output_dir {
        settings.output_dir = PathBuf::from(dir);
    }
    if let Some(url) = &config.api_url {
        settings.api_url = url.clone();
    }
    if let Some(model) = &config.model {
        settings.model = model.clone();
    }
    if let Some(key) = &config.api_key {
        settings.api_key = Some(key.clone());
    }
    if let Some(interval) = config.save_interval {
        settings.save_interval = interval;
    }
    if let Some(delay) = config.request_delay_ms {
        settings.request_delay_ms = delay;
    }
    if let Some(timeout) = config.timeout_ms {
        settings.timeout_ms = timeout;
    }
    if let Some(limit) = config.max_history {
        settings.max_history = limit;
    }

    settings.validate()?;
    Ok(settings)
}

pub async fn run(config: Config) -> Result<RunSummary> {
    let settings = resolve_settings(&config)?;
    run_with_settings(&settings).await
}

/// Runs one batch: prior translations are optional, the input catalog and
/// the output directory are not.
pub async fn run_with_settings(settings: &Settings) -> Result<RunSummary> {
    settings.validate()?;

    let output_paths = OutputPaths::from_settings(settings);
    output_paths.ensure_dir()?;

    let memory = TranslationMemory::load_or_empty(&paths::normalize_path(&settings.original));

    let input = paths::normalize_path(&settings.input);
    let mut catalog = catalog::load_catalog(&input)
        .with_context(|| format!("failed to load input catalog {}", input.display()))?;

    let provider = OpenAI::new(&settings.api_url, &settings.model, settings.timeout())?
        .with_key(settings.api_key.clone());
    let system_prompt =
        translations::render_system_prompt(&translations::PromptOptions::from_settings(settings))?;
    let translator = Translator::new(
        provider,
        Conversation::new(system_prompt, settings.max_history),
        TranslatorOptions {
            target_language: settings.target_language.clone(),
            temperature: settings.temperature,
            timeout: settings.timeout(),
        },
    );

    let mut runner = BatchRunner::new(
        translator,
        memory,
        output_paths,
        BatchOptions {
            save_interval: settings.save_interval,
            request_delay: settings.request_delay(),
        },
    );
    runner.run(&mut catalog).await
}
