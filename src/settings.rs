use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const API_KEY_ENV: &str = "PO_TRANSLATOR_API_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub timeout_ms: u64,
    pub input: PathBuf,
    pub original: PathBuf,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub temp_file: String,
    pub save_interval: usize,
    pub request_delay_ms: u64,
    pub max_history: usize,
    pub game: String,
    pub source_language: String,
    pub target_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "Qwen2.5-14B-Instruct-1M-Q3_K_S.gguf".to_string(),
            api_url: "http://127.0.0.1:1234/v1/chat/completions".to_string(),
            api_key: None,
            temperature: 0.1,
            timeout_ms: 10_000,
            input: PathBuf::from("fr.po"),
            original: PathBuf::from("strings.po"),
            output_dir: PathBuf::from("output"),
            output_file: "strings.po".to_string(),
            temp_file: "temp.po".to_string(),
            save_interval: 10,
            request_delay_ms: 400,
            max_history: 20,
            game: "Oxygen Not Included".to_string(),
            source_language: "English".to_string(),
            target_language: "French".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    llm: Option<LlmSettings>,
    catalog: Option<CatalogSettings>,
    batch: Option<BatchSettings>,
    prompt: Option<PromptSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmSettings {
    model: Option<String>,
    api_url: Option<String>,
    api_key: Option<String>,
    temperature: Option<f64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    input: Option<String>,
    original: Option<String>,
    output_dir: Option<String>,
    output_file: Option<String>,
    temp_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchSettings {
    save_interval: Option<usize>,
    request_delay_ms: Option<u64>,
    max_history: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptSettings {
    game: Option<String>,
    source_language: Option<String>,
    target_language: Option<String>,
}

/// Loads the built-in defaults, then `settings.toml` and
/// `settings.local.toml` from the working directory, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    if settings.api_key.is_none() {
        settings.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.save_interval == 0 {
            return Err(anyhow!("save_interval must be at least 1"));
        }
        if self.max_history == 0 {
            return Err(anyhow!("max_history must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be at least 1"));
        }
        if self.api_url.trim().is_empty() {
            return Err(anyhow!("api_url is empty"));
        }
        if self.output_file == self.temp_file {
            return Err(anyhow!(
                "output_file and temp_file must differ (both '{}')",
                self.output_file
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(llm) = incoming.llm {
            if let Some(model) = non_empty(llm.model) {
                self.model = model;
            }
            if let Some(url) = non_empty(llm.api_url) {
                self.api_url = url;
            }
            if let Some(key) = non_empty(llm.api_key) {
                self.api_key = Some(key);
            }
            if let Some(temperature) = llm.temperature {
                if temperature >= 0.0 {
                    self.temperature = temperature;
                }
            }
            if let Some(timeout) = llm.timeout_ms {
                self.timeout_ms = timeout;
            }
        }
        if let Some(catalog) = incoming.catalog {
            if let Some(input) = non_empty(catalog.input) {
                self.input = PathBuf::from(input);
            }
            if let Some(original) = non_empty(catalog.original) {
                self.original = PathBuf::from(original);
            }
            if let Some(dir) = non_empty(catalog.output_dir) {
                self.output_dir = PathBuf::from(dir);
            }
            if let Some(file) = non_empty(catalog.output_file) {
                self.output_file = file;
            }
            if let Some(file) = non_empty(catalog.temp_file) {
                self.temp_file = file;
            }
        }
        if let Some(batch) = incoming.batch {
            if let Some(interval) = batch.save_interval {
                self.save_interval = interval;
            }
            if let Some(delay) = batch.request_delay_ms {
                self.request_delay_ms = delay;
            }
            if let Some(limit) = batch.max_history {
                self.max_history = limit;
            }
        }
        if let Some(prompt) = incoming.prompt {
            if let Some(game) = non_empty(prompt.game) {
                self.game = game;
            }
            if let Some(lang) = non_empty(prompt.source_language) {
                self.source_language = lang;
            }
            if let Some(lang) = non_empty(prompt.target_language) {
                self.target_language = lang;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
