use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::Settings;

/// Where a batch run writes its checkpoints and its final catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub checkpoint: PathBuf,
    pub output: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: impl AsRef<Path>, output_file: &str, temp_file: &str) -> Self {
        let dir = normalize_path(dir.as_ref());
        Self {
            checkpoint: dir.join(temp_file),
            output: dir.join(output_file),
            dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.output_dir,
            &settings.output_file,
            &settings.temp_file,
        )
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output dir: {}", self.dir.display()))
    }
}

pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let expanded = expand_tilde(&path.to_string_lossy());
    let mut normalized = PathBuf::new();
    for component in Path::new(&expanded).components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn expand_tilde(value: &str) -> String {
    if value == "~" || value.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            let home = home.trim();
            if home.is_empty() {
                return value.to_string();
            }
            if value == "~" {
                return home.to_string();
            }
            return format!("{}{}", home, &value[1..]);
        }
    }
    value.to_string()
}
