use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub original_text: String,
    pub translation: String,
}

/// Finished translations from a previous catalog, keyed by message context.
///
/// A message without context is stored under `None` and one with `msgctxt ""`
/// under `Some("")`; lookups never fall back between keys.
#[derive(Debug, Clone, Default)]
pub struct TranslationMemory {
    records: HashMap<Option<String>, MemoryRecord>,
}

impl TranslationMemory {
    pub fn load(path: &Path) -> Result<Self> {
        let catalog = catalog::load_catalog(path)?;
        let mut memory = Self::default();
        for entry in catalog::entries(&catalog) {
            let translation = entry.translation.trim();
            if translation.is_empty() {
                continue;
            }
            memory.insert(
                entry.context,
                MemoryRecord {
                    original_text: entry.msgid,
                    translation: translation.to_string(),
                },
            );
        }
        Ok(memory)
    }

    /// Like [`TranslationMemory::load`], but a missing or broken file only
    /// produces a warning and an empty memory.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(memory) => {
                info!("loaded {} prior translations from {}", memory.len(), path.display());
                memory
            }
            Err(err) => {
                warn!("prior translations unavailable: {:#}", err);
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, context: Option<String>, record: MemoryRecord) {
        self.records.insert(context, record);
    }

    pub fn has(&self, context: Option<&str>) -> bool {
        self.get(context).is_some()
    }

    pub fn get(&self, context: Option<&str>) -> Option<&MemoryRecord> {
        self.records.get(&context.map(str::to_string))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
