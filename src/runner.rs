use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::catalog::{self, Catalog, CatalogEntry};
use crate::memory::TranslationMemory;
use crate::paths::OutputPaths;
use crate::progress::{progress_line, truncate_text, EntryStatus, DISPLAY_LIMIT};
use crate::providers::Provider;
use crate::translator::Translator;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// A checkpoint is written after every `save_interval` processed entries.
    pub save_interval: usize,
    /// Pause after each entry that went to the provider.
    pub request_delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// Entries that went through without an error, fallbacks included.
    pub succeeded: usize,
    pub memory_hits: usize,
    pub translated: usize,
    pub fallbacks: usize,
    pub failed: usize,
    pub checkpoints: usize,
    pub output: PathBuf,
}

impl RunSummary {
    fn record(&mut self, status: EntryStatus) {
        self.succeeded += 1;
        match status {
            EntryStatus::MemoryHit => self.memory_hits += 1,
            EntryStatus::Translated => self.translated += 1,
            EntryStatus::Fallback => self.fallbacks += 1,
        }
    }
}

pub struct BatchRunner<P: Provider> {
    translator: Translator<P>,
    memory: TranslationMemory,
    paths: OutputPaths,
    options: BatchOptions,
}

impl<P: Provider> BatchRunner<P> {
    pub fn new(
        translator: Translator<P>,
        memory: TranslationMemory,
        paths: OutputPaths,
        options: BatchOptions,
    ) -> Self {
        Self {
            translator,
            memory,
            paths,
            options,
        }
    }

    pub fn translator(&self) -> &Translator<P> {
        &self.translator
    }

    /// Translates every pending entry of `catalog` in order, checkpointing
    /// along the way, and writes the final catalog once at the end.
    pub async fn run(&mut self, catalog: &mut Catalog) -> Result<RunSummary> {
        let pending = catalog::extract_pending(catalog);
        self.run_entries(catalog, &pending).await
    }

    /// An entry that cannot be stored gets its source text back, counts as
    /// failed and does not stop the loop.
    pub(crate) async fn run_entries(
        &mut self,
        catalog: &mut Catalog,
        pending: &[CatalogEntry],
    ) -> Result<RunSummary> {
        let total = pending.len();
        let mut summary = RunSummary {
            total,
            output: self.paths.output.clone(),
            ..RunSummary::default()
        };

        if total == 0 {
            info!("no entries to translate");
        } else {
            info!("translating {} entries", total);
        }

        let interval = self.options.save_interval.max(1);
        for (offset, entry) in pending.iter().enumerate() {
            let position = offset + 1;
            match self.process_entry(catalog, entry, position, total).await {
                Ok(status) => summary.record(status),
                Err(err) => {
                    error!(
                        "failed to translate \"{}\": {:#}",
                        truncate_text(&entry.msgid, DISPLAY_LIMIT),
                        err
                    );
                    if let Err(err) =
                        catalog::set_translation(catalog, entry, entry.msgid.clone())
                    {
                        error!("failed to restore \"{}\": {:#}", entry.msgid, err);
                    }
                    summary.failed += 1;
                }
            }

            if position % interval == 0 {
                catalog::save_catalog(catalog, &self.paths.checkpoint)?;
                summary.checkpoints += 1;
                info!("checkpoint saved after {} entries", position);
            }
        }

        catalog::save_catalog(catalog, &self.paths.output)?;
        info!("final catalog written to {}", self.paths.output.display());
        info!(
            "{}/{} entries processed successfully ({} from memory, {} translated, {} fallbacks)",
            summary.succeeded, total, summary.memory_hits, summary.translated, summary.fallbacks
        );
        Ok(summary)
    }

    async fn process_entry(
        &mut self,
        catalog: &mut Catalog,
        entry: &CatalogEntry,
        position: usize,
        total: usize,
    ) -> Result<EntryStatus> {
        let source = entry.msgid.as_str();
        let (translation, status) = match self.memory.get(entry.context.as_deref()) {
            Some(record) => (record.translation.clone(), EntryStatus::MemoryHit),
            None => {
                let output = self.translator.translate(source).await;
                if output.trim().is_empty() {
                    warn!("empty translation for \"{}\"", truncate_text(source, DISPLAY_LIMIT));
                    (source.to_string(), EntryStatus::Fallback)
                } else if output == source {
                    // Indistinguishable from a model that returned the text
                    // untouched.
                    (output, EntryStatus::Fallback)
                } else {
                    (output, EntryStatus::Translated)
                }
            }
        };

        let translation = match translation.trim() {
            "" => source.to_string(),
            trimmed => trimmed.to_string(),
        };
        catalog::set_translation(catalog, entry, translation.clone())?;
        info!("{}", progress_line(status, position, total, source, &translation));

        if status != EntryStatus::MemoryHit && !self.options.request_delay.is_zero() {
            sleep(self.options.request_delay).await;
        }
        Ok(status)
    }
}
