use std::fmt;

pub const DISPLAY_LIMIT: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Copied from the translation memory.
    MemoryHit,
    Translated,
    /// The request failed or returned nothing usable; the source was kept.
    Fallback,
}

impl EntryStatus {
    pub fn marker(&self) -> &'static str {
        match self {
            EntryStatus::MemoryHit => "[memory]",
            EntryStatus::Translated => "[ok]",
            EntryStatus::Fallback => "[fallback]",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Cuts `text` to at most `max_chars` characters, adding `...` when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// `position` is 1-based.
pub fn progress_line(
    status: EntryStatus,
    position: usize,
    total: usize,
    source: &str,
    translation: &str,
) -> String {
    format!(
        "{} {}/{} \"{}\" -> \"{}\"",
        status,
        position,
        total,
        truncate_text(source, DISPLAY_LIMIT),
        truncate_text(translation, DISPLAY_LIMIT)
    )
}
