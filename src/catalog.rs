//! Gettext catalog access.
//!
//! Parsing and writing go through `polib`; this module adds the batch view on
//! top of it: entries grouped by context in first-appearance order, the
//! pending-entry filter, and in-place translation updates.
//!
//! `polib` needs a complete header and folds `msgctxt ""` into "no context".
//! Missing header fields are filled in before parsing, and explicit empty
//! contexts are tracked next to the parsed messages and written back on save.

use anyhow::{anyhow, Context, Result};
use polib::catalog::Catalog as PoCatalog;
use polib::message::{MessageMutView, MessageView};
use polib::po_file;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::panic;
use std::path::Path;
use tracing::{debug, warn};

/// Header fields `polib` refuses to parse without, and the value used when a
/// catalog leaves one out.
const REQUIRED_HEADER_FIELDS: [(&str, &str); 9] = [
    ("Project-Id-Version", ""),
    ("POT-Creation-Date", ""),
    ("PO-Revision-Date", ""),
    ("Language-Team", ""),
    ("MIME-Version", "1.0"),
    ("Content-Type", "text/plain; charset=UTF-8"),
    ("Content-Transfer-Encoding", "8bit"),
    ("Language", ""),
    ("Plural-Forms", "nplurals=2; plural=(n != 1);"),
];

/// A parsed catalog. Message `i` carries `msgctxt ""` when `i` is in
/// `empty_contexts`.
pub struct Catalog {
    messages: PoCatalog,
    empty_contexts: HashSet<usize>,
}

/// One message of a catalog as seen by the batch runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Position of the message in file order.
    pub index: usize,
    /// `Some("")` for an explicit `msgctxt ""`, `None` without a `msgctxt`.
    pub context: Option<String>,
    pub msgid: String,
    pub msgid_plural: Option<String>,
    /// All `msgstr` forms joined together, untrimmed.
    pub translation: String,
}

impl CatalogEntry {
    fn from_message(index: usize, message: &dyn MessageView, empty_context: bool) -> Self {
        let msgid_plural = message.msgid_plural().ok().map(str::to_string);
        let translation = if msgid_plural.is_some() {
            message
                .msgstr_plural()
                .map(|forms| forms.join(""))
                .unwrap_or_default()
        } else {
            message.msgstr().map(str::to_string).unwrap_or_default()
        };
        let context = match message.msgctxt() {
            "" if empty_context => Some(String::new()),
            "" => None,
            value => Some(value.to_string()),
        };
        Self {
            index,
            context,
            msgid: message.msgid().to_string(),
            msgid_plural,
            translation,
        }
    }

    pub fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }

    /// An entry needs translation when it has none yet or still carries the
    /// source text verbatim.
    pub fn is_pending(&self) -> bool {
        if self.msgid.is_empty() {
            return false;
        }
        let current = self.translation.trim();
        current.is_empty() || current == self.msgid
    }
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(anyhow!("catalog not found: {}", path.display()));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;

    let completed = complete_header(&text);
    let source = completed.as_deref().unwrap_or(&text);
    let messages = match &completed {
        Some(completed) => {
            debug!("filling in missing header fields of {}", path.display());
            let mut staging = tempfile::Builder::new()
                .suffix(".po")
                .tempfile()
                .context("failed to create a staging catalog")?;
            staging
                .write_all(completed.as_bytes())
                .and_then(|_| staging.flush())
                .context("failed to write a staging catalog")?;
            parse_po(staging.path())
        }
        None => parse_po(path),
    }
    .with_context(|| format!("failed to parse catalog: {}", path.display()))?;

    let flags = explicit_empty_contexts(source);
    let empty_contexts = if flags.len() == messages.count() {
        flags
            .into_iter()
            .enumerate()
            .filter_map(|(index, empty)| empty.then_some(index))
            .collect()
    } else {
        if flags.contains(&true) {
            warn!(
                "duplicate messages in {}; empty contexts are read as absent",
                path.display()
            );
        }
        HashSet::new()
    };

    Ok(Catalog {
        messages,
        empty_contexts,
    })
}

/// `polib` panics on some malformed lines instead of returning an error.
fn parse_po(path: &Path) -> Result<PoCatalog> {
    match panic::catch_unwind(|| po_file::parse(path)) {
        Ok(parsed) => parsed.map_err(|err| anyhow!("{err}")),
        Err(_) => Err(anyhow!("malformed catalog")),
    }
}

/// Returns the catalog text with every missing required header field added,
/// or `None` when the header is already complete. A catalog without a header
/// gets a fresh one.
fn complete_header(text: &str) -> Option<String> {
    let lines = text.lines().collect::<Vec<_>>();
    let header = lines
        .iter()
        .position(|line| line.starts_with('m'))
        .filter(|&start| {
            lines[start].trim_end() == r#"msgid """#
                && lines
                    .get(start + 1)
                    .is_some_and(|line| line.starts_with("msgstr "))
        });

    let Some(start) = header else {
        let mut completed = String::from("msgid \"\"\nmsgstr \"\"\n");
        for (key, value) in REQUIRED_HEADER_FIELDS {
            completed.push_str(&header_line(key, value));
        }
        completed.push('\n');
        completed.push_str(text);
        return Some(completed);
    };

    let end = start
        + 2
        + lines[start + 2..]
            .iter()
            .take_while(|line| line.starts_with('"'))
            .count();
    let content = lines[start + 1..end]
        .iter()
        .map(|line| quoted(line))
        .collect::<String>();
    let present = content
        .split("\\n")
        .filter_map(|field| field.split_once(':'))
        .map(|(key, _)| key)
        .collect::<HashSet<_>>();
    let missing = REQUIRED_HEADER_FIELDS
        .iter()
        .filter(|(key, _)| !present.contains(key))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return None;
    }

    let mut completed = String::with_capacity(text.len() + missing.len() * 32);
    for line in &lines[..end] {
        completed.push_str(line);
        completed.push('\n');
    }
    if !content.is_empty() && !content.ends_with("\\n") {
        completed.push_str("\"\\n\"\n");
    }
    for (key, value) in missing {
        completed.push_str(&header_line(key, value));
    }
    for line in &lines[end..] {
        completed.push_str(line);
        completed.push('\n');
    }
    Some(completed)
}

fn header_line(key: &str, value: &str) -> String {
    format!("\"{key}: {value}\\n\"\n")
}

fn quoted(line: &str) -> &str {
    let value = line.strip_prefix("msgstr ").unwrap_or(line).trim();
    value
        .strip_prefix('"')
        .and_then(|value| value.strip_suffix('"'))
        .unwrap_or(value)
}

/// Splits the text into messages the way `polib` does and reports, for each
/// message after the header, whether it carries `msgctxt ""`.
fn explicit_empty_contexts(text: &str) -> Vec<bool> {
    let mut flags = Vec::new();
    let mut dirty = false;
    let mut in_context = false;
    // Some(has_content) once a msgctxt line was seen.
    let mut context: Option<bool> = None;

    for line in text.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if dirty {
                flags.push(context == Some(false));
            }
            dirty = false;
            in_context = false;
            context = None;
        } else if line.starts_with('#') {
            if ["#. ", "#: ", "#, "]
                .iter()
                .any(|prefix| line.starts_with(prefix))
            {
                in_context = false;
                dirty = true;
            }
        } else if let Some(value) = line.strip_prefix("msgctxt ") {
            in_context = true;
            context = Some(value.trim().len() > 2);
            dirty = true;
        } else if line.starts_with("msgid") || line.starts_with("msgstr") {
            in_context = false;
            dirty = true;
        } else if line.starts_with('"') {
            if in_context && line.trim_end().len() > 2 {
                context = Some(true);
            }
            dirty = true;
        }
    }

    flags.into_iter().skip(1).collect()
}

/// Puts `msgctxt ""` back in front of the flagged messages of a catalog
/// written by `polib`, which separates the header and every message with a
/// blank line.
fn restore_empty_contexts(text: &str, flagged: &HashSet<usize>) -> String {
    let mut restored = String::with_capacity(text.len() + flagged.len() * 12);
    let mut blocks = 0usize;
    let mut in_block = false;

    for line in text.lines() {
        if line.is_empty() {
            in_block = false;
        } else if !in_block {
            in_block = true;
            blocks += 1;
        }
        let message = blocks.checked_sub(2);
        if in_block
            && line.starts_with("msgid ")
            && message.is_some_and(|index| flagged.contains(&index))
        {
            restored.push_str("msgctxt \"\"\n");
        }
        restored.push_str(line);
        restored.push('\n');
    }
    restored
}

/// Writes the whole catalog next to `path` first and renames it into place,
/// so a reader never observes a half-written file.
pub fn save_catalog(catalog: &Catalog, path: &Path) -> Result<()> {
    let staging = path.with_extension("po.partial");
    po_file::write(&catalog.messages, &staging)
        .with_context(|| format!("failed to write catalog: {}", staging.display()))?;
    if !catalog.empty_contexts.is_empty() {
        let written = fs::read_to_string(&staging)
            .with_context(|| format!("failed to read back catalog: {}", staging.display()))?;
        fs::write(
            &staging,
            restore_empty_contexts(&written, &catalog.empty_contexts),
        )
        .with_context(|| format!("failed to write catalog: {}", staging.display()))?;
    }
    fs::rename(&staging, path).with_context(|| {
        format!(
            "failed to move catalog from {} to {}",
            staging.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Every message with a non-empty id, contexts in first-appearance order and
/// messages in file order within each context.
pub fn entries(catalog: &Catalog) -> Vec<CatalogEntry> {
    let mut groups: Vec<Vec<CatalogEntry>> = Vec::new();
    let mut group_by_context: HashMap<Option<String>, usize> = HashMap::new();

    for (index, message) in catalog.messages.messages().enumerate() {
        let entry =
            CatalogEntry::from_message(index, message, catalog.empty_contexts.contains(&index));
        if entry.msgid.is_empty() {
            continue;
        }
        let slot = *group_by_context
            .entry(entry.context.clone())
            .or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
        groups[slot].push(entry);
    }

    groups.into_iter().flatten().collect()
}

pub fn extract_pending(catalog: &Catalog) -> Vec<CatalogEntry> {
    entries(catalog)
        .into_iter()
        .filter(CatalogEntry::is_pending)
        .collect()
}

/// Stores `text` as the translation of `entry`, in every plural form when the
/// entry has them. The message is looked up by context, id and plural id.
pub fn set_translation(catalog: &mut Catalog, entry: &CatalogEntry, text: String) -> Result<()> {
    let forms = catalog.messages.metadata.plural_rules.nplurals;
    let context = entry.context.as_deref().filter(|value| !value.is_empty());
    let mut message = catalog
        .messages
        .find_message_mut(context, &entry.msgid, entry.msgid_plural.as_deref())
        .ok_or_else(|| anyhow!("message '{}' is missing from the catalog", entry.msgid))?;

    if !entry.is_plural() {
        return message
            .set_msgstr(text)
            .map_err(|_| anyhow!("'{}' is a plural message", entry.msgid));
    }
    let msgstr = message
        .msgstr_plural_mut()
        .map_err(|_| anyhow!("'{}' is not a plural message", entry.msgid))?;
    let count = msgstr.len().max(forms).max(1);
    msgstr.clear();
    msgstr.resize(count, text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::write_po;
    use tempfile::tempdir;

    const BODY: &str = r#"
msgctxt "STRINGS.BUILDINGS.BED.NAME"
msgid "Cot"
msgstr ""

msgctxt "STRINGS.UI.OK"
msgid "OK"
msgstr "OK"

msgctxt "STRINGS.BUILDINGS.BED.DESC"
msgid "A bed."
msgstr "Un lit."

msgid "Untagged"
msgstr "  "

msgctxt "STRINGS.BUILDINGS.BED.NAME"
msgid "Bed"
msgstr ""

msgid "Critter"
msgid_plural "Critters"
msgstr[0] ""
msgstr[1] ""
"#;

    #[test]
    fn pending_entries_follow_context_order() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "in.po", BODY);
        let catalog = load_catalog(&path).expect("load");

        let pending = extract_pending(&catalog);
        let ids = pending
            .iter()
            .map(|entry| entry.msgid.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["Cot", "Bed", "OK", "Untagged", "Critter"]);
        assert_eq!(pending[3].context, None);
        assert!(pending[4].is_plural());
        assert!(pending.iter().all(|entry| entry.msgid != "A bed."));
    }

    #[test]
    fn plural_entries_are_translated_in_every_form() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "in.po", BODY);
        let mut catalog = load_catalog(&path).expect("load");

        let critter = extract_pending(&catalog)
            .into_iter()
            .find(|entry| entry.msgid == "Critter")
            .expect("critter");
        set_translation(&mut catalog, &critter, "Bestiole".to_string()).expect("set");

        let copy = dir.path().join("copy.po");
        save_catalog(&catalog, &copy).expect("save");
        let written = fs::read_to_string(&copy).expect("read");
        assert!(written.contains("msgstr[0] \"Bestiole\""));
        assert!(written.contains("msgstr[1] \"Bestiole\""));

        let reparsed = load_catalog(&copy).expect("reload");
        assert!(extract_pending(&reparsed)
            .iter()
            .all(|entry| entry.msgid != "Critter"));
    }

    #[test]
    fn round_trip_keeps_contexts_ids_and_translations() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "in.po", BODY);
        let catalog = load_catalog(&path).expect("load");

        let copy = dir.path().join("copy.po");
        save_catalog(&catalog, &copy).expect("save");
        let reparsed = load_catalog(&copy).expect("reload");

        let before = entries(&catalog)
            .into_iter()
            .map(|entry| (entry.context, entry.msgid, entry.translation))
            .collect::<Vec<_>>();
        let after = entries(&reparsed)
            .into_iter()
            .map(|entry| (entry.context, entry.msgid, entry.translation))
            .collect::<Vec<_>>();
        assert_eq!(before, after);
        assert!(!dir.path().join("copy.po.partial").exists());
    }

    #[test]
    fn set_translation_updates_only_the_target() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "in.po", BODY);
        let mut catalog = load_catalog(&path).expect("load");

        let pending = extract_pending(&catalog);
        set_translation(&mut catalog, &pending[0], "Lit de camp".to_string()).expect("set");

        let all = entries(&catalog);
        let cot = all.iter().find(|entry| entry.msgid == "Cot").expect("cot");
        let bed = all.iter().find(|entry| entry.msgid == "Bed").expect("bed");
        assert_eq!(cot.translation, "Lit de camp");
        assert_eq!(bed.translation, "");
        assert_eq!(extract_pending(&catalog).len(), 4);
    }

    #[test]
    fn set_translation_finds_messages_by_key() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "in.po", BODY);
        let mut catalog = load_catalog(&path).expect("load");

        let mut bed = extract_pending(&catalog)[1].clone();
        bed.index = 999;
        set_translation(&mut catalog, &bed, "Lit".to_string()).expect("set");
        let all = entries(&catalog);
        assert_eq!(
            all.iter().find(|entry| entry.msgid == "Bed").expect("bed").translation,
            "Lit"
        );

        let mut stranger = bed.clone();
        stranger.context = Some("STRINGS.UI.OK".to_string());
        let err = set_translation(&mut catalog, &stranger, "Lit".to_string())
            .err()
            .expect("unknown key");
        assert!(err.to_string().contains("missing from the catalog"));
    }

    #[test]
    fn empty_context_is_kept_apart_from_no_context() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(
            dir.path(),
            "in.po",
            r#"
msgid "Plain"
msgstr ""

msgctxt ""
msgid "Blank"
msgstr ""

msgctxt ""
"STRINGS.SPLIT"
msgid "Split"
msgstr ""
"#,
        );
        let mut catalog = load_catalog(&path).expect("load");

        let contexts = extract_pending(&catalog)
            .into_iter()
            .map(|entry| (entry.msgid, entry.context))
            .collect::<Vec<_>>();
        assert_eq!(
            contexts,
            vec![
                ("Plain".to_string(), None),
                ("Blank".to_string(), Some(String::new())),
                ("Split".to_string(), Some("STRINGS.SPLIT".to_string())),
            ]
        );

        let blank = extract_pending(&catalog)[1].clone();
        set_translation(&mut catalog, &blank, "Vide".to_string()).expect("set");
        let copy = dir.path().join("copy.po");
        save_catalog(&catalog, &copy).expect("save");
        let written = fs::read_to_string(&copy).expect("read");
        assert!(written.contains("msgctxt \"\"\nmsgid \"Blank\"\nmsgstr \"Vide\""));
        assert!(!written.contains("msgctxt \"\"\nmsgid \"Plain\""));

        let reparsed = entries(&load_catalog(&copy).expect("reload"));
        assert_eq!(reparsed[1].context, Some(String::new()));
        assert_eq!(reparsed[0].context, None);
    }

    #[test]
    fn incomplete_header_is_filled_in() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("minimal.po");
        fs::write(
            &path,
            "msgid \"\"\nmsgstr \"Content-Type: text/plain; charset=UTF-8\"\n\nmsgid \"Cot\"\nmsgstr \"Lit\"\n",
        )
        .expect("write");

        let catalog = load_catalog(&path).expect("load");
        let all = entries(&catalog);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].translation, "Lit");
        assert_eq!(
            catalog.messages.metadata.content_type,
            "text/plain; charset=UTF-8"
        );
    }

    #[test]
    fn catalog_without_header_still_loads() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bare.po");
        fs::write(&path, "msgctxt \"CTX\"\nmsgid \"Cot\"\nmsgstr \"\"\n").expect("write");

        let pending = extract_pending(&load_catalog(&path).expect("load"));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].context.as_deref(), Some("CTX"));
    }

    #[test]
    fn malformed_lines_are_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = write_po(dir.path(), "bad.po", "\nmsgid x\nmsgstr \"\"\n");
        let err = load_catalog(&path).err().expect("malformed");
        assert!(format!("{:#}", err).contains("failed to parse catalog"));
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = load_catalog(&dir.path().join("absent.po"))
            .err()
            .expect("missing catalog");
        assert!(err.to_string().contains("catalog not found"));
    }
}
