// src/dedupe.rs
//! Deduplication engine: one canonical event per (normalized title,
//! calendar day) pair across an entire pass, regardless of which job
//! produced it. First write wins; duplicates are dropped without merging,
//! even when the later record carries richer fields. Predictability over
//! cleverness.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::event::{CanonicalEvent, ValidatedEvent};

/// Normalize a title for keying: decode HTML entities, strip stray tags,
/// collapse whitespace, trim, lower-case, and drop trailing sentence
/// punctuation. Two titles differing only by case or a trailing `!` are the
/// same event on the same day.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_lowercase();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    out
}

/// Composite key for one event. The day is taken in the offset the source
/// supplied; two records for the same wall-clock day in different zones key
/// to their own days.
pub fn composite_key(ev: &ValidatedEvent) -> String {
    format!(
        "{}_{}",
        normalize_title(&ev.title),
        ev.start.date_naive().format("%Y-%m-%d")
    )
}

/// Accumulates events for the duration of one pass. Interior mutex so
/// concurrent jobs can insert; each insert is atomic per key. Not a
/// long-lived cache: `finish` consumes the engine and hands the collection
/// to the caller.
#[derive(Debug, Default)]
pub struct DedupEngine {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<String>,
    kept: Vec<CanonicalEvent>,
    duplicates: usize,
}

impl DedupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated event. Returns `true` if it was retained, `false`
    /// if an earlier event already owned its key.
    pub fn insert(&self, ev: ValidatedEvent) -> bool {
        let key = composite_key(&ev);
        let mut inner = self.inner.lock().expect("dedup mutex poisoned");
        if inner.seen.insert(key) {
            inner.kept.push(ev.into());
            true
        } else {
            inner.duplicates += 1;
            false
        }
    }

    pub fn unique_count(&self) -> usize {
        self.inner.lock().expect("dedup mutex poisoned").kept.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.inner.lock().expect("dedup mutex poisoned").duplicates
    }

    /// Hand over the collection in insertion order and discard the mapping.
    pub fn finish(self) -> Vec<CanonicalEvent> {
        self.inner.into_inner().expect("dedup mutex poisoned").kept
    }
}
