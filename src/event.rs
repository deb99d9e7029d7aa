// src/event.rs
use chrono::{DateTime, FixedOffset};

/// What a record claims to describe. Some scrapers emit a page's venue
/// profile alongside its listings; those must never enter the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Event,
    Venue,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Venue {
    pub name: String,
    pub address: Option<String>,
}

/// One record as emitted by a scraper job, before any validation.
/// `start_date` is the raw string the site provided; parsing happens in the
/// validation filter. A record with no title is the job's own bug and is
/// expected to be dropped before it gets here.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawEvent {
    pub title: String,
    pub start_date: Option<String>,
    pub description: Option<String>,
    pub venue: Option<Venue>,
    pub source: String,
    pub category: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub kind: RecordKind,
}

impl RawEvent {
    /// Minimal constructor for the common case; optional fields start empty.
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            start_date: None,
            description: None,
            venue: None,
            source: source.into(),
            category: None,
            url: None,
            kind: RecordKind::Event,
        }
    }

    pub fn with_start(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A record that passed the validation filter. The start timestamp parsed to
/// a real calendar date; the offset is kept exactly as the job supplied it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidatedEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub description: Option<String>,
    pub venue: Option<Venue>,
    pub source: String,
    pub category: Option<String>,
    pub url: Option<String>,
}

/// The deduplicated representation handed to the caller after a pass.
/// For any composite key (normalized title + calendar day), the first
/// validated event wins; later duplicates are dropped without field merging.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanonicalEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub description: Option<String>,
    pub venue: Option<Venue>,
    pub source: String,
    pub category: Option<String>,
    pub url: Option<String>,
}

impl From<ValidatedEvent> for CanonicalEvent {
    fn from(ev: ValidatedEvent) -> Self {
        Self {
            title: ev.title,
            start: ev.start,
            description: ev.description,
            venue: ev.venue,
            source: ev.source,
            category: ev.category,
            url: ev.url,
        }
    }
}
