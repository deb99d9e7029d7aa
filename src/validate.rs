// src/validate.rs
//! Validation filter: drops records that are structurally present but
//! semantically empty or synthetic, so monitoring and dedup never operate
//! on noise. Rejection is a filtering decision, not an error; every
//! rejection is logged at debug level tagged with the job that produced it.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;

use crate::event::{RawEvent, RecordKind, ValidatedEvent};

/// Why a record was rejected. `Display` gives the short human-readable
/// reason used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoDate,
    PlaceholderTitle,
    VenueNotEvent,
    GenericDescription,
    JunkTitle,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::NoDate => "no date",
            RejectReason::PlaceholderTitle => "placeholder title",
            RejectReason::VenueNotEvent => "venue, not event",
            RejectReason::GenericDescription => "generic description",
            RejectReason::JunkTitle => "junk title",
        };
        f.write_str(s)
    }
}

/// Heuristic rule set. These are fuzzy by nature (scrapers fall back to
/// boilerplate in a hundred creative ways), so they live in a plain value
/// that can be tuned or swapped without touching the orchestrator.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Title prefixes that mark a generic fallback record.
    pub placeholder_prefixes: Vec<String>,
    /// Case-insensitive substrings anywhere in the title.
    pub placeholder_fragments: Vec<String>,
    /// Case-insensitive boilerplate phrases in the description.
    pub boilerplate_phrases: Vec<String>,
    /// Minimum title length; anything shorter is junk.
    pub min_title_len: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            placeholder_prefixes: vec!["Visit ".into(), "Check website".into()],
            placeholder_fragments: vec!["fallback".into()],
            boilerplate_phrases: vec![
                "check their website".into(),
                "visit for more information".into(),
            ],
            min_title_len: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationFilter {
    rules: ValidationRules,
}

impl ValidationFilter {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Apply the rejection rules in order, first match wins. On acceptance
    /// the raw record is promoted to a `ValidatedEvent` with a parsed start.
    pub fn check(&self, raw: &RawEvent) -> Result<ValidatedEvent, RejectReason> {
        let start = raw
            .start_date
            .as_deref()
            .and_then(parse_start_date)
            .ok_or(RejectReason::NoDate)?;

        if self.is_placeholder_title(&raw.title) {
            return Err(RejectReason::PlaceholderTitle);
        }

        if raw.kind == RecordKind::Venue {
            return Err(RejectReason::VenueNotEvent);
        }

        if let Some(desc) = &raw.description {
            let lower = desc.to_lowercase();
            if self
                .rules
                .boilerplate_phrases
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
            {
                return Err(RejectReason::GenericDescription);
            }
        }

        if is_junk_title(&raw.title, self.rules.min_title_len) {
            return Err(RejectReason::JunkTitle);
        }

        Ok(ValidatedEvent {
            title: raw.title.clone(),
            start,
            description: raw.description.clone(),
            venue: raw.venue.clone(),
            source: raw.source.clone(),
            category: raw.category.clone(),
            url: raw.url.clone(),
        })
    }

    /// Convenience wrapper used by the orchestrator: logs the rejection
    /// under the originating job's name and returns `None`.
    pub fn accept(&self, job_name: &str, raw: &RawEvent) -> Option<ValidatedEvent> {
        match self.check(raw) {
            Ok(ev) => Some(ev),
            Err(reason) => {
                tracing::debug!(
                    job = job_name,
                    title = %raw.title,
                    reason = %reason,
                    "rejected record"
                );
                None
            }
        }
    }

    fn is_placeholder_title(&self, title: &str) -> bool {
        if self
            .rules
            .placeholder_prefixes
            .iter()
            .any(|p| title.starts_with(p.as_str()))
        {
            return true;
        }
        let lower = title.to_lowercase();
        self.rules
            .placeholder_fragments
            .iter()
            .any(|f| lower.contains(&f.to_lowercase()))
    }
}

/// Parse a scraper-supplied date string, keeping whatever offset it carried.
/// Scrapers emit a mix of RFC 3339, RFC 2822, and bare date formats; bare
/// formats get a zero offset because the source named none.
pub fn parse_start_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_local_timezone(utc).single();
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0)?.and_local_timezone(utc).single();
    }
    None
}

/// Titles that are IDs rather than names: ticketing systems leak hex blobs
/// (`110062E8B17F3568`) and long numeric keys into title slots.
fn is_junk_title(title: &str, min_len: usize) -> bool {
    let t = title.trim();
    if t.chars().count() < min_len {
        return true;
    }
    static RE_HEX_ID: OnceCell<Regex> = OnceCell::new();
    let re_hex = RE_HEX_ID.get_or_init(|| Regex::new(r"^[0-9A-Fa-f]{12,}$").unwrap());
    static RE_NUM_ID: OnceCell<Regex> = OnceCell::new();
    let re_num = RE_NUM_ID.get_or_init(|| Regex::new(r"^\d{8,}$").unwrap());
    re_hex.is_match(t) || re_num.is_match(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, date: Option<&str>) -> RawEvent {
        let mut ev = RawEvent::new(title, "test-source");
        ev.start_date = date.map(str::to_string);
        ev
    }

    #[test]
    fn missing_date_rejected_first() {
        let f = ValidationFilter::default();
        // Placeholder title too, but the date rule fires first.
        let ev = raw("Visit our website", None);
        assert_eq!(f.check(&ev).unwrap_err(), RejectReason::NoDate);
    }

    #[test]
    fn unparseable_date_rejected() {
        let f = ValidationFilter::default();
        let ev = raw("Jazz Night", Some("sometime next week"));
        assert_eq!(f.check(&ev).unwrap_err(), RejectReason::NoDate);
    }

    #[test]
    fn placeholder_titles_rejected() {
        let f = ValidationFilter::default();
        for title in ["Visit the Orpheum", "Check website for details", "Fallback Event"] {
            let ev = raw(title, Some("2026-09-01"));
            assert_eq!(f.check(&ev).unwrap_err(), RejectReason::PlaceholderTitle);
        }
    }

    #[test]
    fn venue_records_rejected() {
        let f = ValidationFilter::default();
        let mut ev = raw("The Rickshaw Theatre", Some("2026-09-01"));
        ev.kind = RecordKind::Venue;
        assert_eq!(f.check(&ev).unwrap_err(), RejectReason::VenueNotEvent);
    }

    #[test]
    fn boilerplate_description_rejected() {
        let f = ValidationFilter::default();
        let ev = raw("Jazz Night", Some("2026-09-01"))
            .with_description("Please check their website for the lineup.");
        assert_eq!(f.check(&ev).unwrap_err(), RejectReason::GenericDescription);
    }

    #[test]
    fn id_titles_rejected() {
        let f = ValidationFilter::default();
        for title in ["110062E8B17F3568", "123456789", "ab"] {
            let ev = raw(title, Some("2026-09-01"));
            assert_eq!(f.check(&ev).unwrap_err(), RejectReason::JunkTitle);
        }
    }

    #[test]
    fn well_formed_record_accepted() {
        let f = ValidationFilter::default();
        let ev = raw("Jazz Night", Some("2026-09-01T20:00:00-07:00"))
            .with_description("Late-night trio set.");
        let out = f.check(&ev).unwrap();
        assert_eq!(out.title, "Jazz Night");
        assert_eq!(out.start.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn date_formats_parse() {
        assert!(parse_start_date("2026-09-01T20:00:00Z").is_some());
        assert!(parse_start_date("Tue, 01 Sep 2026 20:00:00 +0000").is_some());
        assert!(parse_start_date("2026-09-01 20:00:00").is_some());
        assert!(parse_start_date("2026-09-01").is_some());
        assert!(parse_start_date("").is_none());
        assert!(parse_start_date("TBA").is_none());
    }
}
