// src/health.rs
//! Per-job run history and failure streaks. This is the signal that tells
//! us a scraper silently broke: the site redesigned, the job still "works",
//! and every pass now returns zero events.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::alert::{AlertContext, AlertPolicy};

pub const DEFAULT_HISTORY_LEN: usize = 10;

/// One observation of a job's execution. `success` is derived once at
/// construction: no error AND at least one event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunRecord {
    pub at: DateTime<Utc>,
    pub event_count: usize,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub success: bool,
}

impl RunRecord {
    pub fn new(
        at: DateTime<Utc>,
        event_count: usize,
        elapsed: Duration,
        error: Option<String>,
    ) -> Self {
        let success = error.is_none() && event_count > 0;
        Self {
            at,
            event_count,
            elapsed,
            error,
            success,
        }
    }
}

/// Bounded history plus alert bookkeeping for one job.
#[derive(Debug, Default)]
struct JobHealth {
    runs: VecDeque<RunRecord>,
    last_alerted: Option<DateTime<Utc>>,
}

impl JobHealth {
    /// Consecutive failures, scanning from the most recent run backwards,
    /// stopping at the first success.
    fn streak(&self) -> u32 {
        let mut n = 0;
        for run in self.runs.iter().rev() {
            if run.success {
                break;
            }
            n += 1;
        }
        n
    }
}

/// Process-wide keyed store of job histories. Histories are isolated by job
/// name and only ever mutated through this tracker; the map lock covers one
/// entry's read-modify-write at a time, so one job's crash loop cannot
/// distort another's monitoring.
#[derive(Debug)]
pub struct HealthTracker {
    inner: Mutex<HashMap<String, JobHealth>>,
    history_len: usize,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::with_history_len(DEFAULT_HISTORY_LEN)
    }
}

/// Snapshot entry for reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobStat {
    pub name: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_event_count: usize,
    pub recent_failures: usize,
}

/// Fleet-level summary for the report consumer.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HealthStats {
    pub total_jobs: usize,
    pub total_runs: usize,
    pub failing: Vec<JobStat>,
    pub healthy: Vec<JobStat>,
}

impl HealthTracker {
    pub fn with_history_len(history_len: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            history_len: history_len.max(1),
        }
    }

    /// Append a run for `job_name` (creating its history lazily), evict the
    /// oldest entry if at capacity, and return the updated failure streak.
    pub fn record_run(
        &self,
        job_name: &str,
        event_count: usize,
        elapsed: Duration,
        error: Option<String>,
    ) -> u32 {
        let record = RunRecord::new(Utc::now(), event_count, elapsed, error);
        self.record_run_at(job_name, record)
    }

    /// Same as `record_run` with an explicit record; lets tests drive time.
    pub fn record_run_at(&self, job_name: &str, record: RunRecord) -> u32 {
        let mut map = self.inner.lock().expect("health mutex poisoned");
        let health = map.entry(job_name.to_string()).or_default();

        health.runs.push_back(record);
        while health.runs.len() > self.history_len {
            health.runs.pop_front();
        }
        health.streak()
    }

    /// Apply the alert policy for `job_name` at `now`. When the policy
    /// fires, `last_alerted` is stamped under the same lock and the context
    /// for dispatch is returned. Pure bookkeeping; no I/O happens here.
    pub fn alert_due(
        &self,
        job_name: &str,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Option<AlertContext> {
        let mut map = self.inner.lock().expect("health mutex poisoned");
        let health = map.get_mut(job_name)?;
        let streak = health.streak();
        if !policy.should_alert(streak, health.last_alerted, now) {
            if streak >= policy.threshold() {
                tracing::debug!(job = job_name, streak, "alert suppressed by cooldown");
            }
            return None;
        }
        health.last_alerted = Some(now);
        Some(AlertContext {
            job_name: job_name.to_string(),
            streak,
            recent_runs: health.runs.iter().cloned().collect(),
        })
    }

    /// Recent history for one job, oldest first. `None` if it never ran.
    pub fn history(&self, job_name: &str) -> Option<Vec<RunRecord>> {
        let map = self.inner.lock().expect("health mutex poisoned");
        map.get(job_name).map(|h| h.runs.iter().cloned().collect())
    }

    /// Fleet summary: a job counts as failing when at least 2 of its last 3
    /// runs were unsuccessful.
    pub fn stats(&self) -> HealthStats {
        let map = self.inner.lock().expect("health mutex poisoned");
        let mut stats = HealthStats {
            total_jobs: map.len(),
            ..Default::default()
        };

        for (name, health) in map.iter() {
            stats.total_runs += health.runs.len();
            let recent: Vec<_> = health.runs.iter().rev().take(3).collect();
            let recent_failures = recent.iter().filter(|r| !r.success).count();
            let last = health.runs.back();
            let stat = JobStat {
                name: name.clone(),
                last_run: last.map(|r| r.at),
                last_event_count: last.map(|r| r.event_count).unwrap_or(0),
                recent_failures,
            };
            if recent_failures >= 2 {
                stats.failing.push(stat);
            } else {
                stats.healthy.push(stat);
            }
        }

        stats.failing.sort_by(|a, b| a.name.cmp(&b.name));
        stats.healthy.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}
