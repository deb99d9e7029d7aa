// src/pipeline.rs
//! Orchestrator: drives one aggregation pass across the registered jobs,
//! wiring validation, dedup, health tracking and alerting together. A pass
//! always completes; a job that errors, stalls, or returns nothing is
//! recorded and the pass moves on.

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::alert::{alert_body, alert_subject, AlertDispatcher, AlertPolicy, NoopDispatcher};
use crate::config::PipelineConfig;
use crate::dedupe::DedupEngine;
use crate::event::CanonicalEvent;
use crate::health::{HealthStats, HealthTracker};
use crate::job::{EventJob, JobRegistry};
use crate::validate::ValidationFilter;

/// One-time metrics registration (so series show up on an exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pass_runs_total", "Aggregation passes executed.");
        describe_counter!("pass_jobs_failed_total", "Jobs that errored or timed out.");
        describe_counter!("pass_jobs_zero_total", "Jobs that completed with zero events.");
        describe_counter!("pass_events_raw_total", "Raw records produced by jobs.");
        describe_counter!("pass_events_rejected_total", "Records dropped by validation.");
        describe_counter!("pass_events_dedup_total", "Records dropped as duplicates.");
        describe_counter!("pass_events_unique_total", "Canonical events kept per pass.");
        describe_histogram!("job_run_ms", "Per-job wall-clock run time in milliseconds.");
        describe_gauge!("pass_last_run_ts", "Unix ts when the last pass finished.");
    });
}

/// Per-pass counts for the report consumer. Rendering is external.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PassSummary {
    pub jobs_run: usize,
    pub succeeded: usize,
    pub zero_result: usize,
    pub failed: usize,
    pub raw_events: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub unique_events: usize,
    pub elapsed: Duration,
}

/// Result of one pass: the deduplicated collection plus bookkeeping.
#[derive(Debug)]
pub struct PassOutcome {
    pub events: Vec<CanonicalEvent>,
    pub summary: PassSummary,
    pub health: HealthStats,
}

struct JobOutcome {
    raw_count: usize,
    rejected: usize,
    error: Option<String>,
}

struct Shared {
    config: PipelineConfig,
    filter: ValidationFilter,
    tracker: HealthTracker,
    policy: AlertPolicy,
    dispatcher: Arc<dyn AlertDispatcher>,
}

pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_dispatcher(config, Arc::new(NoopDispatcher))
    }

    pub fn with_dispatcher(config: PipelineConfig, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        Self::with_filter(config, ValidationFilter::default(), dispatcher)
    }

    /// Full constructor for callers that tune the validation rules.
    pub fn with_filter(
        config: PipelineConfig,
        filter: ValidationFilter,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        let tracker = HealthTracker::with_history_len(config.history_len);
        let policy = AlertPolicy::new(config.alert_threshold, config.alert_cooldown_hours);
        Self {
            shared: Arc::new(Shared {
                config,
                filter,
                tracker,
                policy,
                dispatcher,
            }),
        }
    }

    /// Fleet health snapshot; the tracker outlives individual passes.
    pub fn health_stats(&self) -> HealthStats {
        self.shared.tracker.stats()
    }

    /// Run one pass over the registry. Jobs run with bounded concurrency
    /// (`parallelism = 1` gives strict registration order); each job is
    /// bounded by the configured timeout; health bookkeeping and alerting
    /// happen for every job whether it succeeded or not.
    pub async fn run_pass(&self, registry: &JobRegistry) -> PassOutcome {
        ensure_metrics_described();
        let started = Instant::now();
        let engine = Arc::new(DedupEngine::new());

        let outcomes = if self.shared.config.parallelism <= 1 {
            let mut outcomes = Vec::with_capacity(registry.len());
            for job in registry.iter() {
                outcomes.push(run_job(self.shared.clone(), job.clone(), engine.clone()).await);
            }
            outcomes
        } else {
            let semaphore = Arc::new(Semaphore::new(self.shared.config.parallelism));
            let mut set = JoinSet::new();
            for job in registry.iter() {
                let shared = self.shared.clone();
                let job = job.clone();
                let engine = engine.clone();
                let semaphore = semaphore.clone();
                set.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    run_job(shared, job, engine).await
                });
            }
            let mut outcomes = Vec::with_capacity(registry.len());
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => tracing::error!(error = ?e, "job task panicked"),
                }
            }
            outcomes
        };

        let mut summary = PassSummary {
            jobs_run: outcomes.len(),
            elapsed: started.elapsed(),
            ..Default::default()
        };
        for o in &outcomes {
            summary.raw_events += o.raw_count;
            summary.rejected += o.rejected;
            match (&o.error, o.raw_count) {
                (Some(_), _) => summary.failed += 1,
                (None, 0) => summary.zero_result += 1,
                (None, _) => summary.succeeded += 1,
            }
        }
        summary.duplicates = engine.duplicate_count();

        let engine = Arc::try_unwrap(engine).expect("dedup engine still shared after pass");
        let events = engine.finish();
        summary.unique_events = events.len();

        counter!("pass_runs_total").increment(1);
        counter!("pass_jobs_failed_total").increment(summary.failed as u64);
        counter!("pass_jobs_zero_total").increment(summary.zero_result as u64);
        counter!("pass_events_raw_total").increment(summary.raw_events as u64);
        counter!("pass_events_rejected_total").increment(summary.rejected as u64);
        counter!("pass_events_dedup_total").increment(summary.duplicates as u64);
        counter!("pass_events_unique_total").increment(summary.unique_events as u64);
        gauge!("pass_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        tracing::info!(
            jobs = summary.jobs_run,
            succeeded = summary.succeeded,
            zero = summary.zero_result,
            failed = summary.failed,
            unique = summary.unique_events,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pass complete"
        );

        PassOutcome {
            events,
            summary,
            health: self.shared.tracker.stats(),
        }
    }
}

/// Run one job end to end: invoke with timeout, validate, accumulate into
/// the shared dedup engine, record the run, and kick off dispatch when the
/// alert policy fires. Nothing in here aborts the pass: the job itself runs
/// on its own task, so even a panic inside `run` is recorded as a failed
/// run and the pass moves on.
async fn run_job(
    shared: Arc<Shared>,
    job: Arc<dyn EventJob>,
    engine: Arc<DedupEngine>,
) -> JobOutcome {
    let name = job.name().to_string();
    let timeout = shared.config.job_timeout();
    let started = Instant::now();
    let mut handle = tokio::spawn(async move { job.run().await });
    let result = tokio::time::timeout(timeout, &mut handle).await;
    let elapsed = started.elapsed();
    histogram!("job_run_ms").record(elapsed.as_millis() as f64);

    let outcome = match result {
        Err(_) => {
            // Abandon the stalled task; its eventual result is discarded.
            handle.abort();
            let err = format!("timeout after {}s", timeout.as_secs());
            tracing::warn!(job = %name, elapsed_ms = elapsed.as_millis() as u64, "job timed out");
            JobOutcome {
                raw_count: 0,
                rejected: 0,
                error: Some(err),
            }
        }
        Ok(Err(join_err)) => {
            let err = if join_err.is_panic() {
                "job panicked".to_string()
            } else {
                "job cancelled".to_string()
            };
            tracing::warn!(job = %name, error = %err, "job died");
            JobOutcome {
                raw_count: 0,
                rejected: 0,
                error: Some(err),
            }
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(job = %name, error = format!("{e:#}"), "job failed");
            JobOutcome {
                raw_count: 0,
                rejected: 0,
                error: Some(format!("{e:#}")),
            }
        }
        Ok(Ok(Ok(records))) => {
            let raw_count = records.len();
            let mut rejected = 0usize;
            for record in &records {
                match shared.filter.accept(&name, record) {
                    Some(validated) => {
                        engine.insert(validated);
                    }
                    None => rejected += 1,
                }
            }
            if raw_count == 0 {
                tracing::warn!(job = %name, "job returned zero events");
            } else {
                tracing::info!(
                    job = %name,
                    raw = raw_count,
                    validated = raw_count - rejected,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job complete"
                );
            }
            JobOutcome {
                raw_count,
                rejected,
                error: None,
            }
        }
    };

    let streak = shared
        .tracker
        .record_run(&name, outcome.raw_count, elapsed, outcome.error.clone());

    if let Some(ctx) = shared.tracker.alert_due(&name, &shared.policy, Utc::now()) {
        tracing::warn!(job = %name, streak, "alerting on failing job");
        let dispatcher = shared.dispatcher.clone();
        // Dispatch on its own task: a slow or broken transport must never
        // hold up the pass.
        tokio::spawn(async move {
            let subject = alert_subject(&ctx);
            let body = alert_body(&ctx);
            if let Err(e) = dispatcher.send(&subject, &body, &ctx).await {
                tracing::warn!(job = %ctx.job_name, error = ?e, "alert dispatch failed");
            }
        });
    }

    outcome
}
