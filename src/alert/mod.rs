// src/alert/mod.rs
//! Alert policy and dispatch. The policy is a pure decision function over a
//! job's health state plus the current time; transports do the I/O and are
//! best-effort by design.

pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

use crate::health::RunRecord;

pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Everything a transport needs to describe the failure.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub job_name: String,
    pub streak: u32,
    pub recent_runs: Vec<RunRecord>,
}

/// Alert iff the failure streak reached the threshold AND we have not
/// already alerted for this job inside the cooldown window. A job that
/// stays broken re-alerts once per cooldown, not once per pass.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    threshold: u32,
    cooldown: ChronoDuration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD, DEFAULT_COOLDOWN_HOURS)
    }
}

impl AlertPolicy {
    pub fn new(threshold: u32, cooldown_hours: i64) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: ChronoDuration::hours(cooldown_hours.max(0)),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Does NOT mutate state; the tracker stamps `last_alerted` when this
    /// returns true.
    pub fn should_alert(
        &self,
        streak: u32,
        last_alerted: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if streak < self.threshold {
            return false;
        }
        match last_alerted {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.cooldown,
        }
    }
}

/// External transport boundary. Implementations may post to a chat webhook,
/// send mail, or do nothing; the pipeline only calls this when the policy
/// says to, and never lets a transport failure reach the pass.
#[async_trait::async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send(&self, subject: &str, body: &str, ctx: &AlertContext) -> Result<()>;
}

/// Subject line in the original monitor's shape.
pub fn alert_subject(ctx: &AlertContext) -> String {
    format!(
        "Scraper alert: {} has failed {} consecutive runs",
        ctx.job_name, ctx.streak
    )
}

/// Plain-text body: what happened plus the last five runs.
pub fn alert_body(ctx: &AlertContext) -> String {
    let mut body = format!(
        "Job {} has failed to return events {} consecutive times.\n\
         This usually means the target site changed and the job needs attention.\n\n\
         Recent runs:\n",
        ctx.job_name, ctx.streak
    );
    for run in ctx.recent_runs.iter().rev().take(5) {
        let status = match (&run.error, run.event_count) {
            (Some(err), _) => format!("ERROR: {err}"),
            (None, 0) => "NO EVENTS".to_string(),
            (None, n) => format!("{n} events"),
        };
        body.push_str(&format!(
            "  {} - {} ({} ms)\n",
            run.at.to_rfc3339(),
            status,
            run.elapsed.as_millis()
        ));
    }
    body
}

/// Fan-out over the configured transports. Transport errors are logged and
/// swallowed; one broken webhook must not silence the others.
#[derive(Default)]
pub struct DispatchMux {
    transports: Vec<Arc<dyn AlertDispatcher>>,
}

impl DispatchMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from environment: Slack when `SLACK_WEBHOOK_URL` is set, email
    /// when the `SMTP_*` variables are.
    pub fn from_env() -> Self {
        let mut mux = Self::new();
        if std::env::var("SLACK_WEBHOOK_URL").is_ok() {
            mux.push(Arc::new(slack::SlackDispatcher::from_env()));
        }
        if std::env::var("SMTP_HOST").is_ok() {
            match email::EmailDispatcher::from_env() {
                Ok(d) => {
                    mux.push(Arc::new(d));
                }
                Err(e) => tracing::warn!(error = ?e, "email alerts disabled"),
            }
        }
        mux
    }

    pub fn push(&mut self, dispatcher: Arc<dyn AlertDispatcher>) -> &mut Self {
        self.transports.push(dispatcher);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

#[async_trait::async_trait]
impl AlertDispatcher for DispatchMux {
    async fn send(&self, subject: &str, body: &str, ctx: &AlertContext) -> Result<()> {
        for t in &self.transports {
            if let Err(e) = t.send(subject, body, ctx).await {
                tracing::warn!(job = %ctx.job_name, error = ?e, "alert transport failed");
            }
        }
        Ok(())
    }
}

/// No-op transport for tests and library embedding.
#[derive(Debug, Clone, Default)]
pub struct NoopDispatcher;

#[async_trait::async_trait]
impl AlertDispatcher for NoopDispatcher {
    async fn send(&self, _subject: &str, _body: &str, ctx: &AlertContext) -> Result<()> {
        tracing::debug!(job = %ctx.job_name, streak = ctx.streak, "alert (noop transport)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn ctx() -> AlertContext {
        AlertContext {
            job_name: "orpheum".into(),
            streak: 3,
            recent_runs: vec![RunRecord::new(
                Utc::now(),
                0,
                Duration::from_millis(1200),
                Some("timeout after 60s".into()),
            )],
        }
    }

    #[test]
    fn below_threshold_never_alerts() {
        let p = AlertPolicy::default();
        let now = Utc::now();
        assert!(!p.should_alert(2, None, now));
        assert!(!p.should_alert(0, None, now));
    }

    #[test]
    fn first_alert_at_threshold() {
        let p = AlertPolicy::default();
        assert!(p.should_alert(3, None, Utc::now()));
    }

    #[test]
    fn cooldown_suppresses_then_rearms() {
        let p = AlertPolicy::default();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let same_day = t0 + ChronoDuration::hours(6);
        assert!(!p.should_alert(4, Some(t0), same_day));
        let next_day = t0 + ChronoDuration::hours(24);
        assert!(p.should_alert(5, Some(t0), next_day));
    }

    #[serial_test::serial]
    #[test]
    fn from_env_builds_only_configured_transports() {
        use std::env;
        for key in ["SLACK_WEBHOOK_URL", "SMTP_HOST", "SMTP_USER", "SMTP_PASS"] {
            env::remove_var(key);
        }
        assert!(DispatchMux::from_env().is_empty());

        // Slack configured; SMTP host set but credentials incomplete, so the
        // email transport fails construction and is skipped.
        env::set_var("SLACK_WEBHOOK_URL", "https://hooks.example.test/T000/B000");
        env::set_var("SMTP_HOST", "smtp.example.test");
        let mux = DispatchMux::from_env();
        env::remove_var("SLACK_WEBHOOK_URL");
        env::remove_var("SMTP_HOST");
        assert_eq!(mux.transports.len(), 1);
    }

    #[test]
    fn subject_and_body_name_the_job() {
        let c = ctx();
        assert!(alert_subject(&c).contains("orpheum"));
        let body = alert_body(&c);
        assert!(body.contains("3 consecutive times"));
        assert!(body.contains("timeout after 60s"));
    }
}
