// tests/health_alerts.rs
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::time::Duration;

use event_harvester::{AlertPolicy, HealthTracker, RunRecord};

fn failed_run(at: chrono::DateTime<Utc>) -> RunRecord {
    RunRecord::new(at, 0, Duration::from_millis(50), Some("selector broke".into()))
}

fn good_run(at: chrono::DateTime<Utc>) -> RunRecord {
    RunRecord::new(at, 7, Duration::from_millis(50), None)
}

#[test]
fn alert_fires_on_third_failure_then_rate_limits() {
    let tracker = HealthTracker::default();
    let policy = AlertPolicy::default();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

    // Two failures: streak below threshold, no alert.
    for i in 0..2 {
        tracker.record_run_at("venue", failed_run(t0 + ChronoDuration::hours(i)));
        assert!(tracker
            .alert_due("venue", &policy, t0 + ChronoDuration::hours(i))
            .is_none());
    }

    // Third failure: first alert fires.
    let t2 = t0 + ChronoDuration::hours(2);
    let streak = tracker.record_run_at("venue", failed_run(t2));
    assert_eq!(streak, 3);
    let ctx = tracker.alert_due("venue", &policy, t2).expect("alert");
    assert_eq!(ctx.job_name, "venue");
    assert_eq!(ctx.streak, 3);
    assert_eq!(ctx.recent_runs.len(), 3);

    // Fourth failure the same day: suppressed by the 24h cooldown.
    let t3 = t0 + ChronoDuration::hours(6);
    assert_eq!(tracker.record_run_at("venue", failed_run(t3)), 4);
    assert!(tracker.alert_due("venue", &policy, t3).is_none());

    // Fifth failure the next calendar day: re-fires.
    let t4 = t2 + ChronoDuration::hours(24);
    assert_eq!(tracker.record_run_at("venue", failed_run(t4)), 5);
    assert!(tracker.alert_due("venue", &policy, t4).is_some());
}

#[test]
fn success_resets_streak_and_alerting() {
    let tracker = HealthTracker::default();
    let policy = AlertPolicy::default();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

    for i in 0..3 {
        tracker.record_run_at("venue", failed_run(t0 + ChronoDuration::hours(i)));
    }
    assert!(tracker.alert_due("venue", &policy, t0).is_some());

    let streak = tracker.record_run_at("venue", good_run(t0 + ChronoDuration::hours(3)));
    assert_eq!(streak, 0);
    // Even after the cooldown, a healthy job does not alert.
    let later = t0 + ChronoDuration::hours(48);
    assert!(tracker.alert_due("venue", &policy, later).is_none());
}

#[test]
fn zero_events_counts_as_failure_for_the_streak() {
    let tracker = HealthTracker::default();
    let t0 = Utc::now();
    let zero = RunRecord::new(t0, 0, Duration::from_millis(10), None);
    assert_eq!(tracker.record_run_at("quiet", zero.clone()), 1);
    assert_eq!(tracker.record_run_at("quiet", zero.clone()), 2);
    assert_eq!(tracker.record_run_at("quiet", zero), 3);
}

#[test]
fn history_caps_at_configured_length() {
    let tracker = HealthTracker::with_history_len(10);
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    for i in 0..11 {
        tracker.record_run_at("venue", good_run(t0 + ChronoDuration::minutes(i)));
    }
    let history = tracker.history("venue").unwrap();
    assert_eq!(history.len(), 10);
    // The (H+1)-th record evicted the very first one.
    assert_eq!(history[0].at, t0 + ChronoDuration::minutes(1));
}

#[test]
fn one_jobs_crash_loop_never_alerts_another() {
    let tracker = HealthTracker::default();
    let policy = AlertPolicy::default();
    let t0 = Utc::now();

    for _ in 0..5 {
        tracker.record_run_at("broken", failed_run(t0));
    }
    tracker.record_run_at("healthy", good_run(t0));

    assert!(tracker.alert_due("broken", &policy, t0).is_some());
    assert!(tracker.alert_due("healthy", &policy, t0).is_none());
    // A job that never ran has no state to alert on.
    assert!(tracker.alert_due("unknown", &policy, t0).is_none());
}
