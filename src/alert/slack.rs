// src/alert/slack.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{AlertContext, AlertDispatcher};

pub struct SlackDispatcher {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
}

impl SlackDispatcher {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Builder for tests/tools.
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl AlertDispatcher for SlackDispatcher {
    async fn send(&self, subject: &str, _body: &str, ctx: &AlertContext) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Slack disabled (no SLACK_WEBHOOK_URL)");
            return Ok(());
        };

        let recent: String = ctx
            .recent_runs
            .iter()
            .rev()
            .take(3)
            .map(|run| {
                let status = match (&run.error, run.event_count) {
                    (Some(err), _) => format!("ERROR: {err}"),
                    (None, 0) => "NO EVENTS".to_string(),
                    (None, n) => format!("{n} events"),
                };
                format!("{} - {} ({} ms)", run.at.to_rfc3339(), status, run.elapsed.as_millis())
            })
            .collect::<Vec<_>>()
            .join("\n");

        let text = format!(
            "*{}*\nJob `{}` has failed {} consecutive runs.\nRecent runs:\n```{}```",
            subject, ctx.job_name, ctx.streak, recent
        );
        let payload = serde_json::json!({ "text": text });

        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}
