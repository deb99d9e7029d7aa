//! Demo pass over a pair of stub jobs (alerts go to the noop transport
//! unless webhook/SMTP env is configured).

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use event_harvester::{
    DispatchMux, EventJob, JobRegistry, Pipeline, PipelineConfig, RawEvent,
};

struct StubVenueJob {
    name: &'static str,
    titles: &'static [&'static str],
}

#[async_trait::async_trait]
impl EventJob for StubVenueJob {
    async fn run(&self) -> Result<Vec<RawEvent>> {
        Ok(self
            .titles
            .iter()
            .map(|t| {
                RawEvent::new(*t, self.name)
                    .with_start("2026-09-01T20:00:00-07:00")
                    .with_description("Doors at 7.")
            })
            .collect())
    }
    fn name(&self) -> &str {
        self.name
    }
}

struct BrokenJob;

#[async_trait::async_trait]
impl EventJob for BrokenJob {
    async fn run(&self) -> Result<Vec<RawEvent>> {
        anyhow::bail!("selector .event-card matched nothing")
    }
    fn name(&self) -> &str {
        "broken-venue"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let config = PipelineConfig::load_default()?;
    let pipeline = Pipeline::with_dispatcher(config, Arc::new(DispatchMux::from_env()));

    let mut registry = JobRegistry::new();
    registry.register(Arc::new(StubVenueJob {
        name: "orpheum",
        titles: &["Jazz Night", "Jazz Night", "Organ Recital"],
    }));
    registry.register(Arc::new(StubVenueJob {
        name: "rickshaw",
        titles: &["Jazz Night", "Punk Showcase"],
    }));
    registry.register(Arc::new(BrokenJob));

    let outcome = pipeline.run_pass(&registry).await;
    for ev in &outcome.events {
        tracing::info!(title = %ev.title, start = %ev.start, source = %ev.source, "event");
    }
    tracing::info!(summary = ?outcome.summary, "demo pass done");
    Ok(())
}
