// src/job.rs
use anyhow::Result;
use std::sync::Arc;

use crate::event::RawEvent;

/// Contract every extraction job implements.
///
/// `run` either completes with zero or more raw records or fails with an
/// error. Zero results is a normal (if notable) outcome and must not be
/// reported as `Err`. The pipeline applies its own timeout around `run`,
/// so implementations do not need to bound themselves.
#[async_trait::async_trait]
pub trait EventJob: Send + Sync {
    async fn run(&self) -> Result<Vec<RawEvent>>;
    fn name(&self) -> &str;
}

/// Ordered set of jobs for one pass. Iteration order is registration order,
/// which also fixes the arrival order the dedup engine sees when the
/// pipeline runs sequentially.
///
/// How jobs are located on disk or configured is the caller's concern; the
/// pipeline only ever sees this list.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<dyn EventJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn EventJob>) -> &mut Self {
        self.jobs.push(job);
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EventJob>> {
        self.jobs.iter()
    }
}

impl FromIterator<Arc<dyn EventJob>> for JobRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn EventJob>>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}
