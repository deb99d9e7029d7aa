// src/lib.rs
// Public library surface for integration tests (and embedding callers).

pub mod alert;
pub mod config;
pub mod dedupe;
pub mod event;
pub mod health;
pub mod job;
pub mod pipeline;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::alert::{AlertContext, AlertDispatcher, AlertPolicy, DispatchMux, NoopDispatcher};
pub use crate::config::PipelineConfig;
pub use crate::event::{CanonicalEvent, RawEvent, RecordKind, ValidatedEvent, Venue};
pub use crate::health::{HealthStats, HealthTracker, RunRecord};
pub use crate::job::{EventJob, JobRegistry};
pub use crate::pipeline::{PassOutcome, PassSummary, Pipeline};
pub use crate::validate::{RejectReason, ValidationFilter, ValidationRules};
