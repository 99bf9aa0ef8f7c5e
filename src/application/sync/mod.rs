//! Outbox queue, delivery engine and conflict policy.

pub mod conflict;
pub mod engine;
pub mod payloads;
pub mod queue;

pub use engine::{FlushOutcome, FlushReport, ReconcileReport, SyncEngine, SyncTrigger};
pub use queue::SyncQueue;
