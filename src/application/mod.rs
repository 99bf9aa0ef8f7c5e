//! Application services layer: guarded mutations, outbox and orchestration.

pub mod context;
pub mod defects;
pub mod error;
pub mod inspections;
pub mod locks;
pub mod remote;
pub mod repos;
pub mod settings;
pub mod sync;
pub mod templates;
