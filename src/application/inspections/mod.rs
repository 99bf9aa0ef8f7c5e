//! Inspection store operations: guarded mutations and queries.

mod commands;
mod queries;
mod service;

pub use service::InspectionService;
