//! Offline-first inspection store: lifecycle rules, a local SQLite store and a
//! durable outbox replayed against the server of record.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
