//! Inspection domain: entities, typed answers, the status machine and role guards.

pub mod answers;
pub mod entities;
pub mod error;
pub mod lifecycle;
pub mod permissions;
pub mod templates;
pub mod types;
