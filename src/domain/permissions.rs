//! Role guards for inspection and template mutations.
//!
//! The store consults these before every write; callers may also use them to
//! hide controls, but only the store-side check is authoritative.

use super::error::DomainError;
use super::types::{InspectionStatus, Role};

pub fn can_create(role: Role) -> bool {
    !matches!(role, Role::Viewer)
}

/// Field-level roles lose edit rights once an inspection is under review.
pub fn can_edit(role: Role, status: Option<InspectionStatus>) -> bool {
    match role {
        Role::Viewer => false,
        Role::Admin | Role::Manager | Role::Supervisor => true,
        Role::Fitter => !status.is_some_and(InspectionStatus::is_under_review),
    }
}

pub fn can_submit(role: Role) -> bool {
    matches!(
        role,
        Role::Fitter | Role::Supervisor | Role::Manager | Role::Admin
    )
}

pub fn can_approve(role: Role) -> bool {
    matches!(role, Role::Supervisor | Role::Manager | Role::Admin)
}

pub fn can_close(role: Role) -> bool {
    matches!(role, Role::Supervisor | Role::Manager | Role::Admin)
}

/// Rework after changes were requested. Closed inspections are terminal.
pub fn can_reopen(role: Role, status: Option<InspectionStatus>) -> bool {
    can_submit(role)
        && status.is_none_or(|status| status == InspectionStatus::ChangesRequested)
}

pub fn can_manage_templates(role: Role) -> bool {
    matches!(role, Role::Manager | Role::Admin)
}

pub fn can_manage_settings(role: Role) -> bool {
    matches!(role, Role::Admin)
}

pub fn require(allowed: bool, role: Role, action: &'static str) -> Result<(), DomainError> {
    if allowed {
        Ok(())
    } else {
        Err(DomainError::permission(role.as_str(), action))
    }
}
