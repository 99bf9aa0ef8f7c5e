//! Conflict policy applied when the remote reports stale state.

use crate::application::remote::RemoteError;
use crate::domain::types::ConflictPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Resend once, asking the remote to apply the local payload over its state.
    ForceResend,
    /// Keep the entry, mark the record failed and flag it for a reviewer.
    FlagForReview,
    /// Plain failure; retried on the next explicit sync.
    Fail,
}

/// Decide what to do with a rejected delivery.
///
/// Only stale-state rejections are conflicts. An entry that was already sent
/// with `force` is never forced a second time.
pub fn resolve(policy: ConflictPolicy, error: &RemoteError, already_forced: bool) -> Resolution {
    match (error, policy) {
        (RemoteError::StaleState(_), ConflictPolicy::LastWriteWins) if !already_forced => {
            Resolution::ForceResend
        }
        (RemoteError::StaleState(_), ConflictPolicy::LastWriteWins) => Resolution::Fail,
        (RemoteError::StaleState(_), ConflictPolicy::FlagForReview) => Resolution::FlagForReview,
        _ => Resolution::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale() -> RemoteError {
        RemoteError::StaleState("approved elsewhere".into())
    }

    #[test]
    fn last_write_wins_forces_exactly_once() {
        assert_eq!(
            resolve(ConflictPolicy::LastWriteWins, &stale(), false),
            Resolution::ForceResend
        );
        assert_eq!(
            resolve(ConflictPolicy::LastWriteWins, &stale(), true),
            Resolution::Fail
        );
    }

    #[test]
    fn flag_for_review_never_drops_the_edit() {
        assert_eq!(
            resolve(ConflictPolicy::FlagForReview, &stale(), false),
            Resolution::FlagForReview
        );
    }

    #[test]
    fn permission_and_validation_rejections_are_not_conflicts() {
        for error in [
            RemoteError::PermissionDenied("role".into()),
            RemoteError::Validation("bad answer".into()),
        ] {
            assert_eq!(
                resolve(ConflictPolicy::LastWriteWins, &error, false),
                Resolution::Fail
            );
        }
    }
}
