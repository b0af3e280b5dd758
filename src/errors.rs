//! Shared user-facing error taxonomy.
//!
//! Every component that talks to the user speaks this vocabulary through the
//! tool envelope. Infrastructure errors (`StorageError`, `LlmError`,
//! `TransportError`) live in their own modules and are mapped into these
//! kinds at the boundary where a reply is produced.

use serde::{Deserialize, Serialize};

/// Classification of a user-visible failure.
///
/// `SystemCritical` is the only kind that is not user-recoverable: it marks
/// a violated structural prerequisite (uninitialized registry, broken
/// invariant) and must never be downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Authorization or chat-scope violation.
    Denied,
    /// Command not present in the registry.
    UnknownCommand,
    /// Malformed parameters (bad phone number, unknown field).
    InvalidInput,
    /// Referenced player/member/invite/match missing.
    NotFound,
    /// Unique constraint violation (duplicate phone, second admin bootstrap).
    Conflict,
    /// Invite past its expiry timestamp.
    InviteExpired,
    /// Invite already redeemed.
    InviteAlreadyUsed,
    /// Per-update deadline expired.
    TimedOut,
    /// LLM or storage unreachable.
    DependencyUnavailable,
    /// Structural prerequisite absent or invariant violated.
    SystemCritical,
}

impl ErrorKind {
    /// Whether the failure is something the user can recover from by
    /// correcting their input or retrying.
    pub fn is_user_recoverable(self) -> bool {
        !matches!(self, Self::SystemCritical)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Denied => "denied",
            Self::UnknownCommand => "unknown_command",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InviteExpired => "invite_expired",
            Self::InviteAlreadyUsed => "invite_already_used",
            Self::TimedOut => "timed_out",
            Self::DependencyUnavailable => "dependency_unavailable",
            Self::SystemCritical => "system_critical",
        };
        f.write_str(s)
    }
}
