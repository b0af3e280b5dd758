//! Domain services wrapping the repositories.
//!
//! Tools never touch storage directly; they call these services, which
//! validate input, enforce cross-entity invariants, and translate storage
//! failures into the user-facing error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::ToolEnvelope;
use crate::errors::ErrorKind;
use crate::storage::StorageError;

pub mod invite;
pub mod matches;
pub mod roster;

pub use invite::InviteService;
pub use matches::MatchService;
pub use roster::RosterService;

/// A failed domain operation, already classified for the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    /// Taxonomy kind carried into the envelope.
    pub kind: ErrorKind,
    /// User-facing text.
    pub message: String,
}

impl ServiceError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// `InvalidInput` shorthand.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// `NotFound` shorthand.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// `Conflict` shorthand.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// The error envelope a tool returns for this failure.
    pub fn envelope(&self) -> ToolEnvelope {
        ToolEnvelope::error(self.kind, self.message.clone())
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(msg) => Self::new(ErrorKind::Conflict, msg),
            StorageError::NotFound(msg) => Self::new(ErrorKind::NotFound, msg),
            StorageError::Database(msg) => {
                tracing::error!(error = %msg, "storage failure");
                Self::new(
                    ErrorKind::DependencyUnavailable,
                    "Storage is unavailable right now, please retry.",
                )
            }
        }
    }
}

/// Abstract payment collection contract. Payment capture itself is out of
/// scope; implementations live outside the core.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Request collection of `amount_minor` (pence) from a player; returns a
    /// provider reference on acceptance.
    async fn collect(
        &self,
        team_id: &str,
        player_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> Result<String, ServiceError>;
}
