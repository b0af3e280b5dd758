//! Uniform JSON envelope returned by every tool.
//!
//! Tools never return bare strings; the orchestrator reasons about outcomes
//! through this shape and agents relay `message` verbatim on error.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

/// Envelope status discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    /// The tool completed its operation.
    Success,
    /// The tool failed; `error_kind` classifies the failure.
    Error,
}

/// The uniform tool reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope {
    /// Outcome discriminant.
    pub status: EnvelopeStatus,
    /// Failure classification, present when `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// User-facing text.
    pub message: String,
    /// Tool-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolEnvelope {
    /// Build a success envelope with a payload.
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            error_kind: None,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Build a success envelope carrying only a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            error_kind: None,
            message: message.into(),
            data: None,
        }
    }

    /// Build an error envelope for the given kind.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            error_kind: Some(kind),
            message: message.into(),
            data: None,
        }
    }

    /// Whether the envelope reports success.
    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    /// Serialize to the wire JSON handed back to agents.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Serialization of this shape cannot fail in practice; keep a
            // well-formed fallback anyway so agents never see garbage.
            format!("{{\"status\":\"error\",\"error_kind\":\"system_critical\",\"message\":{:?}}}",
                self.message)
        })
    }
}
