//! Processing record for an external authorization code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ledger state of an authorization code. Only `Pending` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeState {
    Pending,
    Used,
    Invalid,
}

impl CodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeState::Pending => "Pending",
            CodeState::Used => "Used",
            CodeState::Invalid => "Invalid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(CodeState::Pending),
            "Used" => Some(CodeState::Used),
            "Invalid" => Some(CodeState::Invalid),
            _ => None,
        }
    }

    /// Monotonic transition rule.
    pub fn can_transition_to(&self, next: CodeState) -> bool {
        matches!(
            (self, next),
            (CodeState::Pending, CodeState::Used) | (CodeState::Pending, CodeState::Invalid)
        )
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationCodeUsage {
    pub state: CodeState,
    pub first_seen_at: DateTime<Utc>,
    /// Set when the exchange for this code hit a transport-level failure.
    pub transient_error: bool,
}

impl AuthorizationCodeUsage {
    pub fn pending() -> Self {
        Self {
            state: CodeState::Pending,
            first_seen_at: Utc::now(),
            transient_error: false,
        }
    }
}

/// Storage key for a code: hex SHA-256, so raw codes are never persisted.
pub fn code_key(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
