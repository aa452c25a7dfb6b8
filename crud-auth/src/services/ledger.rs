//! Replay guard for external authorization codes.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::error::AuthError;
use crate::models::code_usage::{code_key, AuthorizationCodeUsage, CodeState};

/// Admission decision for one presentation of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First sighting; the caller owns the exchange.
    Created,
    AlreadyPending,
    AlreadyUsed,
    AlreadyInvalid,
}

impl ClaimOutcome {
    pub fn from_state(state: CodeState) -> Self {
        match state {
            CodeState::Pending => ClaimOutcome::AlreadyPending,
            CodeState::Used => ClaimOutcome::AlreadyUsed,
            CodeState::Invalid => ClaimOutcome::AlreadyInvalid,
        }
    }
}

/// Durable per-code processing state.
///
/// `claim` must be a single atomic admission step: concurrent claims of the
/// same code yield exactly one `Created`. Transitions only ever leave `Pending`.
#[async_trait]
pub trait CodeUsageLedger: Send + Sync {
    async fn claim(&self, code: &str) -> Result<ClaimOutcome, AuthError>;

    async fn mark_used(&self, code: &str) -> Result<(), AuthError>;

    async fn mark_invalid(&self, code: &str) -> Result<(), AuthError>;

    /// Record that the exchange failed at transport level. State stays `Pending`.
    async fn flag_transient(&self, code: &str) -> Result<(), AuthError>;

    async fn lookup(&self, code: &str) -> Result<Option<AuthorizationCodeUsage>, AuthError>;
}

/// Ledger backed by a sharded map; each key's shard lock makes `claim` atomic.
#[derive(Default)]
pub struct MemoryCodeLedger {
    entries: DashMap<String, AuthorizationCodeUsage>,
}

impl MemoryCodeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(&self, code: &str, next: CodeState) {
        if let Some(mut entry) = self.entries.get_mut(&code_key(code)) {
            if entry.state.can_transition_to(next) {
                entry.state = next;
            }
        }
    }
}

#[async_trait]
impl CodeUsageLedger for MemoryCodeLedger {
    async fn claim(&self, code: &str) -> Result<ClaimOutcome, AuthError> {
        match self.entries.entry(code_key(code)) {
            Entry::Occupied(existing) => Ok(ClaimOutcome::from_state(existing.get().state)),
            Entry::Vacant(slot) => {
                slot.insert(AuthorizationCodeUsage::pending());
                Ok(ClaimOutcome::Created)
            }
        }
    }

    async fn mark_used(&self, code: &str) -> Result<(), AuthError> {
        self.transition(code, CodeState::Used);
        Ok(())
    }

    async fn mark_invalid(&self, code: &str) -> Result<(), AuthError> {
        self.transition(code, CodeState::Invalid);
        Ok(())
    }

    async fn flag_transient(&self, code: &str) -> Result<(), AuthError> {
        if let Some(mut entry) = self.entries.get_mut(&code_key(code)) {
            entry.transient_error = true;
        }
        Ok(())
    }

    async fn lookup(&self, code: &str) -> Result<Option<AuthorizationCodeUsage>, AuthError> {
        Ok(self.entries.get(&code_key(code)).map(|entry| entry.clone()))
    }
}
