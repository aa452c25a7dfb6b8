use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::error::AuthError;
use crate::models::{normalize_email, LoginRecord, OAuthProfile, ProviderTokens, UserIdentity};

/// Persistent user records. Emails reaching the store are already normalized.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, AuthError>;

    /// Insert a new identity; `AlreadyExists` when the email is taken.
    async fn insert_user(&self, user: UserIdentity) -> Result<UserIdentity, AuthError>;

    /// Create or refresh an OAuth identity. Returns the row and whether it was created.
    async fn upsert_oauth_user(
        &self,
        profile: &OAuthProfile,
        tokens: &ProviderTokens,
    ) -> Result<(UserIdentity, bool), AuthError>;

    async fn record_login(&self, record: LoginRecord) -> Result<(), AuthError>;

    async fn health_check(&self) -> Result<(), AuthError>;
}

/// Process-local credential store used in tests and database-less dev runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: DashMap<String, UserIdentity>,
    logins: DashMap<Uuid, Vec<LoginRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_history(&self, user_id: Uuid) -> Vec<LoginRecord> {
        self.logins
            .get(&user_id)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, AuthError> {
        Ok(self
            .users
            .get(&normalize_email(email))
            .map(|user| user.clone()))
    }

    async fn insert_user(&self, user: UserIdentity) -> Result<UserIdentity, AuthError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn upsert_oauth_user(
        &self,
        profile: &OAuthProfile,
        tokens: &ProviderTokens,
    ) -> Result<(UserIdentity, bool), AuthError> {
        match self.users.entry(normalize_email(&profile.email)) {
            Entry::Occupied(mut existing) => {
                let user = existing.get_mut();
                user.apply_provider_tokens(tokens);
                Ok((user.clone(), false))
            }
            Entry::Vacant(slot) => {
                let user = UserIdentity::from_provider(profile, tokens);
                slot.insert(user.clone());
                Ok((user, true))
            }
        }
    }

    async fn record_login(&self, record: LoginRecord) -> Result<(), AuthError> {
        self.logins.entry(record.user_id).or_default().push(record);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
