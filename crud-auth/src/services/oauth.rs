//! Authorization-code callback handling.
//!
//! The ledger admits each code at most once before the provider is contacted.
//! Nothing after admission is rolled back: a code whose exchange fails midway
//! stays consumed.

use std::sync::Arc;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::jwt::{IssuedSession, SessionTokenIssuer};
use super::ledger::{ClaimOutcome, CodeUsageLedger};
use super::provider::{IdentityProvider, ProviderError};

pub struct OAuthExchangeCoordinator {
    ledger: Arc<dyn CodeUsageLedger>,
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn IdentityProvider>,
    issuer: Arc<SessionTokenIssuer>,
}

impl OAuthExchangeCoordinator {
    pub fn new(
        ledger: Arc<dyn CodeUsageLedger>,
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        issuer: Arc<SessionTokenIssuer>,
    ) -> Self {
        Self {
            ledger,
            store,
            provider,
            issuer,
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub async fn handle_callback(&self, code: Option<&str>) -> Result<IssuedSession, AuthError> {
        let result = self.complete(code).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("auth_oauth_callback_total", "outcome" => outcome).increment(1);

        result
    }

    async fn complete(&self, code: Option<&str>) -> Result<IssuedSession, AuthError> {
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        match self.ledger.claim(code).await? {
            ClaimOutcome::Created => {}
            outcome => {
                tracing::warn!(outcome = ?outcome, "Authorization code replay rejected");
                return Err(AuthError::ReplayedCode);
            }
        }

        let provider_tokens = match self.provider.exchange_code(code).await {
            Ok(tokens) => tokens,
            Err(ProviderError::InvalidGrant) => {
                if let Err(e) = self.ledger.mark_invalid(code).await {
                    tracing::error!(error = %e, "Failed to mark authorization code invalid");
                }
                return Err(AuthError::InvalidGrant);
            }
            Err(e) => {
                if e.is_transient() {
                    if let Err(le) = self.ledger.flag_transient(code).await {
                        tracing::error!(error = %le, "Failed to flag transient code failure");
                    }
                }
                tracing::error!(error = %e, "Token exchange failed");
                return Err(AuthError::Provider(e.to_string()));
            }
        };

        if let Err(e) = self.ledger.mark_used(code).await {
            tracing::error!(error = %e, "Failed to mark authorization code used");
        }

        let profile = self
            .provider
            .fetch_profile(&provider_tokens)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch user profile");
                AuthError::Provider(e.to_string())
            })?;

        let (user, created) = self
            .store
            .upsert_oauth_user(&profile, &provider_tokens)
            .await?;

        let tokens = self.issuer.issue(&user.email)?;

        tracing::info!(user_id = %user.user_id, created, "OAuth login completed");

        Ok(IssuedSession { user, tokens })
    }
}
