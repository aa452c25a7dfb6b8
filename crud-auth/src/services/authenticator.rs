//! Direct (non-OAuth) sign-up and password + TOTP login.

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::jwt::{IssuedSession, SessionTokenIssuer};
use super::totp::{TotpEnrollment, TotpService};
use crate::models::{normalize_email, LoginRecord, UserIdentity};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Verified against when the account has no usable hash, so unknown emails
/// cost the same Argon2 work as wrong passwords.
static DUMMY_HASH: Lazy<Option<PasswordHashString>> =
    Lazy::new(|| hash_password(&Password::new("crud-auth-timing-equalizer".to_string())).ok());

#[derive(Debug)]
pub struct LoginAttempt {
    pub email: String,
    pub password: Password,
    pub totp: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct SignUpOutcome {
    pub user: UserIdentity,
    pub totp: Option<TotpEnrollment>,
}

pub struct CredentialAuthenticator {
    store: Arc<dyn CredentialStore>,
    totp: TotpService,
    issuer: Arc<SessionTokenIssuer>,
    enroll_totp: bool,
}

impl CredentialAuthenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        totp: TotpService,
        issuer: Arc<SessionTokenIssuer>,
        enroll_totp: bool,
    ) -> Self {
        Self {
            store,
            totp,
            issuer,
            enroll_totp,
        }
    }

    pub async fn sign_up(&self, email: &str, password: Password) -> Result<SignUpOutcome, AuthError> {
        let email = normalize_email(email);

        // Fast path; the store's uniqueness constraint is what actually decides.
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;

        let totp = if self.enroll_totp {
            Some(self.totp.provision(&email)?)
        } else {
            None
        };

        let user = UserIdentity::with_password(
            &email,
            hash.into_string(),
            totp.as_ref().map(|t| t.secret_base32.clone()),
        );
        let user = self.store.insert_user(user).await?;

        tracing::info!(user_id = %user.user_id, totp = user.totp_enrolled(), "User signed up");

        Ok(SignUpOutcome { user, totp })
    }

    pub async fn login(&self, attempt: LoginAttempt) -> Result<IssuedSession, AuthError> {
        let result = self.authenticate(attempt).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);

        result
    }

    async fn authenticate(&self, attempt: LoginAttempt) -> Result<IssuedSession, AuthError> {
        let LoginAttempt {
            email,
            password,
            totp,
            ip,
            user_agent,
        } = attempt;
        let email = normalize_email(&email);

        let user = self.store.find_by_email(&email).await?;

        let stored_hash = user
            .as_ref()
            .and_then(|u| u.password_hash.clone())
            .map(PasswordHashString::new);
        let has_hash = stored_hash.is_some();

        let password_ok = match stored_hash.or_else(|| DUMMY_HASH.clone()) {
            Some(hash) => {
                let verified =
                    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                        .await
                        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;
                // An unreadable stored hash must fail like a wrong password
                verified.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Stored password hash could not be parsed");
                    false
                })
            }
            None => false,
        };

        let user = match user {
            Some(user) if has_hash && password_ok => user,
            _ => {
                tracing::info!("Login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if let Some(secret) = &user.totp_secret {
            let code = totp.as_deref().unwrap_or_default();
            if !self.totp.verify(secret, &user.email, code)? {
                tracing::info!(user_id = %user.user_id, "Login rejected: invalid TOTP");
                return Err(AuthError::InvalidTotp);
            }
        }

        let tokens = self.issuer.issue(&user.email)?;

        if let Err(e) = self
            .store
            .record_login(LoginRecord::new(user.user_id, ip, user_agent))
            .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to record login history");
        }

        tracing::info!(user_id = %user.user_id, "User logged in");

        Ok(IssuedSession { user, tokens })
    }
}
