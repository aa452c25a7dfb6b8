//! PostgreSQL implementation of the credential store and code ledger.
//!
//! Uniqueness is enforced by the schema (`users.email`,
//! `authorization_code_usage.code_hash`); `ON CONFLICT` turns a constraint hit
//! into the "already exists / already claimed" answer in the same statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::ledger::{ClaimOutcome, CodeUsageLedger};
use crate::models::code_usage::{code_key, AuthorizationCodeUsage, CodeState};
use crate::models::{normalize_email, LoginRecord, OAuthProfile, ProviderTokens, UserIdentity};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(FromRow)]
struct UpsertedUser {
    #[sqlx(flatten)]
    user: UserIdentity,
    inserted: bool,
}

#[derive(FromRow)]
struct CodeUsageRow {
    state: String,
    first_seen_at: DateTime<Utc>,
    transient_error: bool,
}

impl CodeUsageRow {
    fn into_usage(self) -> Result<AuthorizationCodeUsage, AuthError> {
        let state = CodeState::parse(&self.state).ok_or_else(|| {
            AuthError::Storage(anyhow::anyhow!("unknown code state {:?}", self.state))
        })?;
        Ok(AuthorizationCodeUsage {
            state,
            first_seen_at: self.first_seen_at,
            transient_error: self.transient_error,
        })
    }
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition(&self, code: &str, next: CodeState) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE authorization_code_usage SET state = $1 WHERE code_hash = $2 AND state = 'Pending'",
        )
        .bind(next.as_str())
        .bind(code_key(code))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, AuthError> {
        let user = sqlx::query_as::<_, UserIdentity>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: UserIdentity) -> Result<UserIdentity, AuthError> {
        let inserted = sqlx::query_as::<_, UserIdentity>(
            r#"
            INSERT INTO users (user_id, email, password_hash, totp_secret, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.totp_secret)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or(AuthError::AlreadyExists)
    }

    async fn upsert_oauth_user(
        &self,
        profile: &OAuthProfile,
        tokens: &ProviderTokens,
    ) -> Result<(UserIdentity, bool), AuthError> {
        let fresh = UserIdentity::from_provider(profile, tokens);

        let row = sqlx::query_as::<_, UpsertedUser>(
            r#"
            INSERT INTO users (
                user_id, email, role, first_name, last_name, picture,
                provider_access_token, provider_refresh_token, provider_token_expiry,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (email) DO UPDATE SET
                provider_access_token = EXCLUDED.provider_access_token,
                provider_refresh_token = EXCLUDED.provider_refresh_token,
                provider_token_expiry = EXCLUDED.provider_token_expiry,
                updated_at = EXCLUDED.updated_at
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(fresh.user_id)
        .bind(&fresh.email)
        .bind(fresh.role.as_str())
        .bind(&fresh.first_name)
        .bind(&fresh.last_name)
        .bind(&fresh.picture)
        .bind(&fresh.provider_access_token)
        .bind(&fresh.provider_refresh_token)
        .bind(fresh.provider_token_expiry)
        .bind(fresh.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.user, row.inserted))
    }

    async fn record_login(&self, record: LoginRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO login_history (user_id, login_ip, login_device, logged_in_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.login_ip)
        .bind(&record.login_device)
        .bind(record.logged_in_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            AuthError::from(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl CodeUsageLedger for Database {
    async fn claim(&self, code: &str) -> Result<ClaimOutcome, AuthError> {
        let key = code_key(code);

        let result = sqlx::query(
            r#"
            INSERT INTO authorization_code_usage (code_hash, state, first_seen_at, transient_error)
            VALUES ($1, 'Pending', NOW(), FALSE)
            ON CONFLICT (code_hash) DO NOTHING
            "#,
        )
        .bind(&key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(ClaimOutcome::Created);
        }

        let existing = sqlx::query_as::<_, CodeUsageRow>(
            "SELECT state, first_seen_at, transient_error FROM authorization_code_usage WHERE code_hash = $1",
        )
        .bind(&key)
        .fetch_one(&self.pool)
        .await?
        .into_usage()?;

        Ok(ClaimOutcome::from_state(existing.state))
    }

    async fn mark_used(&self, code: &str) -> Result<(), AuthError> {
        self.transition(code, CodeState::Used).await
    }

    async fn mark_invalid(&self, code: &str) -> Result<(), AuthError> {
        self.transition(code, CodeState::Invalid).await
    }

    async fn flag_transient(&self, code: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE authorization_code_usage SET transient_error = TRUE WHERE code_hash = $1")
            .bind(code_key(code))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lookup(&self, code: &str) -> Result<Option<AuthorizationCodeUsage>, AuthError> {
        sqlx::query_as::<_, CodeUsageRow>(
            "SELECT state, first_seen_at, transient_error FROM authorization_code_usage WHERE code_hash = $1",
        )
        .bind(code_key(code))
        .fetch_optional(&self.pool)
        .await?
        .map(CodeUsageRow::into_usage)
        .transpose()
    }
}
