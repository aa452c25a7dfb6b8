use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clock::Clock;
use super::error::AuthError;
use super::revocation::TokenRevocationStore;
use crate::models::UserIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both session token flavours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionClaims {
    /// Subject (email)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub typ: TokenKind,
}

/// Access + refresh pair handed to a client after login
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Tokens plus the identity they were issued for
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserIdentity,
    pub tokens: SessionTokens,
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Expired,
    WrongType,
}

impl TokenRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "invalid",
            TokenRejection::Expired => "expired",
            TokenRejection::WrongType => "wrong_type",
        }
    }
}

/// Mints, verifies and revokes HS256 session tokens.
#[derive(Clone)]
pub struct SessionTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    clock: Arc<dyn Clock>,
    revocations: Arc<TokenRevocationStore>,
}

impl SessionTokenIssuer {
    pub fn new(
        secret: &Secret<String>,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
        clock: Arc<dyn Clock>,
        revocations: Arc<TokenRevocationStore>,
    ) -> Self {
        let key = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            access_ttl_seconds,
            refresh_ttl_seconds,
            clock,
            revocations,
        }
    }

    pub fn revocations(&self) -> &Arc<TokenRevocationStore> {
        &self.revocations
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    fn sign(&self, email: &str, typ: TokenKind) -> Result<(String, SessionClaims), AuthError> {
        let now = self.clock.unix();
        let ttl = match typ {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        };
        let claims = SessionClaims {
            sub: email.to_string(),
            iat: now,
            exp: now + ttl,
            typ,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {:?} token: {}", typ, e))?;

        Ok((token, claims))
    }

    /// Issue an access/refresh pair and register the refresh token.
    pub fn issue(&self, email: &str) -> Result<SessionTokens, AuthError> {
        let (access_token, _) = self.sign(email, TokenKind::Access)?;
        let (refresh_token, refresh_claims) = self.sign(email, TokenKind::Refresh)?;

        self.revocations
            .register_refresh(&refresh_token, email, refresh_claims.exp);

        Ok(SessionTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_seconds,
        })
    }

    /// Verify signature, shape, expiry and flavour. Revocation is not consulted.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                TokenRejection::Malformed
            })?
            .claims;

        if claims.exp <= self.clock.unix() {
            return Err(TokenRejection::Expired);
        }
        if claims.typ != expected {
            return Err(TokenRejection::WrongType);
        }

        Ok(claims)
    }

    /// Exchange a registered refresh token for a fresh access token.
    ///
    /// The refresh token itself is neither rotated nor invalidated.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let email = self
            .revocations
            .resolve_refresh(refresh_token)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let claims = match self.verify(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::warn!(reason = reason.as_str(), "Registered refresh token failed verification");
                self.revocations.remove_refresh(refresh_token);
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        if claims.sub != email {
            return Err(AuthError::InvalidRefreshToken);
        }

        let (access_token, _) = self.sign(&email, TokenKind::Access)?;
        Ok(access_token)
    }

    /// Revoke an access token. Tokens that no longer verify are ignored.
    pub fn revoke_access(&self, access_token: &str) {
        if let Ok(claims) = self.verify(access_token, TokenKind::Access) {
            self.revocations.revoke_access(access_token, claims.exp);
        }
    }

    pub fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        if let Some(token) = access_token {
            self.revoke_access(token);
        }
        if let Some(token) = refresh_token {
            self.revocations.remove_refresh(token);
        }
    }
}
