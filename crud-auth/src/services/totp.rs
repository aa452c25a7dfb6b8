use std::sync::Arc;

use totp_rs::{Algorithm, Secret, TOTP};

use super::clock::Clock;
use super::error::AuthError;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

/// Secret and `otpauth://` URI handed back on enrollment. The caller renders
/// the URI as a QR code.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub secret_base32: String,
    pub provisioning_uri: String,
}

/// RFC 6238 codes: SHA-1, six digits, 30 second step, one step of skew.
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TotpService {
    pub fn new(issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer: issuer.into(),
            clock,
        }
    }

    fn build(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP, AuthError> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("TOTP init error: {e}")))
    }

    fn decode(secret_base32: &str) -> Result<Vec<u8>, AuthError> {
        Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Stored TOTP secret is not base32: {e}")))
    }

    /// Generate a fresh secret for `email`.
    pub fn provision(&self, email: &str) -> Result<TotpEnrollment, AuthError> {
        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Secret gen error: {e}")))?;

        let totp = self.build(secret_bytes, email)?;

        Ok(TotpEnrollment {
            secret_base32: totp.get_secret_base32(),
            provisioning_uri: totp.get_url(),
        })
    }

    /// Check `code` against the current window, one step either side.
    pub fn verify(&self, secret_base32: &str, email: &str, code: &str) -> Result<bool, AuthError> {
        let code = code.trim();
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.build(Self::decode(secret_base32)?, email)?;
        let now = u64::try_from(self.clock.unix()).unwrap_or(0);
        Ok(totp.check(code, now))
    }

    /// Code for the current window.
    pub fn current_code(&self, secret_base32: &str, email: &str) -> Result<String, AuthError> {
        let totp = self.build(Self::decode(secret_base32)?, email)?;
        let now = u64::try_from(self.clock.unix()).unwrap_or(0);
        Ok(totp.generate(now))
    }
}
