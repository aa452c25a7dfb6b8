use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-only-insecure-session-signing-secret";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub google: GoogleOAuthConfig,
    pub totp: TotpConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs the service on the in-memory stores.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub revocation_sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TotpConfig {
    pub issuer: String,
    pub enroll_on_signup: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub signup_attempts: u32,
    pub signup_window_seconds: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        // Development fallbacks for secrets; production must set them
        let dev_only = |value: &'static str| if is_prod { None } else { Some(value) };
        let google_defaults = crate::services::GoogleEndpoints::default();

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("crud-auth"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: if is_prod {
                    Some(get_env("DATABASE_URL", None, true)?)
                } else {
                    env::var("DATABASE_URL").ok().filter(|v| !v.is_empty())
                },
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", dev_only(DEV_JWT_SECRET), is_prod)?),
                access_token_ttl_seconds: get_parsed("ACCESS_TOKEN_TTL_SECONDS", "60", is_prod)?,
                refresh_token_ttl_seconds: get_parsed(
                    "REFRESH_TOKEN_TTL_SECONDS",
                    "86400",
                    is_prod,
                )?,
                revocation_sweep_interval_seconds: get_parsed(
                    "REVOCATION_SWEEP_INTERVAL_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
            google: GoogleOAuthConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", dev_only(""), is_prod)?,
                client_secret: Secret::new(get_env("GOOGLE_CLIENT_SECRET", dev_only(""), is_prod)?),
                redirect_uri: get_env(
                    "GOOGLE_REDIRECT_URI",
                    Some("http://localhost:8086/callback"),
                    is_prod,
                )?,
                auth_url: env_or("GOOGLE_AUTH_URL", &google_defaults.auth_url),
                token_url: env_or("GOOGLE_TOKEN_URL", &google_defaults.token_url),
                userinfo_url: env_or("GOOGLE_USERINFO_URL", &google_defaults.userinfo_url),
                http_timeout_seconds: get_parsed("OAUTH_HTTP_TIMEOUT_SECONDS", "10", is_prod)?,
            },
            totp: TotpConfig {
                issuer: get_env("TOTP_ISSUER", Some("crud-auth"), is_prod)?,
                enroll_on_signup: get_parsed("TOTP_ENROLL_ON_SIGNUP", "true", is_prod)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5", is_prod)?,
                login_window_seconds: get_parsed("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", is_prod)?,
                signup_attempts: get_parsed("RATE_LIMIT_SIGNUP_ATTEMPTS", "3", is_prod)?,
                signup_window_seconds: get_parsed(
                    "RATE_LIMIT_SIGNUP_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
            },
        };

        if !is_prod && config.jwt.secret.expose_secret() == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set; using the built-in development secret");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        if self.jwt.access_token_ttl_seconds <= 0 || self.jwt.refresh_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token TTLs must be positive"
            )));
        }

        if self.jwt.access_token_ttl_seconds >= self.jwt.refresh_token_ttl_seconds {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_TTL_SECONDS must be shorter than REFRESH_TOKEN_TTL_SECONDS"
            )));
        }

        if self.jwt.revocation_sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REVOCATION_SWEEP_INTERVAL_SECONDS must be positive"
            )));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.signup_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limit attempts must be positive"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if self.jwt.secret.expose_secret().len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least 32 bytes in production"
                )));
            }

            if self.google.client_id.is_empty() || self.google.client_secret.expose_secret().is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Google OAuth credentials are required in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(format!(
                "{} is required in production but not set",
                key
            )))),
            None => Err(AppError::ConfigError(anyhow::anyhow!(format!(
                "{} is required but not set",
                key
            )))),
        },
    }
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

/// Endpoint overrides: optional in every environment.
fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "crud-auth".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: Secret::new("a-32-byte-signing-secret-for-tests".to_string()),
                access_token_ttl_seconds: 60,
                refresh_token_ttl_seconds: 86_400,
                revocation_sweep_interval_seconds: 60,
            },
            google: GoogleOAuthConfig {
                client_id: "client".to_string(),
                client_secret: Secret::new("secret".to_string()),
                redirect_uri: "http://localhost:8086/callback".to_string(),
                auth_url: "https://idp.test/auth".to_string(),
                token_url: "https://idp.test/token".to_string(),
                userinfo_url: "https://idp.test/userinfo".to_string(),
                http_timeout_seconds: 10,
            },
            totp: TotpConfig {
                issuer: "crud-auth".to_string(),
                enroll_on_signup: true,
            },
            rate_limit: RateLimitConfig {
                login_attempts: 5,
                login_window_seconds: 900,
                signup_attempts: 3,
                signup_window_seconds: 3600,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn access_ttl_must_be_shorter_than_refresh_ttl() {
        let mut cfg = config();
        cfg.jwt.access_token_ttl_seconds = 86_400;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut cfg = config();
        cfg.jwt.secret = Secret::new(String::new());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn prod_requires_a_long_secret() {
        let mut cfg = config();
        cfg.environment = Environment::Prod;
        cfg.jwt.secret = Secret::new("short".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
