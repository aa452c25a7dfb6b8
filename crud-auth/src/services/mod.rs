pub mod authenticator;
pub mod clock;
pub mod credentials;
pub mod database;
pub mod error;
pub mod jwt;
pub mod ledger;
pub mod oauth;
pub mod provider;
pub mod revocation;
pub mod totp;

pub use authenticator::{CredentialAuthenticator, LoginAttempt, SignUpOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use database::Database;
pub use error::AuthError;
pub use jwt::{IssuedSession, SessionClaims, SessionTokenIssuer, SessionTokens, TokenKind, TokenRejection};
pub use ledger::{ClaimOutcome, CodeUsageLedger, MemoryCodeLedger};
pub use oauth::OAuthExchangeCoordinator;
pub use provider::{GoogleEndpoints, GoogleProvider, IdentityProvider, ProviderError};
pub use revocation::{spawn_revocation_sweeper, TokenRevocationStore};
pub use totp::{TotpEnrollment, TotpService};
