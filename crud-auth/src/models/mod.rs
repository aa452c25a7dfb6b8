pub mod code_usage;
pub mod login_history;
pub mod oauth;
pub mod user;

pub use code_usage::{AuthorizationCodeUsage, CodeState};
pub use login_history::LoginRecord;
pub use oauth::{OAuthProfile, ProviderTokens};
pub use user::{normalize_email, Role, UserIdentity, UserResponse};
