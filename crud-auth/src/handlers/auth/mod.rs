pub mod registration;
pub mod session;
pub mod social;

pub use registration::signup;
pub use session::{current_session, login, logout, refresh};
pub use social::{oauth_callback, oauth_redirect};
