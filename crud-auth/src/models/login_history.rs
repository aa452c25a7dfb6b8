use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// One successful direct login.
#[derive(Debug, Clone, FromRow)]
pub struct LoginRecord {
    pub user_id: Uuid,
    pub login_ip: Option<String>,
    pub login_device: Option<String>,
    pub logged_in_at: DateTime<Utc>,
}

impl LoginRecord {
    pub fn new(user_id: Uuid, login_ip: Option<String>, login_device: Option<String>) -> Self {
        Self {
            user_id,
            login_ip,
            login_device,
            logged_in_at: Utc::now(),
        }
    }
}
