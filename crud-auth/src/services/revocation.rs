//! In-process registry of revoked access tokens and live refresh tokens.
//!
//! Every entry remembers the expiry of the token it describes. Once that
//! moment has passed the token fails signature/expiry validation on its own,
//! so the entry can be dropped: lookups evict lazily and
//! [`spawn_revocation_sweeper`] evicts the rest on an interval.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::clock::Clock;

#[derive(Debug, Clone)]
struct RevokedAccess {
    revoked_at: DateTime<Utc>,
    expires_at: i64,
}

#[derive(Debug, Clone)]
struct RefreshMapping {
    email: String,
    expires_at: i64,
}

pub struct TokenRevocationStore {
    revoked: DashMap<String, RevokedAccess>,
    refresh: DashMap<String, RefreshMapping>,
    clock: Arc<dyn Clock>,
}

impl TokenRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            revoked: DashMap::new(),
            refresh: DashMap::new(),
            clock,
        }
    }

    /// Mark an access token as revoked until `expires_at` (unix seconds).
    pub fn revoke_access(&self, token: &str, expires_at: i64) {
        let now = self.clock.now();
        if expires_at <= now.timestamp() {
            return;
        }
        self.revoked.insert(
            token.to_string(),
            RevokedAccess {
                revoked_at: now,
                expires_at,
            },
        );
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        let now = self.clock.unix();
        self.revoked.remove_if(token, |_, entry| entry.expires_at <= now);
        self.revoked.contains_key(token)
    }

    /// When `token` was revoked, if it still is.
    pub fn revoked_at(&self, token: &str) -> Option<DateTime<Utc>> {
        self.revoked.get(token).map(|entry| entry.revoked_at)
    }

    pub fn register_refresh(&self, token: &str, email: &str, expires_at: i64) {
        self.refresh.insert(
            token.to_string(),
            RefreshMapping {
                email: email.to_string(),
                expires_at,
            },
        );
    }

    /// Owning email of a live refresh token.
    pub fn resolve_refresh(&self, token: &str) -> Option<String> {
        let now = self.clock.unix();
        self.refresh.remove_if(token, |_, mapping| mapping.expires_at <= now);
        self.refresh.get(token).map(|mapping| mapping.email.clone())
    }

    pub fn remove_refresh(&self, token: &str) -> bool {
        self.refresh.remove(token).is_some()
    }

    /// Drop every entry whose token has expired. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.unix();
        let before = self.revoked.len() + self.refresh.len();
        self.revoked.retain(|_, entry| entry.expires_at > now);
        self.refresh.retain(|_, mapping| mapping.expires_at > now);
        before.saturating_sub(self.revoked.len() + self.refresh.len())
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh.len()
    }
}

/// Periodically evict expired entries for the lifetime of the process.
pub fn spawn_revocation_sweeper(
    store: Arc<TokenRevocationStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = store.sweep_expired();
            if evicted > 0 {
                tracing::debug!(
                    evicted,
                    revoked = store.revoked_count(),
                    refresh = store.refresh_count(),
                    "Swept expired revocation entries"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (Arc<ManualClock>, TokenRevocationStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = TokenRevocationStore::new(clock.clone());
        (clock, store)
    }

    #[test]
    fn revoked_token_is_reported_until_expiry() {
        let (clock, store) = store();
        let exp = clock.unix() + 60;

        store.revoke_access("tok", exp);
        assert!(store.is_revoked("tok"));
        assert!(store.revoked_at("tok").is_some());
        assert!(!store.is_revoked("other"));

        clock.advance(chrono::Duration::seconds(61));
        assert!(!store.is_revoked("tok"));
        assert_eq!(store.revoked_count(), 0);
    }

    #[test]
    fn revoking_an_expired_token_is_a_noop() {
        let (clock, store) = store();
        store.revoke_access("stale", clock.unix() - 1);
        assert_eq!(store.revoked_count(), 0);
    }

    #[test]
    fn refresh_mapping_lifecycle() {
        let (clock, store) = store();
        store.register_refresh("rt", "alice@example.com", clock.unix() + 3600);

        assert_eq!(store.resolve_refresh("rt").as_deref(), Some("alice@example.com"));
        assert!(store.remove_refresh("rt"));
        assert_eq!(store.resolve_refresh("rt"), None);
        assert!(!store.remove_refresh("rt"));
    }

    #[test]
    fn sweep_evicts_only_expired_entries() {
        let (clock, store) = store();
        let now = clock.unix();
        store.revoke_access("short", now + 10);
        store.revoke_access("long", now + 1000);
        store.register_refresh("rt-short", "a@example.com", now + 10);
        store.register_refresh("rt-long", "b@example.com", now + 1000);

        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.revoked_count(), 1);
        assert_eq!(store.refresh_count(), 1);
        assert!(store.is_revoked("long"));
        assert_eq!(store.resolve_refresh("rt-long").as_deref(), Some("b@example.com"));
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let (clock, store) = store();
        let store = Arc::new(store);
        let exp = clock.unix() + 600;

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let token = format!("tok-{}-{}", t, i);
                        store.revoke_access(&token, exp);
                        assert!(store.is_revoked(&token));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.revoked_count(), 8 * 200);
    }

    #[tokio::test]
    async fn sweeper_runs_on_interval() {
        let (clock, store) = store();
        let store = Arc::new(store);
        store.register_refresh("rt", "a@example.com", clock.unix() + 5);
        clock.advance(chrono::Duration::seconds(6));

        let handle = spawn_revocation_sweeper(store.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.refresh_count(), 0);
        handle.abort();
    }
}
