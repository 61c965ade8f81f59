//! Persisted login credentials.

use std::sync::Arc;

use anyhow::Result;

use quizkit_core::clock::{Clock, SystemClock};
use quizkit_core::model::User;
use quizkit_core::token;
use quizkit_core::traits::KeyValueStore;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
/// Optional hard expiry in epoch milliseconds, checked alongside the JWT claim.
pub const EXPIRY_KEY: &str = "tokenExpiry";

/// Reads and writes the token, user profile and expiry through the host store.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn save(&self, token: &str, user: &User, expiry_ms: Option<i64>) -> Result<()> {
        self.store.set(TOKEN_KEY, token)?;
        self.store.set(USER_KEY, &serde_json::to_string(user)?)?;
        match expiry_ms {
            Some(ms) => self.store.set(EXPIRY_KEY, &ms.to_string())?,
            None => self.store.remove(EXPIRY_KEY)?,
        }
        Ok(())
    }

    /// The stored token, whether or not it is still valid.
    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn expiry_ms(&self) -> Option<i64> {
        self.store.get(EXPIRY_KEY).and_then(|v| v.trim().parse().ok())
    }

    fn is_fresh(&self, token: &str) -> bool {
        let now = self.clock.now();
        token::is_valid(token, now) && !token::is_past_stored_expiry(self.expiry_ms(), now)
    }

    /// The stored token if it is still valid. An expired or malformed token
    /// clears all credentials.
    pub fn valid_token(&self) -> Option<String> {
        let token = self.token()?;
        if self.is_fresh(&token) {
            return Some(token);
        }
        tracing::debug!("stored token expired, clearing credentials");
        self.clear();
        None
    }

    /// Drop expired credentials. Returns whether a valid login remains.
    pub fn check_and_clean(&self) -> bool {
        self.valid_token().is_some()
    }

    /// The stored profile. A profile that no longer parses is removed.
    pub fn user(&self) -> Option<User> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("discarding unreadable user profile: {e}");
                if let Err(e) = self.store.remove(USER_KEY) {
                    tracing::warn!(key = USER_KEY, "failed to clear credential: {e:#}");
                }
                None
            }
        }
    }

    /// Seconds of validity left on the stored token.
    pub fn remaining_secs(&self) -> i64 {
        let now = self.clock.now();
        let Some(token) = self.token() else {
            return 0;
        };
        let by_claim = token::remaining_seconds(&token, now);
        match self.expiry_ms() {
            Some(ms) if ms > 0 => by_claim.min(((ms - now.timestamp_millis()) / 1000).max(0)),
            _ => by_claim,
        }
    }

    /// Remove token, profile and expiry. Storage errors are logged, not raised.
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY, EXPIRY_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, "failed to clear credential: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizkit_core::clock::ManualClock;
    use quizkit_core::mock::MemoryStore;

    fn user() -> User {
        User {
            id: Some(1),
            username: "alice".into(),
            nickname: None,
            email: None,
            role: Some("user".into()),
            permissions: vec![],
        }
    }

    fn creds() -> (CredentialStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let creds = CredentialStore::new(store.clone()).with_clock(Arc::new(ManualClock::at_secs(1_000)));
        (creds, store)
    }

    #[test]
    fn valid_token_is_returned() {
        let (creds, _) = creds();
        creds.save(&token::unsigned_token(5_000), &user(), None).unwrap();
        assert!(creds.valid_token().is_some());
        assert_eq!(creds.user().unwrap().username, "alice");
        assert_eq!(creds.remaining_secs(), 4_000);
    }

    #[test]
    fn expired_token_clears_everything() {
        let (creds, store) = creds();
        creds.save(&token::unsigned_token(500), &user(), Some(9_000_000)).unwrap();
        assert!(creds.valid_token().is_none());
        assert!(store.get(TOKEN_KEY).is_none());
        assert!(store.get(USER_KEY).is_none());
        assert!(store.get(EXPIRY_KEY).is_none());
    }

    #[test]
    fn stored_expiry_overrides_claim() {
        let (creds, _) = creds();
        creds.save(&token::unsigned_token(5_000), &user(), Some(900_000)).unwrap();
        assert!(!creds.check_and_clean());
        assert!(creds.token().is_none());
    }

    #[test]
    fn corrupt_profile_is_dropped() {
        let (creds, store) = creds();
        store.set(USER_KEY, "{broken").unwrap();
        assert!(creds.user().is_none());
        assert!(store.get(USER_KEY).is_none());
    }

    /// Holds one fixed user value and refuses every write.
    struct ReadOnlyStore(String);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            (key == USER_KEY).then(|| self.0.clone())
        }

        fn set(&self, _: &str, _: &str) -> Result<()> {
            anyhow::bail!("read-only")
        }

        fn remove(&self, _: &str) -> Result<()> {
            anyhow::bail!("read-only")
        }
    }

    #[test]
    fn corrupt_profile_survives_storage_errors() {
        let creds = CredentialStore::new(Arc::new(ReadOnlyStore("{broken".into())));
        assert!(creds.user().is_none());
        creds.clear();
    }
}
