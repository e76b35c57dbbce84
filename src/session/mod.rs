//! 会话存储边界：令牌读写与会话清理（幂等）。
//!
//! Session storage boundary.
//!
//! The request layer only reads the bearer token and, on `auth`/`forbidden`,
//! clears the whole session. It never parses token contents. Stores are plain
//! key-value maps: `set` overwrites (last writer wins) and `clear_session` is
//! idempotent, which is all the concurrency story there is.

mod keyring_store;

pub use keyring_store::KeyringSessionStore;

use std::collections::HashMap;
use std::sync::RwLock;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";
pub const ONBOARDING_KEY: &str = "hasSeenOnboarding";

/// Every key removed by [`SessionStore::clear_session`].
pub const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, ONBOARDING_KEY];

pub trait SessionStore: Send + Sync {
    fn get_value(&self, key: &str) -> Option<String>;
    fn set_value(&self, key: &str, value: &str);
    fn remove_value(&self, key: &str);

    fn get_token(&self) -> Option<String> {
        self.get_value(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    fn set_token(&self, token: &str) {
        self.set_value(TOKEN_KEY, token);
    }

    /// Drop token, refresh token, cached user and onboarding flags.
    fn clear_session(&self) {
        for key in SESSION_KEYS {
            self.remove_value(key);
        }
    }
}

/// Process-local store, for tests and headless tools.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(&token.into());
        store
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    fn set_value(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove_value(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_token_overwrites() {
        let store = InMemorySessionStore::with_token("a");
        store.set_token("b");
        assert_eq!(store.get_token().as_deref(), Some("b"));
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let store = InMemorySessionStore::with_token("");
        assert!(store.get_token().is_none());
    }

    #[test]
    fn clear_session_is_idempotent_and_scoped() {
        let store = InMemorySessionStore::with_token("t");
        store.set_value(USER_KEY, r#"{"id":1}"#);
        store.set_value(ONBOARDING_KEY, "true");
        store.set_value("theme", "dark");

        store.clear_session();
        store.clear_session();

        assert!(store.get_token().is_none());
        assert!(store.get_value(USER_KEY).is_none());
        assert!(store.get_value(ONBOARDING_KEY).is_none());
        assert_eq!(store.get_value("theme").as_deref(), Some("dark"));
        assert_eq!(store.len(), 1);
    }
}
