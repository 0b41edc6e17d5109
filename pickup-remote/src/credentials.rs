//! In-memory credential store for the Source System bearer token.
//!
//! The store is written out-of-band (operator authorization) and read once
//! per tick. Nothing is persisted; a restart requires re-authorization unless
//! `BLING_ACCESS_TOKEN` seeds the store.

use std::sync::RwLock;

use chrono::Utc;

use pickup_core::{AccessToken, CredentialProvider};

pub const ACCESS_TOKEN_ENV: &str = "BLING_ACCESS_TOKEN";

#[derive(Debug, Default)]
pub struct TokenStore {
    token: RwLock<Option<AccessToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    /// Seed from `BLING_ACCESS_TOKEN` when set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(value) if !value.trim().is_empty() => {
                Self::with_token(AccessToken::new(value.trim(), None))
            }
            _ => Self::new(),
        }
    }

    pub fn set(&self, token: AccessToken) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token);
        tracing::info!("source credential stored");
    }

    pub fn is_authorized(&self) -> bool {
        self.token().is_some()
    }
}

impl CredentialProvider for TokenStore {
    fn token(&self) -> Option<AccessToken> {
        let guard = self.token.read().unwrap_or_else(|e| e.into_inner());
        let token = guard.as_ref()?;
        if token.is_expired(Utc::now()) {
            tracing::warn!(
                expired_at = ?token.expires_at(),
                "source credential expired; re-authorize to resume reconciliation",
            );
            return None;
        }
        Some(token.clone())
    }
}
