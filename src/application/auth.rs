//! Operator login and session tokens for the client API and preview site.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no operator password configured")]
    NotConfigured,
}

#[derive(Clone)]
pub struct AuthService {
    username: String,
    password_sha256: Option<Vec<u8>>,
    session_ttl: Duration,
    /// Open sessions and the instant each one expires.
    sessions: Arc<DashMap<Uuid, OffsetDateTime>>,
}

impl AuthService {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            username: settings.username.clone(),
            password_sha256: settings.password_sha256.clone(),
            session_ttl: settings.session_ttl,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Check the operator credentials and open a session.
    pub fn login(&self, username: &str, password: &str) -> Result<Uuid, AuthError> {
        self.login_at(username, password, OffsetDateTime::now_utc())
    }

    fn login_at(
        &self,
        username: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<Uuid, AuthError> {
        let Some(expected) = &self.password_sha256 else {
            warn!(
                target = "application::auth",
                "login attempted but no password is configured"
            );
            return Err(AuthError::NotConfigured);
        };

        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let password_ok = expected.as_slice().ct_eq(&hash_password(password));
        if (user_ok & password_ok).unwrap_u8() == 0 {
            warn!(target = "application::auth", username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.prune_expired(now);
        let token = Uuid::new_v4();
        self.sessions.insert(token, now + self.session_ttl);
        info!(target = "application::auth", username, "session opened");
        Ok(token)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.is_valid_at(token, OffsetDateTime::now_utc())
    }

    /// An expired token is dropped on first sight.
    fn is_valid_at(&self, token: &str, now: OffsetDateTime) -> bool {
        let Ok(token) = Uuid::parse_str(token) else {
            return false;
        };
        if self
            .sessions
            .remove_if(&token, |_, expires| *expires <= now)
            .is_some()
        {
            debug!(target = "application::auth", %token, "session expired");
            return false;
        }
        self.sessions.contains_key(&token)
    }

    fn prune_expired(&self, now: OffsetDateTime) {
        self.sessions.retain(|_, expires| *expires > now);
    }

    pub fn logout(&self, token: &str) {
        if let Ok(token) = Uuid::parse_str(token) {
            self.sessions.remove(&token);
        }
    }
}

/// SHA-256 digest of an operator password.
pub fn hash_password(password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
