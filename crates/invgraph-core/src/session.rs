//! # Session Registry
//!
//! Volatile login sessions and password digests.
//!
//! - Sessions live in memory only and are lost on restart.
//! - A user holds at most one session per [`SessionType`]: opening a
//!   second one of the same type evicts the first.
//! - Unknown tokens are authorization failures.
//!
//! Passwords are stored as `<salt>$<digest>`, both hex encoded, where the
//! digest is BLAKE3 over salt and password. Digests are compared in
//! constant time.

use crate::messages;
use crate::types::model::{Session, SessionType, UserProfile};
use crate::types::{ErrorMessage, InventoryError, NodeId, now_millis};
use parking_lot::RwLock;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

// =============================================================================
// PASSWORDS
// =============================================================================

fn digest(salt: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

/// Salted digest of a password, ready to be stored.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password).to_hex())
}

/// Check a password against a stored digest. Malformed digests never match.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = blake3::Hash::from_hex(expected) else {
        return false;
    };
    digest(salt, password)
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into()
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Concurrent token -> session map.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for an authenticated user, evicting the session of
    /// the same type the user may already hold.
    pub fn open(&self, user: UserProfile, session_type: SessionType, ip_address: &str) -> Session {
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user,
            session_type,
            ip_address: ip_address.to_string(),
            created_at: now_millis(),
        };
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user.id != session.user.id || s.session_type != session_type);
        if sessions.len() != before {
            tracing::info!(
                event = "session_evicted",
                user = %session.user.name,
                reason = "same_session_type",
                "Previous session replaced"
            );
        }
        sessions.insert(session.token.clone(), session.clone());
        tracing::info!(
            event = "session_opened",
            user = %session.user.name,
            session_type = ?session_type,
            "Session opened"
        );
        session
    }

    /// True if `token` names a live session of `user`.
    pub fn is_session_valid(&self, user: &str, token: &str) -> bool {
        self.sessions
            .read()
            .get(token)
            .is_some_and(|s| s.user.name == user)
    }

    pub fn get_session(&self, token: &str) -> Result<Session, InventoryError> {
        self.sessions
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| unknown_token(token))
    }

    pub fn get_user_in_session(&self, token: &str) -> Result<UserProfile, InventoryError> {
        self.get_session(token).map(|s| s.user)
    }

    pub fn close_session(&self, token: &str) -> Result<Session, InventoryError> {
        let session = self
            .sessions
            .write()
            .remove(token)
            .ok_or_else(|| unknown_token(token))?;
        tracing::info!(event = "session_closed", user = %session.user.name, "Session closed");
        Ok(session)
    }

    /// Drop every session of a user. Returns how many were closed.
    pub fn close_user_sessions(&self, user: NodeId) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user.id != user);
        before - sessions.len()
    }

    /// Replace the profile held by the sessions of `user.id`.
    pub fn refresh_user(&self, user: &UserProfile) {
        for session in self.sessions.write().values_mut() {
            if session.user.id == user.id {
                session.user = user.clone();
            }
        }
    }

    pub fn has_sessions(&self, user: NodeId) -> bool {
        self.sessions.read().values().any(|s| s.user.id == user)
    }

    /// Snapshot of the open sessions, oldest first.
    pub fn sessions(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.sessions.read().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.token.cmp(&b.token)));
        all
    }
}

fn unknown_token(token: &str) -> InventoryError {
    tracing::warn!(
        event = "auth_failure",
        reason = "unknown_session",
        "Session token is not registered"
    );
    InventoryError::NotAuthorized(ErrorMessage::new(messages::SESSION_NOT_FOUND).arg(token))
}

// =============================================================================
// TESTS
// =============================================================================
