//! Current-session capability.
//!
//! Broker and registry calls run on behalf of whoever is signed in to the
//! site. Instead of reading ambient state, the clients receive a
//! [`SessionProvider`] at construction time and ask it for the current
//! session on every request.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// The signed-in user as seen by the file manager.
#[derive(Clone, PartialEq, Eq)]
pub struct CurrentSession {
    /// Display name of the user.
    pub username: String,
    /// Bearer token forwarded to the broker API, if any.
    pub access_token: Option<String>,
}

impl CurrentSession {
    /// Create a session without a token.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

// Keep tokens out of logs.
impl fmt::Debug for CurrentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentSession")
            .field("username", &self.username)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Source of the current session.
pub trait SessionProvider: Send + Sync {
    /// The session requests should be made under, or `None` when anonymous.
    fn current(&self) -> Option<CurrentSession>;
}

/// A session provider whose session can be swapped at runtime
/// (sign-in / sign-out).
#[derive(Debug, Default)]
pub struct SharedSession {
    inner: RwLock<Option<CurrentSession>>,
}

impl SharedSession {
    /// Anonymous session.
    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Session for a signed-in user.
    pub fn signed_in(session: CurrentSession) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Some(session)),
        })
    }

    /// Replace the current session.
    pub fn sign_in(&self, session: CurrentSession) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Drop the current session.
    pub fn sign_out(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionProvider for SharedSession {
    fn current(&self) -> Option<CurrentSession> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Build a session provider from a configured API token.
///
/// An empty token yields an anonymous session.
pub fn from_token(token: &str) -> Arc<SharedSession> {
    if token.is_empty() {
        SharedSession::anonymous()
    } else {
        SharedSession::signed_in(CurrentSession::new("cli").with_token(token))
    }
}
