//! Login and session bookkeeping.

use rand::Rng;
use rand_distr::Alphanumeric;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifetime of a session, also sent as the cookie `Max-Age`.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Open sessions beyond this evict the oldest one.
pub const MAX_SESSIONS: usize = 64;

/// Decides whether a login attempt is accepted.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, user_handle: &str) -> bool;
}

/// Accepts exactly one configured user handle.
pub struct SingleUserAuthenticator {
    user_handle: String,
}

impl SingleUserAuthenticator {
    pub fn new<S: Into<String>>(user_handle: S) -> Self {
        Self {
            user_handle: user_handle.into(),
        }
    }
}

impl Authenticator for SingleUserAuthenticator {
    fn authenticate(&self, user_handle: &str) -> bool {
        user_handle.trim() == self.user_handle
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn generate() -> SessionToken {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        SessionToken(random_string)
    }
}

/// Tokens of the currently open sessions with their opening time.
/// Sessions do not survive a restart.
pub struct SessionStore {
    tokens: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL, MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self) -> SessionToken {
        let token = SessionToken::generate();
        let mut tokens = self.tokens();
        tokens.retain(|_, opened_at| opened_at.elapsed() < self.ttl);
        while tokens.len() >= self.max_sessions {
            let oldest = tokens
                .iter()
                .min_by_key(|(_, opened_at)| **opened_at)
                .map(|(token, _)| token.clone());
            match oldest {
                Some(oldest) => {
                    debug!("Evicting oldest session");
                    tokens.remove(&oldest);
                }
                None => break,
            }
        }
        tokens.insert(token.0.clone(), Instant::now());
        debug!("Opened session, {} active", tokens.len());
        token
    }

    pub fn is_open(&self, token: &str) -> bool {
        let mut tokens = self.tokens();
        let expired = match tokens.get(token) {
            Some(opened_at) => opened_at.elapsed() >= self.ttl,
            None => return false,
        };
        if expired {
            debug!("Session expired");
            tokens.remove(token);
        }
        !expired
    }

    /// Returns false if the session was not open.
    pub fn close(&self, token: &str) -> bool {
        self.tokens().remove(token).is_some()
    }
}
