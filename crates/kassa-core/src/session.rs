//! Per-operator session store for the manual deposit flow. One in-flight
//! session per operator, addressed by a short-lived correlation token so
//! a stale confirm button can never act on a newer session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use kassa_types::models::Provider;

pub const SESSION_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no session in progress")]
    NoSession,
    #[error("session token does not match")]
    TokenMismatch,
    #[error("this step is not expected now")]
    WrongStep,
    #[error("invalid player id")]
    InvalidPlayerId,
    #[error("player rejected: {0}")]
    PlayerRejected(String),
    #[error("desk unavailable: {0}")]
    DeskUnavailable(String),
    #[error("amount out of range")]
    AmountOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualState {
    AwaitingPlayerId {
        provider: Provider,
    },
    AwaitingAmount {
        provider: Provider,
        player_id: String,
        player_name: String,
    },
    AwaitingConfirmation {
        provider: Provider,
        player_id: String,
        player_name: String,
        amount: Decimal,
    },
}

#[derive(Debug, Clone)]
struct Session {
    token: Uuid,
    started: Instant,
    state: ManualState,
}

pub struct SessionStore {
    inner: Mutex<HashMap<i64, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a fresh session for the operator, replacing any leftover
    /// one. Returns the correlation token the later steps must present.
    pub fn begin(&self, operator_id: i64, provider: Provider) -> Uuid {
        let token = Uuid::new_v4();
        let mut sessions = self.inner.lock().unwrap();
        sessions.insert(
            operator_id,
            Session {
                token,
                started: Instant::now(),
                state: ManualState::AwaitingPlayerId { provider },
            },
        );
        token
    }

    /// Current state, if the token matches a live session.
    pub fn state(&self, operator_id: i64, token: Uuid) -> Result<ManualState, SessionError> {
        let mut sessions = self.inner.lock().unwrap();
        Self::purge(&mut sessions, self.ttl);
        let session = sessions.get(&operator_id).ok_or(SessionError::NoSession)?;
        if session.token != token {
            return Err(SessionError::TokenMismatch);
        }
        Ok(session.state.clone())
    }

    /// Replace the state of a live session addressed by token.
    pub fn advance(
        &self,
        operator_id: i64,
        token: Uuid,
        state: ManualState,
    ) -> Result<(), SessionError> {
        let mut sessions = self.inner.lock().unwrap();
        Self::purge(&mut sessions, self.ttl);
        let session = sessions.get_mut(&operator_id).ok_or(SessionError::NoSession)?;
        if session.token != token {
            return Err(SessionError::TokenMismatch);
        }
        session.state = state;
        Ok(())
    }

    /// Remove and return the session. Used by confirm (so a second
    /// confirm finds nothing) and by cancel.
    pub fn take(&self, operator_id: i64, token: Uuid) -> Result<ManualState, SessionError> {
        let mut sessions = self.inner.lock().unwrap();
        Self::purge(&mut sessions, self.ttl);
        match sessions.get(&operator_id) {
            None => Err(SessionError::NoSession),
            Some(session) if session.token != token => Err(SessionError::TokenMismatch),
            Some(_) => Ok(sessions.remove(&operator_id).unwrap().state),
        }
    }

    fn purge(sessions: &mut HashMap<i64, Session>, ttl: Duration) {
        sessions.retain(|_, s| s.started.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_guards_every_access() {
        let store = SessionStore::new(SESSION_TTL);
        let token = store.begin(1, Provider::Melbet);

        assert!(store.state(1, token).is_ok());
        assert_eq!(store.state(1, Uuid::new_v4()), Err(SessionError::TokenMismatch));
        assert_eq!(store.state(2, token), Err(SessionError::NoSession));
    }

    #[test]
    fn a_new_session_invalidates_the_old_token() {
        let store = SessionStore::new(SESSION_TTL);
        let old = store.begin(1, Provider::Melbet);
        let new = store.begin(1, Provider::XBet);

        assert_eq!(store.state(1, old), Err(SessionError::TokenMismatch));
        assert!(store.state(1, new).is_ok());
    }

    #[test]
    fn take_is_single_shot() {
        let store = SessionStore::new(SESSION_TTL);
        let token = store.begin(1, Provider::Melbet);

        assert!(store.take(1, token).is_ok());
        assert_eq!(store.take(1, token), Err(SessionError::NoSession));
    }

    #[test]
    fn sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(0));
        let token = store.begin(1, Provider::Melbet);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.state(1, token), Err(SessionError::NoSession));
    }
}
