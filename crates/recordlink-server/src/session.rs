//! Logged-in sessions and their open cursors.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::query::ResultSet;

/// State kept for one logged-in client.
#[derive(Debug)]
pub struct SessionState {
    /// Application user that logged in.
    pub user_name: String,
    /// Client identifier from the handshake.
    pub client_id: String,
    cursors: HashMap<u64, ResultSet>,
    last_seen: Instant,
}

impl SessionState {
    /// Time since the session last made a request.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Number of open cursors.
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }
}

/// Registry of sessions, keyed by session token.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<u64, SessionState>,
    next_session: u64,
    next_cursor: u64,
    idle_timeout: Option<Duration>,
}

impl SessionRegistry {
    /// Create an empty registry whose sessions never expire.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_session: 1,
            next_cursor: 1,
            idle_timeout: None,
        }
    }

    /// Create an empty registry that evicts sessions idle longer than `timeout`.
    pub fn with_idle_timeout(timeout: Option<Duration>) -> Self {
        Self {
            idle_timeout: timeout,
            ..Self::new()
        }
    }

    /// Register a session and return its token.
    pub fn open(&mut self, user_name: impl Into<String>, client_id: impl Into<String>) -> u64 {
        let token = self.next_session;
        self.next_session += 1;
        self.sessions.insert(
            token,
            SessionState {
                user_name: user_name.into(),
                client_id: client_id.into(),
                cursors: HashMap::new(),
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// End a session, dropping its cursors.
    pub fn close(&mut self, token: u64) -> Result<SessionState, Error> {
        self.sessions.remove(&token).ok_or(Error::InvalidSession(token))
    }

    /// Look up a session.
    pub fn get(&self, token: u64) -> Result<&SessionState, Error> {
        self.sessions.get(&token).ok_or(Error::InvalidSession(token))
    }

    /// Look up a session and mark it as active.
    pub fn touch(&mut self, token: u64) -> Result<&SessionState, Error> {
        let session = self
            .sessions
            .get_mut(&token)
            .ok_or(Error::InvalidSession(token))?;
        session.last_seen = Instant::now();
        Ok(session)
    }

    /// Remove every session idle for longer than the timeout as of `now`,
    /// dropping its cursors.
    pub fn evict_idle(&mut self, now: Instant) -> Vec<(u64, SessionState)> {
        let Some(timeout) = self.idle_timeout else {
            return Vec::new();
        };
        let expired: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.idle_for(now) > timeout)
            .map(|(token, _)| *token)
            .collect();
        expired
            .into_iter()
            .filter_map(|token| self.sessions.remove(&token).map(|session| (token, session)))
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Open cursors across all sessions.
    pub fn cursor_count(&self) -> usize {
        self.sessions.values().map(SessionState::cursor_count).sum()
    }

    /// Keep a result set open for a session and return its cursor id.
    pub fn open_cursor(&mut self, token: u64, result: ResultSet) -> Result<u64, Error> {
        let session = self
            .sessions
            .get_mut(&token)
            .ok_or(Error::InvalidSession(token))?;
        let cursor = self.next_cursor;
        self.next_cursor += 1;
        session.cursors.insert(cursor, result);
        Ok(cursor)
    }

    /// Read the cursor of a session.
    pub fn cursor(&self, token: u64, cursor: u64) -> Result<&ResultSet, Error> {
        self.get(token)?
            .cursors
            .get(&cursor)
            .ok_or(Error::InvalidCursor(cursor))
    }

    /// Release a cursor.
    pub fn close_cursor(&mut self, token: u64, cursor: u64) -> Result<(), Error> {
        let session = self
            .sessions
            .get_mut(&token)
            .ok_or(Error::InvalidSession(token))?;
        session
            .cursors
            .remove(&cursor)
            .map(|_| ())
            .ok_or(Error::InvalidCursor(cursor))
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
