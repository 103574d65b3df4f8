//! Request handler for processing client requests.

use std::time::Instant;

use parking_lot::Mutex;
use recordlink_proto::handshake::is_version_compatible;
use recordlink_proto::{
    error_codes, Handshake, HandshakeResponse, Operation, RecordData, RecordKey, Request,
    Response, ResponsePayload, PROTOCOL_VERSION,
};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::query;
use crate::seed::initial_store;
use crate::session::SessionRegistry;
use crate::store::Store;

/// Handles incoming requests and dispatches to appropriate handlers.
///
/// Requests are serialised on the store lock; the session registry has its
/// own lock and the two are never held together.
pub struct RequestHandler {
    config: ServerConfig,
    store: Mutex<Store>,
    sessions: Mutex<SessionRegistry>,
}

impl RequestHandler {
    /// Create a handler serving `store`.
    pub fn new(config: ServerConfig, store: Store) -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::with_idle_timeout(config.session_timeout)),
            config,
            store: Mutex::new(store),
        }
    }

    /// Create a handler whose store is seeded as the configuration says.
    pub fn from_config(config: ServerConfig) -> Result<Self, Error> {
        config.validate()?;
        let store = initial_store(&config.seed)?;
        Ok(Self::new(config, store))
    }

    /// The configuration being served.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of logged-in sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of open cursors across all sessions.
    pub fn cursor_count(&self) -> usize {
        self.sessions.lock().cursor_count()
    }

    /// Drop sessions idle past the configured timeout along with their
    /// cursors. Returns how many were dropped.
    pub fn evict_idle_sessions(&self) -> usize {
        let evicted = self.sessions.lock().evict_idle(Instant::now());
        for (token, session) in &evicted {
            tracing::info!(
                session = token,
                user = %session.user_name,
                client_id = %session.client_id,
                open_cursors = session.cursor_count(),
                "idle session evicted"
            );
        }
        evicted.len()
    }

    /// Run a closure against the record store.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.store.lock())
    }

    /// Handle a request and return a response.
    pub fn handle(&self, request: &Request) -> Response {
        tracing::debug!(
            id = request.id,
            session = request.session,
            operation = request.operation.name(),
            "handling request"
        );
        match self.handle_inner(request) {
            Ok(response) => response,
            Err(e) => self.error_response(request.id, e),
        }
    }

    /// Internal handler that can return errors.
    fn handle_inner(&self, request: &Request) -> Result<Response, Error> {
        let id = request.id;
        let token = request.session;
        let payload = match &request.operation {
            Operation::Login(handshake) => self.handle_login(handshake)?,
            Operation::Ping => ResponsePayload::Pong,
            Operation::Logout => {
                let session = self.sessions.lock().close(token)?;
                tracing::info!(
                    session = token,
                    user = %session.user_name,
                    open_cursors = session.cursor_count(),
                    "session closed"
                );
                ResponsePayload::LoggedOut
            }
            operation => {
                self.sessions.lock().touch(token)?;
                self.handle_session_operation(token, operation)?
            }
        };
        Ok(Response::ok(id, payload))
    }

    fn handle_login(&self, handshake: &Handshake) -> Result<ResponsePayload, Error> {
        if !is_version_compatible(handshake.protocol_version, PROTOCOL_VERSION) {
            return Err(Error::Login {
                code: error_codes::UNSUPPORTED_VERSION,
                message: format!(
                    "unsupported protocol version {} (server speaks {})",
                    handshake.protocol_version, PROTOCOL_VERSION
                ),
            });
        }

        let credentials = &handshake.credentials;
        if !credentials
            .company_db
            .eq_ignore_ascii_case(&self.config.company_db)
        {
            return Err(Error::Login {
                code: error_codes::UNKNOWN_COMPANY,
                message: format!("Company database '{}' not found", credentials.company_db),
            });
        }

        let authenticated = self
            .config
            .account(&credentials.user_name)
            .is_some_and(|account| account.password == credentials.password);
        if !authenticated {
            return Err(Error::Login {
                code: error_codes::AUTH_FAILED,
                message: "Enter a valid user name and password".to_string(),
            });
        }

        if !credentials.use_trusted {
            if let Some(expected) = &self.config.db_credentials {
                if expected.user_name != credentials.db_user_name
                    || expected.password != credentials.db_password
                {
                    return Err(Error::Login {
                        code: error_codes::DB_AUTH_FAILED,
                        message: format!(
                            "Login failed for database user '{}'",
                            credentials.db_user_name
                        ),
                    });
                }
            }
        }

        self.evict_idle_sessions();
        let token = self
            .sessions
            .lock()
            .open(credentials.user_name.as_str(), handshake.client_id.as_str());
        tracing::info!(
            session = token,
            user = %credentials.user_name,
            client_id = %handshake.client_id,
            server_kind = %credentials.server_kind,
            language = credentials.language.code(),
            trusted = credentials.use_trusted,
            "session opened"
        );

        Ok(ResponsePayload::LoggedIn(HandshakeResponse::accept(
            token,
            self.config.company_name.as_str(),
            self.config.server_id.as_str(),
        )))
    }

    fn handle_session_operation(
        &self,
        token: u64,
        operation: &Operation,
    ) -> Result<ResponsePayload, Error> {
        match operation {
            Operation::Add { record_type, data } => {
                let key = self.handle_add(*record_type, data)?;
                Ok(ResponsePayload::Added { key })
            }
            Operation::Load { record_type, key } => {
                let record_type = Store::record_type(*record_type)?;
                let data = self.store.lock().load(record_type, key)?;
                Ok(ResponsePayload::Record {
                    key: key.clone(),
                    data,
                })
            }
            Operation::Update {
                record_type,
                key,
                data,
            } => {
                let record_type = Store::record_type(*record_type)?;
                let key = self.store.lock().update(record_type, key, data.clone())?;
                tracing::debug!(%record_type, %key, "record updated");
                Ok(ResponsePayload::Updated { key })
            }
            Operation::Query { text } => {
                let result = query::run(text, &self.store.lock())?;
                let columns = result.columns.clone();
                let row_count = result.rows.len() as u64;
                let cursor = self.sessions.lock().open_cursor(token, result)?;
                tracing::debug!(cursor, row_count, query = %text, "cursor opened");
                Ok(ResponsePayload::CursorOpened {
                    cursor,
                    columns,
                    row_count,
                })
            }
            Operation::Fetch { cursor, position } => {
                let sessions = self.sessions.lock();
                let result = sessions.cursor(token, *cursor)?;
                let values = usize::try_from(*position)
                    .ok()
                    .and_then(|position| result.rows.get(position))
                    .cloned();
                Ok(ResponsePayload::Row { values })
            }
            Operation::CloseCursor { cursor } => {
                self.sessions.lock().close_cursor(token, *cursor)?;
                Ok(ResponsePayload::CursorClosed)
            }
            Operation::Login(_) | Operation::Logout | Operation::Ping => Err(Error::Protocol(
                recordlink_proto::Error::InvalidMessage(format!(
                    "{} is not a session operation",
                    operation.name()
                )),
            )),
        }
    }

    fn handle_add(&self, record_type: u32, data: &RecordData) -> Result<RecordKey, Error> {
        let record_type = Store::record_type(record_type)?;
        let key = self.store.lock().insert(record_type, data.clone())?;
        tracing::debug!(%record_type, %key, lines = data.lines.len(), "record added");
        Ok(key)
    }

    /// Convert an error to an error response.
    fn error_response(&self, request_id: u64, error: Error) -> Response {
        let code = error.code();
        match &error {
            Error::Login { .. } => tracing::warn!(code, error = %error, "login refused"),
            _ => tracing::debug!(code, error = %error, "request failed"),
        }
        Response::error(request_id, code, error.to_string())
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("company_db", &self.config.company_db)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}
