//! Session lifecycle and the entry points for records and cursors.

use std::fmt;

use parking_lot::Mutex;
use recordlink_proto::{Operation, RecordKey, RecordType, ResponsePayload};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::{unexpected_payload, Connection};
use crate::cursor::Cursor;
use crate::error::{Error, Misuse, Outcome};
use crate::record::RecordHandle;
use crate::transport::{Connector, NngConnector};

/// What `disconnect` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// A live connection was logged out and released.
    Released,
    /// There was no live connection; nothing happened.
    AlreadyClosed,
}

/// A session with one company database on a record server.
///
/// Record handles and cursors borrow the session, so none of them can
/// outlive it or be used across [`Session::disconnect`].
///
/// # Example
///
/// ```no_run
/// use recordlink_client::{ConnectionConfig, RecordType, Session};
///
/// let config = ConnectionConfig::new("dbserver", "SBODemoGB", "manager", "Password")
///     .with_db_credentials("sa", "SQLPassword");
/// let mut session = Session::new(config);
/// session.connect()?;
///
/// let mut partner = session.create(RecordType::BusinessPartner)?;
/// partner.set_field("CardCode", "ZZZ001").set_field("CardName", "ZZZ Test");
/// partner.submit()?;
///
/// session.disconnect();
/// # Ok::<(), recordlink_client::Error>(())
/// ```
pub struct Session {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    connection: Mutex<Option<Connection>>,
}

impl Session {
    /// Create a disconnected session that dials the configured server over nng.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, NngConnector)
    }

    /// Create a disconnected session with a custom transport factory.
    pub fn with_connector(config: ConnectionConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            connection: Mutex::new(None),
        }
    }

    /// Create a session and connect it.
    pub fn open(config: ConnectionConfig) -> Outcome<Self> {
        let mut session = Self::new(config);
        session.connect()?;
        Ok(session)
    }

    /// Session configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Validate the configuration, open the transport and log in.
    ///
    /// Any transport, protocol or login failure comes back as
    /// [`Error::Connection`]; invalid parameters come back as
    /// [`Error::Configuration`] without touching the network.
    pub fn connect(&mut self) -> Outcome<()> {
        if self.connection.get_mut().is_some() {
            return Err(Misuse::AlreadyConnected.into());
        }
        self.config.validate()?;

        let config = &self.config;
        let connector = &self.connector;
        let connection = config.connect_retry.run(|attempt| {
            debug!(attempt, endpoint = %config.endpoint(), "connecting");
            let exchange = connector
                .connect(config)
                .map_err(Error::into_connection_error)?;
            Connection::login(exchange, config).map_err(Error::into_connection_error)
        })?;

        info!(
            company_db = %self.config.company_db,
            company_name = %connection.company_name(),
            server_id = %connection.server_id(),
            user = %self.config.user_name,
            "connected"
        );
        *self.connection.get_mut() = Some(connection);
        Ok(())
    }

    /// Log out and release the connection.
    ///
    /// Safe to call any number of times; only the first call on a live
    /// session does anything.
    pub fn disconnect(&mut self) -> Disconnect {
        match self.connection.get_mut().take() {
            Some(mut connection) => {
                if let Err(e) = connection.logout() {
                    warn!(error = %e, "logout failed; dropping connection");
                }
                info!(company_db = %self.config.company_db, "disconnected");
                Disconnect::Released
            }
            None => Disconnect::AlreadyClosed,
        }
    }

    /// Whether the session holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Display name of the connected company, if connected.
    pub fn company_name(&self) -> Option<String> {
        self.connection
            .lock()
            .as_ref()
            .map(|c| c.company_name().to_string())
    }

    /// Identifier of the connected server, if connected.
    pub fn server_id(&self) -> Option<String> {
        self.connection
            .lock()
            .as_ref()
            .map(|c| c.server_id().to_string())
    }

    /// Round-trip a ping.
    pub fn ping(&self) -> Outcome<()> {
        match self.call(Operation::Ping)? {
            ResponsePayload::Pong => Ok(()),
            other => Err(unexpected_payload("ping", &other)),
        }
    }

    /// Start a new record of the given type.
    pub fn create(&self, record_type: RecordType) -> Outcome<RecordHandle<'_>> {
        self.ensure_connected()?;
        Ok(RecordHandle::new(self, record_type))
    }

    /// Fetch a stored record by key.
    pub fn load(&self, record_type: RecordType, key: impl Into<RecordKey>) -> Outcome<RecordHandle<'_>> {
        let key = key.into();
        let expected = record_type.key_kind();
        if key.kind() != expected {
            return Err(Misuse::KeyMismatch {
                record_type,
                expected,
                actual: key.kind(),
            }
            .into());
        }

        let payload = self.call(Operation::Load {
            record_type: record_type.code(),
            key,
        })?;
        match payload {
            ResponsePayload::Record { key, data } => {
                Ok(RecordHandle::loaded(self, record_type, key, data))
            }
            other => Err(unexpected_payload("load", &other)),
        }
    }

    /// Run a read query and open a cursor over its result.
    pub fn query(&self, text: &str) -> Outcome<Cursor<'_>> {
        let payload = self.call(Operation::Query {
            text: text.to_string(),
        })?;
        match payload {
            ResponsePayload::CursorOpened {
                cursor,
                columns,
                row_count,
            } => {
                debug!(cursor, row_count, "cursor opened");
                Ok(Cursor::new(self, cursor, text, columns, row_count))
            }
            other => Err(unexpected_payload("query", &other)),
        }
    }

    /// Send one operation over the live connection.
    pub(crate) fn call(&self, operation: Operation) -> Outcome<ResponsePayload> {
        let mut guard = self.connection.lock();
        let connection = guard.as_mut().ok_or(Misuse::NotConnected)?;
        connection.call(operation)
    }

    fn ensure_connected(&self) -> Outcome<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Misuse::NotConnected.into())
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.connection.get_mut().is_some() {
            warn!(company_db = %self.config.company_db, "session dropped while connected");
            self.disconnect();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::client_codes;
    use recordlink_proto::Exchange;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("dbserver", "SBODemoGB", "manager", "Password")
            .with_db_credentials("sa", "SQLPassword")
    }

    fn refusing(_: &ConnectionConfig) -> Result<Box<dyn Exchange>, Error> {
        Err(Error::Connection {
            code: client_codes::TRANSPORT,
            message: "connection refused".into(),
        })
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let mut session = Session::with_connector(config(), refusing);
        assert!(!session.is_connected());
        assert_eq!(session.company_name(), None);
        assert_eq!(session.disconnect(), Disconnect::AlreadyClosed);
    }

    #[test]
    fn test_operations_require_connection() {
        let session = Session::with_connector(config(), refusing);
        assert!(matches!(
            session.create(RecordType::BusinessPartner),
            Err(Error::Misuse(Misuse::NotConnected))
        ));
        assert!(matches!(
            session.query("SELECT CardCode FROM OCRD"),
            Err(Error::Misuse(Misuse::NotConnected))
        ));
        assert!(matches!(session.ping(), Err(Error::Misuse(Misuse::NotConnected))));
    }

    #[test]
    fn test_invalid_config_fails_before_network() {
        let connector = |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
            panic!("connector must not be called for an invalid configuration")
        };
        let mut session = Session::with_connector(
            ConnectionConfig::new("", "SBODemoGB", "manager", "Password"),
            connector,
        );
        assert!(matches!(session.connect(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        let mut session = Session::with_connector(config(), refusing);
        let err = session.connect().unwrap_err();
        assert!(matches!(err, Error::Connection { code: client_codes::TRANSPORT, .. }));
        assert!(!session.is_connected());
    }

    #[test]
    fn test_load_rejects_wrong_key_shape() {
        let session = Session::with_connector(config(), refusing);
        let err = session.load(RecordType::User, "manager").unwrap_err();
        assert!(matches!(
            err,
            Error::Misuse(Misuse::KeyMismatch {
                record_type: RecordType::User,
                ..
            })
        ));
    }
}
