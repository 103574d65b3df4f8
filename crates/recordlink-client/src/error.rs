//! Client error types and failure reporting.
//!
//! Every failing call returns an [`Error`] that carries its own
//! `(code, message)` pair; there is no "last error" kept on the session.

use std::fmt;
use std::time::Duration;

use recordlink_proto::{KeyKind, RecordType};
use thiserror::Error;

/// Codes for failures detected on the client side. Server codes never
/// fall in this range.
pub mod client_codes {
    /// Connection parameters missing or invalid.
    pub const CONFIGURATION: i32 = -100;
    /// The caller used the API incorrectly.
    pub const MISUSE: i32 = -101;
    /// A round-trip exceeded the configured timeout.
    pub const TIMEOUT: i32 = -102;
    /// The socket could not be opened or failed mid-exchange.
    pub const TRANSPORT: i32 = -103;
    /// The peer sent something that is not a valid response.
    pub const PROTOCOL: i32 = -104;
}

/// Result of any remote operation.
pub type Outcome<T = ()> = Result<T, Error>;

/// The `(code, message)` pair describing a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Non-zero failure code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Ways a caller can use the API incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Misuse {
    /// Operation attempted without a live connection.
    #[error("session is not connected")]
    NotConnected,

    /// `connect` called on a session that is already connected.
    #[error("session is already connected")]
    AlreadyConnected,

    /// Child rows appended to a record type that has none.
    #[error("record type '{0}' does not support lines")]
    LinesUnsupported(RecordType),

    /// Line position that was never appended.
    #[error("line position {position} out of range ({lines} line(s) appended)")]
    LineOutOfRange {
        /// Requested position.
        position: usize,
        /// Number of appended lines.
        lines: usize,
    },

    /// Cursor field index outside the select list.
    #[error("field index {index} out of range ({fields} field(s) selected)")]
    FieldIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of selected fields.
        fields: usize,
    },

    /// Cursor field read before `move_first` or past the last row.
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    /// `move_next` called before `move_first`.
    #[error("cursor must be positioned with move_first before move_next")]
    NotPositioned,

    /// Key shape does not match the record type's key schema.
    #[error("record type '{record_type}' is keyed by {expected:?}, got a {actual:?} key")]
    KeyMismatch {
        /// Record type being loaded.
        record_type: RecordType,
        /// Key shape the record type uses.
        expected: KeyKind,
        /// Key shape supplied.
        actual: KeyKind,
    },
}

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection parameters missing or invalid; detected before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport or login failure while connecting.
    #[error("cannot connect to server: {message} (code {code})")]
    Connection {
        /// Server code, or a client code for local diagnostics.
        code: i32,
        /// Description of the failure.
        message: String,
    },

    /// The server refused an operation.
    #[error("server rejected request: {message} (code {code})")]
    ServerRejection {
        /// Server error code.
        code: i32,
        /// Server error message.
        message: String,
    },

    /// The caller used the API incorrectly.
    #[error("caller error: {0}")]
    Misuse(#[from] Misuse),

    /// A round-trip exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed traffic on an established connection.
    #[error("protocol error: {0}")]
    Protocol(#[from] recordlink_proto::Error),
}

impl Error {
    /// The `(code, message)` pair for this failure.
    pub fn failure(&self) -> Failure {
        let message = match self {
            Error::Connection { message, .. } | Error::ServerRejection { message, .. } => {
                message.clone()
            }
            Error::Configuration(message) => message.clone(),
            Error::Misuse(misuse) => misuse.to_string(),
            Error::Timeout(_) | Error::Protocol(_) => self.to_string(),
        };
        Failure {
            code: self.code(),
            message,
        }
    }

    /// Non-zero failure code.
    pub fn code(&self) -> i32 {
        match self {
            Error::Configuration(_) => client_codes::CONFIGURATION,
            Error::Connection { code, .. } | Error::ServerRejection { code, .. } => *code,
            Error::Misuse(_) => client_codes::MISUSE,
            Error::Timeout(_) => client_codes::TIMEOUT,
            Error::Protocol(_) => client_codes::PROTOCOL,
        }
    }

    /// Programmer errors: surface immediately, never retry.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Misuse(_))
    }

    /// Whether a connect attempt that failed this way may be repeated.
    ///
    /// Only transport failures and timeouts qualify; a server that rejected
    /// the credentials will reject them again.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Connection { code, .. } => {
                *code == client_codes::TRANSPORT || *code == client_codes::TIMEOUT
            }
            _ => false,
        }
    }

    /// Map a transport-level error raised on an established connection.
    pub(crate) fn from_exchange(error: recordlink_proto::Error, timeout: Duration) -> Self {
        match error {
            recordlink_proto::Error::Timeout => Error::Timeout(timeout),
            recordlink_proto::Error::Transport(message) => Error::Connection {
                code: client_codes::TRANSPORT,
                message,
            },
            other => Error::Protocol(other),
        }
    }

    /// Normalise any failure raised while connecting into [`Error::Connection`].
    pub(crate) fn into_connection_error(self) -> Self {
        match self {
            Error::Connection { .. } | Error::Configuration(_) | Error::Misuse(_) => self,
            Error::ServerRejection { code, message } => Error::Connection { code, message },
            Error::Timeout(elapsed) => Error::Connection {
                code: client_codes::TIMEOUT,
                message: format!("no answer within {:?}", elapsed),
            },
            Error::Protocol(e) => Error::Connection {
                code: client_codes::PROTOCOL,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_server_pair() {
        let error = Error::ServerRejection {
            code: -2035,
            message: "This entry already exists in the following tables".into(),
        };
        let failure = error.failure();
        assert_eq!(failure.code, -2035);
        assert_eq!(
            failure.to_string(),
            "This entry already exists in the following tables (code -2035)"
        );
        assert!(error.to_string().contains("-2035"));
        assert!(!error.is_caller_fault());
    }

    #[test]
    fn test_misuse_codes() {
        let error = Error::from(Misuse::LineOutOfRange { position: 3, lines: 2 });
        assert_eq!(error.code(), client_codes::MISUSE);
        assert!(error.is_caller_fault());
        assert_eq!(
            error.failure().message,
            "line position 3 out of range (2 line(s) appended)"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout(Duration::from_secs(1)).is_transient());
        assert!(Error::Connection {
            code: client_codes::TRANSPORT,
            message: "connection refused".into()
        }
        .is_transient());
        assert!(!Error::Connection {
            code: recordlink_proto::error_codes::AUTH_FAILED,
            message: "bad password".into()
        }
        .is_transient());
        assert!(!Error::Configuration("server".into()).is_transient());
    }

    #[test]
    fn test_connection_normalisation() {
        let error = Error::Timeout(Duration::from_secs(2)).into_connection_error();
        assert!(matches!(error, Error::Connection { code: client_codes::TIMEOUT, .. }));
        assert!(error.is_transient());

        let error = Error::ServerRejection {
            code: -5,
            message: "Enter valid user name and password".into(),
        }
        .into_connection_error();
        assert!(matches!(error, Error::Connection { code: -5, .. }));

        let error =
            Error::Protocol(recordlink_proto::Error::InvalidMessage("x".into())).into_connection_error();
        assert_eq!(error.code(), client_codes::PROTOCOL);
    }

    #[test]
    fn test_exchange_mapping() {
        let timeout = Duration::from_millis(250);
        assert!(matches!(
            Error::from_exchange(recordlink_proto::Error::Timeout, timeout),
            Error::Timeout(d) if d == timeout
        ));
        assert_eq!(
            Error::from_exchange(recordlink_proto::Error::Transport("closed".into()), timeout).code(),
            client_codes::TRANSPORT
        );
    }
}
