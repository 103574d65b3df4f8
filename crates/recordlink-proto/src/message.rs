//! Request and response message types.

use rkyv::{Archive, Deserialize, Serialize};

use crate::handshake::{Handshake, HandshakeResponse};
use crate::record::{RecordData, RecordKey};
use crate::value::Value;

/// A request from client to server.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier for correlation.
    pub id: u64,
    /// Session token from the login handshake (0 before login).
    pub session: u64,
    /// The operation to perform.
    pub operation: Operation,
}

/// Operations that can be requested.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Operation {
    /// Log in to a company database.
    Login(Handshake),
    /// End the session and release its cursors.
    Logout,
    /// Ping the server (for health checks).
    Ping,
    /// Insert a new record with all of its child rows.
    Add {
        /// Object code of the record type.
        record_type: u32,
        /// Header fields and child rows.
        data: RecordData,
    },
    /// Fetch a record by key.
    Load {
        /// Object code of the record type.
        record_type: u32,
        /// Key of the record.
        key: RecordKey,
    },
    /// Replace the state of a stored record.
    Update {
        /// Object code of the record type.
        record_type: u32,
        /// Key the record was loaded with.
        key: RecordKey,
        /// Full current state of the record.
        data: RecordData,
    },
    /// Run a read query and open a cursor over its result.
    Query {
        /// Query text.
        text: String,
    },
    /// Read one row of an open cursor.
    Fetch {
        /// Cursor identifier.
        cursor: u64,
        /// Zero-based row position.
        position: u64,
    },
    /// Release an open cursor.
    CloseCursor {
        /// Cursor identifier.
        cursor: u64,
    },
}

impl Operation {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Login(_) => "login",
            Operation::Logout => "logout",
            Operation::Ping => "ping",
            Operation::Add { .. } => "add",
            Operation::Load { .. } => "load",
            Operation::Update { .. } => "update",
            Operation::Query { .. } => "query",
            Operation::Fetch { .. } => "fetch",
            Operation::CloseCursor { .. } => "close_cursor",
        }
    }
}

impl Request {
    /// Create a request within a session.
    pub fn new(id: u64, session: u64, operation: Operation) -> Self {
        Self {
            id,
            session,
            operation,
        }
    }

    /// Create a login request.
    pub fn login(id: u64, handshake: Handshake) -> Self {
        Self::new(id, 0, Operation::Login(handshake))
    }
}

/// A response from server to client.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response correlates to.
    pub id: u64,
    /// Response status.
    pub status: Status,
    /// Response payload.
    pub payload: ResponsePayload,
}

/// Response status.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Request failed with an error.
    Error {
        /// Non-zero error code for programmatic handling.
        code: i32,
        /// Human-readable error message.
        message: String,
    },
}

impl Status {
    /// Create an error status.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Status::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is a success status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Check if this is an error status.
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }
}

/// Response payload variants.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Login accepted.
    LoggedIn(HandshakeResponse),
    /// Session ended.
    LoggedOut,
    /// Pong response to ping.
    Pong,
    /// Record inserted; carries the key it was stored under.
    Added {
        /// Key of the new record.
        key: RecordKey,
    },
    /// Record state after a load.
    Record {
        /// Key of the record.
        key: RecordKey,
        /// Header fields and child rows.
        data: RecordData,
    },
    /// Record updated; carries the key it is now stored under.
    Updated {
        /// Key of the record after the update.
        key: RecordKey,
    },
    /// Cursor opened over a query result.
    CursorOpened {
        /// Cursor identifier.
        cursor: u64,
        /// Column names in select-list order.
        columns: Vec<String>,
        /// Number of rows in the result.
        row_count: u64,
    },
    /// One cursor row, or `None` past the last row.
    Row {
        /// Column values in select-list order.
        values: Option<Vec<Value>>,
    },
    /// Cursor released.
    CursorClosed,
    /// Empty payload (for errors).
    Empty,
}

impl Response {
    /// Create a successful response.
    pub fn ok(id: u64, payload: ResponsePayload) -> Self {
        Self {
            id,
            status: Status::Ok,
            payload,
        }
    }

    /// Create an error response.
    pub fn error(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::error(code, message),
            payload: ResponsePayload::Empty,
        }
    }
}

/// Standard server error codes. Zero is reserved for success.
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: i32 = -1;
    /// Invalid request format.
    pub const INVALID_REQUEST: i32 = -2;
    /// Protocol version not supported.
    pub const UNSUPPORTED_VERSION: i32 = -3;
    /// Company database does not exist on this server.
    pub const UNKNOWN_COMPANY: i32 = -4;
    /// User name or password rejected.
    pub const AUTH_FAILED: i32 = -5;
    /// Database credentials rejected.
    pub const DB_AUTH_FAILED: i32 = -6;
    /// Session token unknown or expired.
    pub const INVALID_SESSION: i32 = -7;
    /// Object code not registered.
    pub const UNKNOWN_RECORD_TYPE: i32 = -8;
    /// Record not found.
    pub const NOT_FOUND: i32 = -2028;
    /// A record with the same key already exists.
    pub const DUPLICATE_KEY: i32 = -2035;
    /// Record failed validation.
    pub const VALIDATION: i32 = -5002;
    /// Query text could not be parsed.
    pub const QUERY_SYNTAX: i32 = -1001;
    /// Query names a table the server does not have.
    pub const UNKNOWN_TABLE: i32 = -1002;
    /// Cursor identifier unknown.
    pub const INVALID_CURSOR: i32 = -1003;
}
