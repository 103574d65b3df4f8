//! Server error types.

use recordlink_proto::{error_codes, KeyKind, RecordKey, RecordType};
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Object code not registered.
    #[error("unknown object type {0}")]
    UnknownRecordType(u32),

    /// No record stored under the key.
    #[error("No matching records found ({record_type} '{key}')")]
    NotFound {
        /// Record type searched.
        record_type: RecordType,
        /// Key searched for.
        key: RecordKey,
    },

    /// Another record already uses the key.
    #[error("This entry already exists in the following tables ({table}, key '{key}')")]
    DuplicateKey {
        /// Table holding the record.
        table: &'static str,
        /// Conflicting key.
        key: RecordKey,
    },

    /// Key shape does not match the record type.
    #[error("{record_type} records are keyed by {expected:?}, got a {actual:?} key")]
    KeyMismatch {
        /// Record type addressed.
        record_type: RecordType,
        /// Key shape the record type uses.
        expected: KeyKind,
        /// Key shape supplied.
        actual: KeyKind,
    },

    /// The record failed validation.
    #[error("{0}")]
    Validation(String),
}

impl StoreError {
    /// Wire error code.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::UnknownRecordType(_) => error_codes::UNKNOWN_RECORD_TYPE,
            StoreError::NotFound { .. } => error_codes::NOT_FOUND,
            StoreError::DuplicateKey { .. } => error_codes::DUPLICATE_KEY,
            StoreError::KeyMismatch { .. } => error_codes::INVALID_REQUEST,
            StoreError::Validation(_) => error_codes::VALIDATION,
        }
    }
}

/// Query parsing and execution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The query text could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The query names a table the server does not have.
    #[error("Invalid object name '{0}'")]
    UnknownTable(String),

    /// The query names a column the table does not have.
    #[error("Invalid column name '{0}'")]
    UnknownColumn(String),
}

impl QueryError {
    /// Wire error code.
    pub fn code(&self) -> i32 {
        match self {
            QueryError::Syntax(_) | QueryError::UnknownColumn(_) => error_codes::QUERY_SYNTAX,
            QueryError::UnknownTable(_) => error_codes::UNKNOWN_TABLE,
        }
    }
}

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Record store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query error.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Login refused.
    #[error("{message}")]
    Login {
        /// Wire error code.
        code: i32,
        /// Reason shown to the client.
        message: String,
    },

    /// Session token unknown.
    #[error("invalid session token {0}")]
    InvalidSession(u64),

    /// Cursor identifier unknown.
    #[error("invalid cursor {0}")]
    InvalidCursor(u64),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] recordlink_proto::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Seed data error.
    #[error("seed data error: {0}")]
    Seed(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wire error code for a response.
    pub fn code(&self) -> i32 {
        match self {
            Error::Store(e) => e.code(),
            Error::Query(e) => e.code(),
            Error::Login { code, .. } => *code,
            Error::InvalidSession(_) => error_codes::INVALID_SESSION,
            Error::InvalidCursor(_) => error_codes::INVALID_CURSOR,
            Error::Protocol(_) => error_codes::INVALID_REQUEST,
            Error::Transport(_) | Error::Config(_) | Error::Seed(_) | Error::Io(_) => {
                error_codes::INTERNAL
            }
        }
    }
}
