//! recordlink protocol types and serialization.
//!
//! This crate defines the wire protocol spoken between a recordlink client
//! and a structured-record server, using rkyv for serialization.
//!
//! # Modules
//!
//! - [`value`] - Scalar values for fields and query results
//! - [`record`] - Record-type table, keys and record payloads
//! - [`message`] - Request/response message wrappers and error codes
//! - [`handshake`] - Login negotiation types
//! - [`framing`] - Length-prefix framing and the message codec
//! - [`exchange`] - The request/response seam implemented by transports
//! - [`error`] - Protocol error types

pub mod error;
pub mod exchange;
pub mod framing;
pub mod handshake;
pub mod message;
pub mod record;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use exchange::Exchange;
pub use handshake::{Credentials, Handshake, HandshakeResponse, Language, ServerKind};
pub use message::{error_codes, Operation, Request, Response, ResponsePayload, Status};
pub use record::{
    DocumentKind, FieldValue, KeyKind, LineData, RecordData, RecordKey, RecordType,
    RecordTypeInfo,
};
pub use value::Value;

/// Protocol version for wire compatibility.
///
/// Sent in the login handshake; the server refuses any other version.
pub const PROTOCOL_VERSION: u32 = 1;
