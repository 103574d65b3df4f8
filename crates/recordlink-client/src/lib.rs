//! Session and record client for structured-record servers.
//!
//! This crate opens a logged-in [`Session`] against a company database,
//! builds and submits records through [`RecordHandle`]s, and reads query
//! results through forward-only [`Cursor`]s. Every remote call returns an
//! [`Outcome`]; a failure carries its own `(code, message)` pair through
//! [`Error::failure`].
//!
//! # Example
//!
//! ```no_run
//! use recordlink_client::{ConnectionConfig, DocumentKind, RecordType, Session};
//!
//! let config = ConnectionConfig::load("company.toml")?;
//! let mut session = Session::open(config)?;
//!
//! let mut order = session.create(RecordType::Document(DocumentKind::SalesOrder))?;
//! order.set_field("CardCode", "C20000");
//! let line = order.append_line()?;
//! order.set_line_field(line, "ItemCode", "A00001")?;
//! order.set_line_field(line, "Quantity", 4.0)?;
//! let key = order.submit()?;
//! println!("created sales order {}", key);
//!
//! let mut cursor = session.query("SELECT CardCode, CardName FROM OCRD ORDER BY CardCode")?;
//! for row in cursor.rows() {
//!     println!("{:?}", row?);
//! }
//! cursor.release()?;
//!
//! session.disconnect();
//! # Ok::<(), recordlink_client::Error>(())
//! ```

pub mod config;
mod connection;
pub mod cursor;
pub mod error;
pub mod orchestrate;
pub mod record;
pub mod retry;
pub mod session;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::ConnectionState;
pub use cursor::{Cursor, Rows};
pub use error::{client_codes, Error, Failure, Misuse, Outcome};
pub use record::{Mode, RecordHandle};
pub use retry::ConnectRetry;
pub use session::{Disconnect, Session};
pub use transport::{Connector, NngConnector, NngExchange};

// Re-export commonly used protocol types
pub use recordlink_proto as proto;
pub use recordlink_proto::{
    DocumentKind, FieldValue, KeyKind, Language, LineData, RecordKey, RecordType, ServerKind,
    Value,
};
