//! recordlink reference server.
//!
//! An in-memory record server speaking the recordlink protocol: a record
//! store with per-type validation and defaults, a small SQL subset for
//! read-only queries, logged-in sessions with server-side cursors, and an
//! nng REP transport. Nothing is persisted; the store can be seeded from a
//! JSON file or with a bundled demonstration company.
//!
//! [`LocalExchange`] serves the same handler in-process, which is how the
//! client crate's tests reach it.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod local;
pub mod query;
pub mod seed;
pub mod session;
pub mod store;
pub mod transport;

pub use config::{Args, SeedSource, ServerConfig, UserAccount};
pub use dispatch::{Dispatcher, Reply};
pub use error::{Error, QueryError, StoreError};
pub use handler::RequestHandler;
pub use local::LocalExchange;
pub use seed::SeedData;
pub use store::Store;
pub use transport::{create_transport, StatsSnapshot, Transport};
