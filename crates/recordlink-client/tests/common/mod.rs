//! Shared fixtures: an in-process reference server and sessions bound to it.

#![allow(dead_code)]

use std::sync::Arc;

use recordlink_client::proto::Exchange;
use recordlink_client::{ConnectionConfig, Error, Session};
use recordlink_server::{LocalExchange, RequestHandler, SeedSource, ServerConfig};

pub const COMPANY_DB: &str = "SBODemoGB";

/// A server seeded with the demonstration company.
pub fn demo_server() -> Arc<RequestHandler> {
    server(SeedSource::Demo)
}

/// A server with no records at all.
pub fn empty_server() -> Arc<RequestHandler> {
    server(SeedSource::Empty)
}

fn server(seed: SeedSource) -> Arc<RequestHandler> {
    server_with(server_config().with_seed(seed))
}

/// Settings of the test servers, before seeding.
pub fn server_config() -> ServerConfig {
    ServerConfig::new(COMPANY_DB)
        .with_company_name("OEC Computers UK")
        .with_server_id("local")
        .with_db_credentials("sa", "sql")
}

/// A server running with `config`.
pub fn server_with(config: ServerConfig) -> Arc<RequestHandler> {
    Arc::new(RequestHandler::from_config(config).unwrap())
}

/// Connection parameters accepted by the test servers.
pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("localhost", COMPANY_DB, "manager", "manager")
        .with_db_credentials("sa", "sql")
        .with_client_id("integration-test")
}

/// A disconnected session whose transport is the in-process server.
pub fn session_with(handler: &Arc<RequestHandler>, config: ConnectionConfig) -> Session {
    let handler = handler.clone();
    let connector = move |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
        Ok(Box::new(LocalExchange::new(handler.clone())))
    };
    Session::with_connector(config, connector)
}

/// A connected session on `handler`.
pub fn connected(handler: &Arc<RequestHandler>) -> Session {
    let mut session = session_with(handler, config());
    session.connect().unwrap();
    session
}
