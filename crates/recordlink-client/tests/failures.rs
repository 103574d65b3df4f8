//! Transport failures, timeouts and connect retry.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recordlink_client::proto::{error_codes, Exchange, Request, Response};
use recordlink_client::{
    client_codes, ConnectRetry, ConnectionConfig, Error, RecordType, Session,
};
use recordlink_server::{LocalExchange, SeedSource};

/// Answers the login, then stops answering.
struct GoesQuiet {
    inner: LocalExchange,
    answered: usize,
}

impl Exchange for GoesQuiet {
    fn exchange(&mut self, request: &Request) -> Result<Response, recordlink_client::proto::Error> {
        if self.answered >= 1 {
            return Err(recordlink_client::proto::Error::Timeout);
        }
        self.answered += 1;
        self.inner.exchange(request)
    }
}

/// Fails to open the transport until `fail_first` attempts have been made.
fn flaky_session(fail_first: u32, config: ConnectionConfig) -> (Session, Arc<AtomicU32>) {
    let server = common::demo_server();
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let connector = move |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= fail_first {
            return Err(Error::Connection {
                code: client_codes::TRANSPORT,
                message: "connection refused".into(),
            });
        }
        Ok(Box::new(LocalExchange::new(server.clone())))
    };
    (Session::with_connector(config, connector), attempts)
}

#[test]
fn test_timeout_after_connect() {
    let server = common::demo_server();
    let config = common::config().with_timeout(Duration::from_millis(250));
    let connector = move |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
        Ok(Box::new(GoesQuiet {
            inner: LocalExchange::new(server.clone()),
            answered: 0,
        }))
    };
    let mut session = Session::with_connector(config, connector);
    session.connect().unwrap();

    let err = session.load(RecordType::User, 40).unwrap_err();
    assert!(matches!(err, Error::Timeout(elapsed) if elapsed == Duration::from_millis(250)));
    assert_eq!(err.code(), client_codes::TIMEOUT);
    assert!(!err.is_caller_fault());
}

#[test]
fn test_timeout_during_login_is_a_connection_error() {
    let server = common::demo_server();
    let connector = move |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
        Ok(Box::new(GoesQuiet {
            inner: LocalExchange::new(server.clone()),
            answered: 1,
        }))
    };
    let mut session = Session::with_connector(common::config(), connector);

    let err = session.connect().unwrap_err();
    assert!(matches!(err, Error::Connection { code, .. } if code == client_codes::TIMEOUT));
    assert!(!session.is_connected());
}

#[test]
fn test_no_retry_by_default() {
    let (mut session, attempts) = flaky_session(1, common::config());

    let err = session.connect().unwrap_err();
    assert_eq!(err.code(), client_codes::TRANSPORT);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_connect_retry_recovers() {
    let retry = ConnectRetry::attempts(3).with_backoff(Duration::from_millis(1));
    let (mut session, attempts) = flaky_session(2, common::config().with_connect_retry(retry));

    session.connect().unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(session.is_connected());
}

#[test]
fn test_connect_retry_gives_up() {
    let retry = ConnectRetry::attempts(2).with_backoff(Duration::from_millis(1));
    let (mut session, attempts) = flaky_session(5, common::config().with_connect_retry(retry));

    assert!(session.connect().is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_rejected_credentials_are_not_retried() {
    let retry = ConnectRetry::attempts(4).with_backoff(Duration::from_millis(1));
    let config = ConnectionConfig::new("localhost", common::COMPANY_DB, "manager", "wrong")
        .with_db_credentials("sa", "sql")
        .with_connect_retry(retry);
    let (mut session, attempts) = flaky_session(0, config);

    let err = session.connect().unwrap_err();
    assert_eq!(err.code(), error_codes::AUTH_FAILED);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_oversized_request_reports_server_failure() {
    let server = common::server_with(
        common::server_config()
            .with_seed(SeedSource::Demo)
            .with_max_message_size(1024),
    );
    let session = common::connected(&server);

    let mut partner = session.create(RecordType::BusinessPartner).unwrap();
    partner
        .set_field("CardCode", "ZZZ002")
        .set_field("CardName", "Z".repeat(4096));
    let err = partner.submit().unwrap_err();

    assert!(matches!(err, Error::ServerRejection { .. }), "{err:?}");
    assert_eq!(err.code(), error_codes::INVALID_REQUEST);
    assert!(err.to_string().contains("too large"), "{err}");
    assert!(session.load(RecordType::BusinessPartner, "ZZZ002").is_err());
    session.ping().unwrap();
}
