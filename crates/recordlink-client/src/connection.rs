//! A logged-in connection: transport plus session token.

use std::fmt;
use std::time::Duration;

use recordlink_proto::handshake::is_version_compatible;
use recordlink_proto::{
    Exchange, Handshake, HandshakeResponse, Operation, Request, Response, ResponsePayload,
    Status, PROTOCOL_VERSION,
};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::Error;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Login accepted; requests may be sent.
    Ready,
    /// Logout sent or transport dropped.
    Closed,
}

/// A transport that has completed the login handshake.
pub(crate) struct Connection {
    exchange: Box<dyn Exchange>,
    state: ConnectionState,
    session: u64,
    next_id: u64,
    timeout: Duration,
    company_name: String,
    server_id: String,
}

impl Connection {
    /// Perform the login handshake over a freshly opened transport.
    pub(crate) fn login(
        mut exchange: Box<dyn Exchange>,
        config: &ConnectionConfig,
    ) -> Result<Self, Error> {
        let handshake = Handshake::new(&config.client_id, config.credentials());
        let request = Request::login(1, handshake);

        let response = exchange
            .exchange(&request)
            .map_err(|e| Error::from_exchange(e, config.timeout))?;
        if response.id != request.id && !is_unaddressed_error(&response) {
            return Err(mismatched_id(request.id, response.id));
        }
        if let Status::Error { code, message } = response.status {
            return Err(Error::Connection { code, message });
        }

        let accepted: HandshakeResponse = match response.payload {
            ResponsePayload::LoggedIn(accepted) => accepted,
            other => return Err(unexpected_payload("login", &other)),
        };
        if !is_version_compatible(PROTOCOL_VERSION, accepted.protocol_version) {
            return Err(Error::Protocol(recordlink_proto::Error::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: accepted.protocol_version,
            }));
        }

        Ok(Self {
            exchange,
            state: ConnectionState::Ready,
            session: accepted.session,
            next_id: request.id + 1,
            timeout: config.timeout,
            company_name: accepted.company_name,
            server_id: accepted.server_id,
        })
    }

    /// Send one operation and wait for its answer.
    pub(crate) fn call(&mut self, operation: Operation) -> Result<ResponsePayload, Error> {
        if self.state != ConnectionState::Ready {
            return Err(Error::Protocol(recordlink_proto::Error::InvalidMessage(format!(
                "cannot send request in state {:?}",
                self.state
            ))));
        }

        let id = self.next_id;
        self.next_id += 1;
        let name = operation.name();
        let request = Request::new(id, self.session, operation);

        debug!(request_id = id, operation = name, "sending request");
        let response = self
            .exchange
            .exchange(&request)
            .map_err(|e| Error::from_exchange(e, self.timeout))?;

        if response.id != id && !is_unaddressed_error(&response) {
            return Err(mismatched_id(id, response.id));
        }
        match response.status {
            Status::Ok => Ok(response.payload),
            Status::Error { code, message } => {
                debug!(request_id = id, operation = name, code, "request rejected");
                Err(Error::ServerRejection { code, message })
            }
        }
    }

    /// End the server-side session.
    pub(crate) fn logout(&mut self) -> Result<(), Error> {
        let result = self.call(Operation::Logout);
        self.state = ConnectionState::Closed;
        match result? {
            ResponsePayload::LoggedOut => Ok(()),
            other => Err(unexpected_payload("logout", &other)),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn company_name(&self) -> &str {
        &self.company_name
    }

    pub(crate) fn server_id(&self) -> &str {
        &self.server_id
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("company_name", &self.company_name)
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}

/// A frame the server could not read is answered under id 0.
fn is_unaddressed_error(response: &Response) -> bool {
    response.id == 0 && !response.status.is_ok()
}

fn mismatched_id(expected: u64, actual: u64) -> Error {
    Error::Protocol(recordlink_proto::Error::InvalidMessage(format!(
        "response ID mismatch: expected {}, got {}",
        expected, actual
    )))
}

/// Error for a well-formed response whose payload does not fit the request.
pub(crate) fn unexpected_payload(operation: &str, payload: &ResponsePayload) -> Error {
    Error::Protocol(recordlink_proto::Error::InvalidMessage(format!(
        "unexpected {} response payload: {:?}",
        operation, payload
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlink_proto::error_codes;
    use std::collections::VecDeque;

    /// Replays canned responses and records what was sent.
    struct Scripted {
        replies: VecDeque<Result<Response, recordlink_proto::Error>>,
    }

    impl Exchange for Scripted {
        fn exchange(&mut self, _request: &Request) -> Result<Response, recordlink_proto::Error> {
            self.replies
                .pop_front()
                .unwrap_or(Err(recordlink_proto::Error::Transport("script exhausted".into())))
        }
    }

    fn scripted(replies: Vec<Result<Response, recordlink_proto::Error>>) -> Box<dyn Exchange> {
        Box::new(Scripted {
            replies: replies.into(),
        })
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("dbserver", "SBODemoGB", "manager", "Password").with_trusted(true)
    }

    fn logged_in() -> Result<Response, recordlink_proto::Error> {
        Ok(Response::ok(
            1,
            ResponsePayload::LoggedIn(HandshakeResponse::accept(9, "OEC Computers UK", "srv")),
        ))
    }

    #[test]
    fn test_login_accepted() {
        let connection = Connection::login(scripted(vec![logged_in()]), &config()).unwrap();
        assert_eq!(connection.state(), ConnectionState::Ready);
        assert_eq!(connection.company_name(), "OEC Computers UK");
        assert_eq!(connection.server_id(), "srv");
    }

    #[test]
    fn test_login_rejected() {
        let reply = Ok(Response::error(1, error_codes::AUTH_FAILED, "bad password"));
        let err = Connection::login(scripted(vec![reply]), &config()).unwrap_err();
        assert!(matches!(err, Error::Connection { code: error_codes::AUTH_FAILED, .. }));
    }

    #[test]
    fn test_login_version_mismatch() {
        let mut accepted = HandshakeResponse::accept(9, "OEC", "srv");
        accepted.protocol_version = PROTOCOL_VERSION + 1;
        let reply = Ok(Response::ok(1, ResponsePayload::LoggedIn(accepted)));
        let err = Connection::login(scripted(vec![reply]), &config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(recordlink_proto::Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_call_checks_response_id() {
        let mut connection = Connection::login(
            scripted(vec![logged_in(), Ok(Response::ok(99, ResponsePayload::Pong))]),
            &config(),
        )
        .unwrap();
        let err = connection.call(Operation::Ping).unwrap_err();
        assert!(err.to_string().contains("response ID mismatch"));
    }

    #[test]
    fn test_unreadable_request_keeps_server_failure() {
        let mut connection = Connection::login(
            scripted(vec![
                logged_in(),
                Ok(Response::error(0, error_codes::INVALID_REQUEST, "message too large")),
                Ok(Response::ok(0, ResponsePayload::Pong)),
            ]),
            &config(),
        )
        .unwrap();

        let err = connection.call(Operation::Ping).unwrap_err();
        assert!(matches!(
            err,
            Error::ServerRejection { code: error_codes::INVALID_REQUEST, ref message } if message == "message too large"
        ));

        // Only error answers may come back unaddressed.
        let err = connection.call(Operation::Ping).unwrap_err();
        assert!(err.to_string().contains("response ID mismatch"));
    }

    #[test]
    fn test_login_unreadable_is_connection_failure() {
        let reply = Ok(Response::error(0, error_codes::INVALID_REQUEST, "message too large"));
        let err = Connection::login(scripted(vec![reply]), &config()).unwrap_err();
        assert!(matches!(err, Error::Connection { code: error_codes::INVALID_REQUEST, .. }));
    }

    #[test]
    fn test_call_maps_rejection_and_timeout() {
        let mut connection = Connection::login(
            scripted(vec![
                logged_in(),
                Ok(Response::error(2, error_codes::NOT_FOUND, "No matching records found")),
                Err(recordlink_proto::Error::Timeout),
            ]),
            &config(),
        )
        .unwrap();

        let err = connection.call(Operation::Ping).unwrap_err();
        assert!(matches!(err, Error::ServerRejection { code: error_codes::NOT_FOUND, .. }));

        let err = connection.call(Operation::Ping).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_logout_closes() {
        let mut connection = Connection::login(
            scripted(vec![logged_in(), Ok(Response::ok(2, ResponsePayload::LoggedOut))]),
            &config(),
        )
        .unwrap();
        connection.logout().unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.call(Operation::Ping).is_err());
    }
}
