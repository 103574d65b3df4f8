//! Transport used by a session: the nng REQ socket, or anything else that
//! implements [`Exchange`].

use std::fmt;

use nng::options::{Options, RecvMaxSize, RecvTimeout, SendTimeout};
use nng::{Message, Protocol, Socket};
use recordlink_proto::framing::{decode_response, encode_request};
use recordlink_proto::{Exchange, Request, Response};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{client_codes, Error};

/// Opens the transport for a session.
pub trait Connector: Send + Sync {
    /// Open a transport to the server named by `config`.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Exchange>, Error>;
}

impl<F> Connector for F
where
    F: Fn(&ConnectionConfig) -> Result<Box<dyn Exchange>, Error> + Send + Sync,
{
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Exchange>, Error> {
        self(config)
    }
}

/// Default connector: dials the configured endpoint over nng.
#[derive(Debug, Clone, Copy, Default)]
pub struct NngConnector;

impl Connector for NngConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Exchange>, Error> {
        Ok(Box::new(NngExchange::dial(config)?))
    }
}

/// A blocking nng REQ socket.
pub struct NngExchange {
    socket: Socket,
    endpoint: String,
    max_message_size: usize,
}

impl NngExchange {
    /// Open a REQ socket and dial the configured endpoint.
    pub fn dial(config: &ConnectionConfig) -> Result<Self, Error> {
        let endpoint = config.endpoint();
        let transport = |message: String| Error::Connection {
            code: client_codes::TRANSPORT,
            message,
        };

        let socket = Socket::new(Protocol::Req0)
            .map_err(|e| transport(format!("failed to create socket: {}", e)))?;

        socket
            .set_opt::<RecvMaxSize>(config.max_message_size)
            .map_err(|e| transport(format!("failed to set max message size: {}", e)))?;
        socket
            .set_opt::<SendTimeout>(Some(config.timeout))
            .map_err(|e| transport(format!("failed to set send timeout: {}", e)))?;
        socket
            .set_opt::<RecvTimeout>(Some(config.timeout))
            .map_err(|e| transport(format!("failed to set recv timeout: {}", e)))?;

        socket.dial(&endpoint).map_err(|e| match e {
            nng::Error::TimedOut => Error::Timeout(config.timeout),
            _ => transport(format!("failed to connect to {}: {}", endpoint, e)),
        })?;

        debug!(endpoint = %endpoint, "socket dialled");

        Ok(Self {
            socket,
            endpoint,
            max_message_size: config.max_message_size,
        })
    }

    /// Endpoint this socket is dialled to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Exchange for NngExchange {
    fn exchange(&mut self, request: &Request) -> Result<Response, recordlink_proto::Error> {
        let frame = encode_request(request)?;
        if frame.len() > self.max_message_size {
            return Err(recordlink_proto::Error::InvalidMessage(format!(
                "request too large: {} bytes (max: {})",
                frame.len(),
                self.max_message_size
            )));
        }

        self.socket
            .send(Message::from(frame.as_slice()))
            .map_err(|(_, e)| map_nng_error("send request", e))?;

        let reply = self
            .socket
            .recv()
            .map_err(|e| map_nng_error("receive response", e))?;

        decode_response(reply.as_slice())
    }
}

impl Drop for NngExchange {
    fn drop(&mut self) {
        self.socket.close();
    }
}

impl fmt::Debug for NngExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NngExchange")
            .field("endpoint", &self.endpoint)
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

fn map_nng_error(action: &str, error: nng::Error) -> recordlink_proto::Error {
    match error {
        nng::Error::TimedOut => recordlink_proto::Error::Timeout,
        other => recordlink_proto::Error::Transport(format!("failed to {}: {}", action, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn connect_error(config: &ConnectionConfig) -> Error {
        match NngConnector.connect(config) {
            Ok(_) => panic!("connect to {} unexpectedly succeeded", config.endpoint()),
            Err(e) => e,
        }
    }

    #[test]
    fn test_dial_refused_is_transport_failure() {
        let config = ConnectionConfig::new("tcp://127.0.0.1:1", "SBODemoGB", "manager", "Password")
            .with_timeout(Duration::from_millis(200));
        let err = connect_error(&config);
        assert!(err.is_transient(), "unexpected error: {}", err);
    }

    #[test]
    fn test_bad_endpoint_scheme() {
        let config = ConnectionConfig::new("bogus://nowhere", "SBODemoGB", "manager", "Password");
        let err = connect_error(&config);
        assert_eq!(err.code(), client_codes::TRANSPORT);
    }

    #[test]
    fn test_nng_error_mapping() {
        assert!(matches!(
            map_nng_error("send request", nng::Error::TimedOut),
            recordlink_proto::Error::Timeout
        ));
        assert!(matches!(
            map_nng_error("send request", nng::Error::Closed),
            recordlink_proto::Error::Transport(m) if m.starts_with("failed to send request")
        ));
    }
}
