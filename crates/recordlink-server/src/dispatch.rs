//! Frame in, frame out: the step shared by the socket workers and
//! [`crate::LocalExchange`].

use std::sync::Arc;

use recordlink_proto::framing::{decode_request, encode_response};
use recordlink_proto::{error_codes, Response};
use tracing::{error, warn};

use crate::error::Error;
use crate::handler::RequestHandler;

/// Answer produced for one inbound frame.
#[derive(Debug)]
pub struct Reply {
    /// Encoded response frame.
    pub frame: Vec<u8>,
    /// Whether the response carries an `Ok` status.
    pub accepted: bool,
}

/// Decodes request frames, runs them through the handler and encodes the
/// response.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<RequestHandler>,
    max_message_size: usize,
}

impl Dispatcher {
    /// Dispatch to `handler`, refusing frames larger than the handler's
    /// configured maximum message size.
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        let max_message_size = handler.config().max_message_size;
        Self::with_limit(handler, max_message_size)
    }

    /// Dispatch to `handler` with an explicit frame size limit.
    pub fn with_limit(handler: Arc<RequestHandler>, max_message_size: usize) -> Self {
        Self {
            handler,
            max_message_size,
        }
    }

    /// The handler requests are dispatched to.
    pub fn handler(&self) -> &Arc<RequestHandler> {
        &self.handler
    }

    /// Answer one frame. Never fails: a frame that cannot be read is
    /// answered with an error response carrying request id 0.
    pub fn dispatch(&self, frame: &[u8]) -> Reply {
        let response = self.decode(frame).map_or_else(
            |e| {
                warn!(error = %e, bytes = frame.len(), "unreadable request");
                Response::error(0, e.code(), e.to_string())
            },
            |request| self.handler.handle(&request),
        );
        let accepted = response.status.is_ok();

        let frame = encode_response(&response).unwrap_or_else(|e| {
            error!(error = %e, id = response.id, "failed to encode response");
            let fallback = Response::error(response.id, error_codes::INTERNAL, e.to_string());
            encode_response(&fallback).unwrap_or_default()
        });
        Reply { frame, accepted }
    }

    fn decode(&self, frame: &[u8]) -> Result<recordlink_proto::Request, Error> {
        if frame.len() > self.max_message_size {
            return Err(Error::Protocol(recordlink_proto::Error::InvalidMessage(
                format!(
                    "message too large: {} bytes (max: {})",
                    frame.len(),
                    self.max_message_size
                ),
            )));
        }
        Ok(decode_request(frame)?)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use recordlink_proto::framing::{decode_response, encode_request};
    use recordlink_proto::{Operation, Request, ResponsePayload, Status};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(
            RequestHandler::from_config(ServerConfig::default()).unwrap(),
        ))
    }

    #[test]
    fn test_dispatch_ping() {
        let frame = encode_request(&Request::new(42, 0, Operation::Ping)).unwrap();
        let reply = dispatcher().dispatch(&frame);
        assert!(reply.accepted);

        let response = decode_response(&reply.frame).unwrap();
        assert_eq!(response.id, 42);
        assert_eq!(response.payload, ResponsePayload::Pong);
    }

    #[test]
    fn test_unreadable_frame() {
        let reply = dispatcher().dispatch(b"invalid data");
        assert!(!reply.accepted);

        let response = decode_response(&reply.frame).unwrap();
        assert_eq!(response.id, 0);
        assert!(matches!(
            response.status,
            Status::Error { code, .. } if code == error_codes::INVALID_REQUEST
        ));
    }

    #[test]
    fn test_oversized_frame() {
        let dispatcher = Dispatcher::with_limit(dispatcher().handler().clone(), 16);
        let frame = encode_request(&Request::new(1, 0, Operation::Ping)).unwrap();
        assert!(frame.len() > 16);

        let reply = dispatcher.dispatch(&frame);
        assert!(!reply.accepted);
        let response = decode_response(&reply.frame).unwrap();
        assert!(matches!(response.status, Status::Error { message, .. } if message.contains("too large")));
    }

    #[test]
    fn test_rejected_request_is_not_accepted() {
        // Any operation but Ping needs a session.
        let frame = encode_request(&Request::new(7, 99, Operation::Logout)).unwrap();
        let reply = dispatcher().dispatch(&frame);
        assert!(!reply.accepted);
        assert_eq!(decode_response(&reply.frame).unwrap().id, 7);
    }

    #[test]
    fn test_dispatch_from_many_threads() {
        let dispatcher = dispatcher();
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                std::thread::spawn(move || {
                    let id = 100 + i;
                    let frame = encode_request(&Request::new(id, 0, Operation::Ping)).unwrap();
                    let reply = dispatcher.dispatch(&frame);
                    assert!(reply.accepted);
                    assert_eq!(decode_response(&reply.frame).unwrap().id, id);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
