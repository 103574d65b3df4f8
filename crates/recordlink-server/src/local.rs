//! In-process exchange with a request handler.

use std::sync::Arc;

use recordlink_proto::framing::{decode_response, encode_request};
use recordlink_proto::{Exchange, Request, Response};

use crate::dispatch::Dispatcher;
use crate::handler::RequestHandler;

/// An [`Exchange`] that hands frames straight to a [`RequestHandler`].
///
/// Requests still go through the framing codec, so a client talking to a
/// `LocalExchange` sees exactly the bytes it would see over a socket.
#[derive(Clone, Debug)]
pub struct LocalExchange {
    dispatcher: Dispatcher,
}

impl LocalExchange {
    /// Create an exchange with `handler`.
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self {
            dispatcher: Dispatcher::new(handler),
        }
    }

    /// The handler behind this exchange.
    pub fn handler(&self) -> &Arc<RequestHandler> {
        self.dispatcher.handler()
    }
}

impl Exchange for LocalExchange {
    fn exchange(&mut self, request: &Request) -> Result<Response, recordlink_proto::Error> {
        let frame = encode_request(request)?;
        let reply = self.dispatcher.dispatch(&frame);
        decode_response(&reply.frame)
    }
}
