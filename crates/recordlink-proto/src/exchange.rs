//! The request/response seam between a client and a server.

use crate::message::{Request, Response};
use crate::Error;

/// One blocking request/response round-trip to a record server.
///
/// The client's socket transport implements this, and so does the reference
/// server's in-process adapter. Implementations must return
/// [`Error::Timeout`] when the peer does not answer in time and
/// [`Error::Transport`] for socket failures.
pub trait Exchange: Send {
    /// Send one request and wait for its response.
    fn exchange(&mut self, request: &Request) -> Result<Response, Error>;
}

impl<T: Exchange + ?Sized> Exchange for Box<T> {
    fn exchange(&mut self, request: &Request) -> Result<Response, Error> {
        (**self).exchange(request)
    }
}
