//! nng REP transport.
//!
//! One REP socket listens on every configured address. Each worker thread
//! drives its own `AsyncContext` on a single-threaded runtime, so several
//! requests can be in flight while the handler serialises store access.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_nng::AsyncContext;
use nng::options::{Options, RecvMaxSize};
use nng::{Message, Protocol, Socket};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::handler::RequestHandler;

/// How long a worker waits for a request before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Counters reported when the transport stops.
#[derive(Debug)]
struct RequestStats {
    answered: AtomicU64,
    rejected: AtomicU64,
    slow: AtomicU64,
    started_at: Instant,
}

impl RequestStats {
    fn new() -> Self {
        Self {
            answered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            slow: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    fn count(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            answered: self.answered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            slow: self.slow.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Point-in-time copy of the transport's request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests answered, including error responses.
    pub answered: u64,
    /// Answers carrying an error status.
    pub rejected: u64,
    /// Requests that took longer than the configured request timeout.
    pub slow: u64,
    /// Time since the transport started listening.
    pub uptime: Duration,
}

/// Listening socket plus the settings its workers run with.
pub struct Transport {
    socket: Socket,
    dispatcher: Dispatcher,
    stats: Arc<RequestStats>,
    slow_after: Duration,
    workers: usize,
}

impl Transport {
    /// Open the REP socket and listen on every configured address.
    pub fn listen(config: &ServerConfig, handler: Arc<RequestHandler>) -> Result<Self, Error> {
        let socket = Socket::new(Protocol::Rep0)
            .map_err(|e| Error::Transport(format!("failed to create socket: {}", e)))?;
        socket
            .set_opt::<RecvMaxSize>(config.max_message_size)
            .map_err(|e| Error::Transport(format!("failed to set max message size: {}", e)))?;

        let addresses = config.tcp_address.iter().chain(config.ipc_address.iter());
        for address in addresses {
            socket
                .listen(address)
                .map_err(|e| Error::Transport(format!("failed to listen on {}: {}", address, e)))?;
            info!(%address, "listening");
        }

        Ok(Self {
            socket,
            dispatcher: Dispatcher::with_limit(handler, config.max_message_size),
            stats: Arc::new(RequestStats::new()),
            slow_after: config.request_timeout,
            workers: config.transport_workers.max(1),
        })
    }

    /// Current request counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Serve requests until `shutdown` fires, then wait for every worker
    /// to finish its current request.
    pub async fn run_until_shutdown(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let handles = self.spawn_workers(&stop)?;
        info!(workers = self.workers, "transport ready");

        wait_for_shutdown(&mut shutdown).await;
        stop.store(true, Ordering::SeqCst);

        let joined = tokio::task::spawn_blocking(move || {
            handles
                .into_iter()
                .map(JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await
        .map_err(|e| Error::Transport(format!("failed to join workers: {}", e)))?;
        if joined > 0 {
            warn!(panicked = joined, "transport workers panicked");
        }

        let stats = self.stats();
        info!(
            answered = stats.answered,
            rejected = stats.rejected,
            slow = stats.slow,
            uptime_secs = stats.uptime.as_secs(),
            "transport stopped"
        );
        Ok(())
    }

    fn spawn_workers(&self, stop: &Arc<AtomicBool>) -> Result<Vec<JoinHandle<()>>, Error> {
        (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    dispatcher: self.dispatcher.clone(),
                    stats: self.stats.clone(),
                    slow_after: self.slow_after,
                    stop: stop.clone(),
                };
                let socket = self.socket.clone();
                thread::Builder::new()
                    .name(format!("recordlink-worker-{}", id))
                    .spawn(move || worker.run_blocking(socket))
                    .map_err(|e| Error::Transport(format!("failed to spawn worker {}: {}", id, e)))
            })
            .collect()
    }
}

/// Resolve once a shutdown signal arrives. A channel whose senders are all
/// gone can no longer deliver one, so the wait never ends.
async fn wait_for_shutdown(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => {
            warn!("shutdown channel closed; serving until the process exits");
            std::future::pending::<()>().await;
        }
    }
}

/// One request loop bound to its own socket context.
struct Worker {
    id: usize,
    dispatcher: Dispatcher,
    stats: Arc<RequestStats>,
    slow_after: Duration,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run_blocking(self, socket: Socket) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
        match runtime {
            Ok(runtime) => runtime.block_on(self.run(socket)),
            Err(e) => error!(error = %e, worker = self.id, "failed to build worker runtime"),
        }
    }

    async fn run(self, socket: Socket) {
        let mut ctx = match AsyncContext::try_from(&socket) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(error = %e, worker = self.id, "failed to create socket context");
                return;
            }
        };

        while !self.stop.load(Ordering::SeqCst) {
            match ctx.receive(Some(POLL_INTERVAL)).await {
                Ok(request) => self.answer(&mut ctx, request).await,
                Err(nng::Error::TimedOut) => {
                    self.dispatcher.handler().evict_idle_sessions();
                }
                Err(e) => error!(error = %e, worker = self.id, "receive failed"),
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    async fn answer(&self, ctx: &mut AsyncContext<'_>, request: Message) {
        let started = Instant::now();
        let reply = self.dispatcher.dispatch(request.as_slice());
        let elapsed = started.elapsed();

        if let Err((_, e)) = ctx.send(Message::from(reply.frame.as_slice()), None).await {
            error!(error = %e, worker = self.id, "failed to send response");
            return;
        }

        RequestStats::count(&self.stats.answered);
        if !reply.accepted {
            RequestStats::count(&self.stats.rejected);
        }
        if elapsed > self.slow_after {
            RequestStats::count(&self.stats.slow);
            warn!(
                worker = self.id,
                elapsed_ms = elapsed.as_millis() as u64,
                limit_ms = self.slow_after.as_millis() as u64,
                "slow request"
            );
        }
    }
}

/// Create a transport that listens on the configured addresses.
pub fn create_transport(
    config: &ServerConfig,
    handler: Arc<RequestHandler>,
) -> Result<Transport, Error> {
    if !config.has_transport() {
        return Err(Error::Config(
            "no transport configured (need a TCP or IPC address)".to_string(),
        ));
    }
    Transport::listen(config, handler)
}
