// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scene distribution server.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------------------------+
//! |                   DistributionServer                        |
//! |  state: Idle -> Starting -> Running -> Stopping -> Idle     |
//! |  lifecycle lock: config + worker handle                     |
//! +------------------------------------------------------------+
//!                              |
//!              spawn / join (running flag + mio::Waker)
//!                              v
//! +------------------------------------------------------------+
//! |              "tracer-scene-sender" thread                   |
//! |  mio::Poll: listener | waker | one token per peer           |
//! |  loop while running:                                        |
//! |    accept pending peers                                     |
//! |    readable peers: read at most one request frame           |
//! |      -> SnapshotCache::lookup(name)                         |
//! |      -> queue response (hit: bytes, miss: empty frame)      |
//! |    writable peers: continue the pending response            |
//! |    drop peers whose response missed the write deadline      |
//! |  teardown: close every peer, then the listener              |
//! +------------------------------------------------------------+
//! ```
//!
//! Every accepted request is answered with exactly one frame, and a peer's
//! next request is not read before its previous response is fully written.
//! A slow reader only holds its own connection, for at most the write
//! timeout.

use super::peer::{Flush, Peer, PeerPoll};
use super::stats::{ServerStats, ServerStatsSnapshot};
use crate::config::{parse_ip, DistributionConfig};
use crate::error::{Error, Result};
use crate::snapshot::{SceneAuthority, SnapshotCache};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ============================================================================
// Constants
// ============================================================================

/// Listen backlog of the responder socket.
const LISTEN_BACKLOG: i32 = 128;

/// Token for the listener
const LISTENER_TOKEN: Token = Token(0);

/// Token for the stop waker
const WAKER_TOKEN: Token = Token(1);

/// Starting token for peers
const PEER_TOKEN_START: usize = 2;

/// Maximum events to process per poll
const MAX_EVENTS: usize = 128;

/// Lifecycle state of a [`DistributionServer`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl ServerState {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => ServerState::Starting,
            2 => ServerState::Running,
            3 => ServerState::Stopping,
            _ => ServerState::Idle,
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Idle => "idle",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
    handle: JoinHandle<Result<()>>,
    local_addr: SocketAddr,
}

/// Extra cleanup run by the server thread during teardown.
type TeardownHook = (String, Box<dyn FnOnce() -> io::Result<()> + Send>);

struct Lifecycle {
    config: DistributionConfig,
    worker: Option<Worker>,
    /// Handed to the next started worker
    teardown_hooks: Vec<TeardownHook>,
}

/// Threaded responder serving snapshot segments by name.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tracer::{DistributionServer, SceneSegments, SnapshotCache};
///
/// let cache = Arc::new(SnapshotCache::new());
/// cache.populate(SceneSegments::new().with("header", vec![1u8, 2, 3]));
///
/// let server = DistributionServer::new(Arc::clone(&cache));
/// server.configure("127.0.0.1", 5565)?;
/// let addr = server.start()?;
/// println!("serving on {}", addr);
/// server.stop()?;
/// # Ok::<(), tracer::Error>(())
/// ```
pub struct DistributionServer {
    cache: Arc<SnapshotCache>,
    state: AtomicU8,
    lifecycle: Mutex<Lifecycle>,
    stats: Arc<ServerStats>,
}

impl DistributionServer {
    /// Server with the default configuration.
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self::with_config(cache, DistributionConfig::default())
    }

    pub fn with_config(cache: Arc<SnapshotCache>, config: DistributionConfig) -> Self {
        Self {
            cache,
            state: AtomicU8::new(ServerState::Idle as u8),
            lifecycle: Mutex::new(Lifecycle {
                config,
                worker: None,
                teardown_hooks: Vec::new(),
            }),
            stats: Arc::new(ServerStats::new()),
        }
    }

    /// Set the bind target. Only valid while `Idle`.
    pub fn configure(&self, address: &str, port: u16) -> Result<()> {
        let bind_address = parse_ip(address)?;
        let mut lifecycle = self.lifecycle.lock();
        self.ensure_idle("configure")?;
        lifecycle.config.bind_address = bind_address;
        lifecycle.config.port = port;
        Ok(())
    }

    /// Replace the whole configuration. Only valid while `Idle`.
    pub fn set_config(&self, config: DistributionConfig) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.ensure_idle("set_config")?;
        lifecycle.config = config;
        Ok(())
    }

    pub fn config(&self) -> DistributionConfig {
        self.lifecycle.lock().config.clone()
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Bound address while running (resolves an ephemeral port).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle
            .lock()
            .worker
            .as_ref()
            .map(|worker| worker.local_addr)
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Bind the responder and start the server thread.
    ///
    /// On bind failure the server stays `Idle` and the error is returned.
    pub fn start(&self) -> Result<SocketAddr> {
        let mut lifecycle = self.lifecycle.lock();
        self.ensure_idle("start")?;
        lifecycle.config.validate()?;
        self.set_state(ServerState::Starting);

        match self.launch(&mut lifecycle) {
            Ok(local_addr) => {
                self.set_state(ServerState::Running);
                log::info!("[DistributionServer] serving scene segments on {}", local_addr);
                Ok(local_addr)
            }
            Err(e) => {
                self.set_state(ServerState::Idle);
                log::warn!("[DistributionServer] start failed: {}", e);
                Err(e)
            }
        }
    }

    /// Stop the server thread and release the endpoint.
    ///
    /// No-op when not running. Teardown always completes and the server ends
    /// up `Idle`; a teardown failure is returned afterwards, and `start()`
    /// may be retried.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        let Some(worker) = lifecycle.worker.take() else {
            return Ok(());
        };

        self.set_state(ServerState::Stopping);
        worker.running.store(false, Ordering::Release);
        if let Err(e) = worker.waker.wake() {
            log::debug!("[DistributionServer] waker failed, waiting for poll timeout: {}", e);
        }
        let result = match worker.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::WorkerPanicked),
        };
        self.set_state(ServerState::Idle);

        match &result {
            Ok(()) => log::info!("[DistributionServer] stopped ({})", self.stats.snapshot()),
            Err(e) => log::warn!("[DistributionServer] stopped with error: {}", e),
        }
        result
    }

    /// Populate the cache from `authority`, then make sure the server runs.
    ///
    /// Returns the address being served.
    pub fn send_scene(&self, authority: &dyn SceneAuthority) -> Result<SocketAddr> {
        let epoch = self.cache.refresh_from(authority);
        log::debug!("[DistributionServer] scene epoch {} ready", epoch);
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        self.start()
    }

    /// Run `hook` when the server thread tears down after the next `start()`.
    #[cfg(test)]
    pub(crate) fn on_teardown<F>(&self, label: &str, hook: F)
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        self.lifecycle
            .lock()
            .teardown_hooks
            .push((label.to_string(), Box::new(hook)));
    }

    /// Bind, register with a fresh poll and spawn the server thread.
    fn launch(&self, lifecycle: &mut Lifecycle) -> Result<SocketAddr> {
        let config = lifecycle.config.clone();
        let addr = config.socket_addr();
        let mut listener =
            bind_listener(addr).map_err(|source| Error::BindFailed { addr, source })?;
        let local_addr = listener.local_addr()?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        let running = Arc::new(AtomicBool::new(true));
        let ctx = LoopContext {
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&running),
            config,
            hooks: std::mem::take(&mut lifecycle.teardown_hooks),
        };
        let handle = thread::Builder::new()
            .name("tracer-scene-sender".to_string())
            .spawn(move || run_loop(poll, listener, ctx))?;

        lifecycle.worker = Some(Worker {
            running,
            waker,
            handle,
            local_addr,
        });
        Ok(local_addr)
    }

    fn ensure_idle(&self, operation: &str) -> Result<()> {
        let state = self.state();
        if state != ServerState::Idle {
            return Err(Error::InvalidState(format!(
                "{} requires an idle server (current: {})",
                operation, state
            )));
        }
        Ok(())
    }

    fn set_state(&self, state: ServerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for DistributionServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("[DistributionServer] stop on drop failed: {}", e);
        }
    }
}

impl std::fmt::Debug for DistributionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionServer")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Create a non-blocking listening socket bound to `addr`.
fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    let listener: std::net::TcpListener = socket.into();
    listener.set_nonblocking(true)?;
    Ok(TcpListener::from_std(listener))
}

// ============================================================================
// Server thread
// ============================================================================

struct LoopContext {
    cache: Arc<SnapshotCache>,
    stats: Arc<ServerStats>,
    running: Arc<AtomicBool>,
    config: DistributionConfig,
    hooks: Vec<TeardownHook>,
}

/// Connected peers plus the tokens that may have a request to read.
struct PeerTable {
    peers: HashMap<Token, Peer>,
    /// Peers to poll this round (readable, or just answered)
    ready: Vec<Token>,
    next_token: usize,
}

/// Why a peer leaves the table.
enum Departure {
    Closed,
    Dropped(io::Error),
}

impl PeerTable {
    fn new() -> Self {
        Self {
            peers: HashMap::new(),
            ready: Vec::new(),
            next_token: PEER_TOKEN_START,
        }
    }

    fn mark_ready(&mut self, token: Token) {
        if !self.ready.contains(&token) {
            self.ready.push(token);
        }
    }

    fn remove(
        &mut self,
        registry: &Registry,
        token: Token,
        departure: Departure,
        stats: &ServerStats,
    ) {
        let Some(mut peer) = self.peers.remove(&token) else {
            return;
        };
        self.ready.retain(|t| *t != token);
        match departure {
            Departure::Closed => {
                stats.record_peer_closed();
                log::debug!("[DistributionServer] peer {} disconnected", peer.addr());
            }
            Departure::Dropped(e) => {
                stats.record_peer_dropped();
                log::warn!("[DistributionServer] dropping peer {}: {}", peer.addr(), e);
            }
        }
        if let Err(e) = registry.deregister(peer.stream_mut()) {
            log::debug!("[DistributionServer] deregister error: {}", e);
        }
        if let Err(e) = peer.close() {
            log::debug!("[DistributionServer] close error: {}", e);
        }
    }
}

fn run_loop(mut poll: Poll, listener: TcpListener, mut ctx: LoopContext) -> Result<()> {
    let mut events = Events::with_capacity(MAX_EVENTS);
    let mut table = PeerTable::new();

    while ctx.running.load(Ordering::Acquire) {
        let timeout = if table.ready.is_empty() {
            ctx.config.poll_interval
        } else {
            Duration::ZERO
        };
        if let Err(e) = poll.poll(&mut events, Some(timeout)) {
            if e.kind() != io::ErrorKind::Interrupted {
                log::warn!("[DistributionServer] poll error: {}", e);
            }
            continue;
        }

        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => accept_pending(&listener, poll.registry(), &mut table, &ctx),
                WAKER_TOKEN => {}
                token => {
                    if event.is_writable() {
                        continue_response(poll.registry(), &mut table, token, &ctx);
                    }
                    if event.is_readable() || event.is_read_closed() {
                        table.mark_ready(token);
                    }
                }
            }
        }

        serve_round(poll.registry(), &mut table, &ctx);
        expire_overdue(poll.registry(), &mut table, &ctx);
    }

    let mut steps: Vec<TeardownStep<'_>> = Vec::new();
    for (_, peer) in table.peers.drain() {
        let stats = Arc::clone(&ctx.stats);
        steps.push(TeardownStep::new(format!("peer {}", peer.addr()), move || {
            stats.record_peer_closed();
            peer.close()
        }));
    }
    for (label, hook) in std::mem::take(&mut ctx.hooks) {
        steps.push(TeardownStep::new(label, hook));
    }
    let mut listener = listener;
    steps.push(TeardownStep::new("listener", move || {
        poll.registry().deregister(&mut listener)
    }));

    teardown(steps)
}

/// Accept every pending connection.
fn accept_pending(
    listener: &TcpListener,
    registry: &Registry,
    table: &mut PeerTable,
    ctx: &LoopContext,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                if table.peers.len() >= ctx.config.max_peers {
                    ctx.stats.record_peer_refused();
                    log::warn!(
                        "[DistributionServer] refusing {} (max {} peers)",
                        addr,
                        ctx.config.max_peers
                    );
                    continue;
                }

                let token = Token(table.next_token);
                table.next_token += 1;
                if let Err(e) =
                    registry.register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)
                {
                    log::warn!("[DistributionServer] cannot register {}: {}", addr, e);
                    continue;
                }

                match Peer::new(
                    stream,
                    addr,
                    ctx.config.max_request_size,
                    ctx.config.write_timeout,
                ) {
                    Ok(peer) => {
                        ctx.stats.record_peer_accepted();
                        log::debug!("[DistributionServer] peer {} connected", addr);
                        table.peers.insert(token, peer);
                        table.mark_ready(token);
                    }
                    Err(e) => log::warn!("[DistributionServer] cannot configure {}: {}", addr, e),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("[DistributionServer] accept error: {}", e);
                break;
            }
        }
    }
}

/// Resume a pending response on a writable event.
fn continue_response(
    registry: &Registry,
    table: &mut PeerTable,
    token: Token,
    ctx: &LoopContext,
) {
    let outcome = match table.peers.get_mut(&token) {
        Some(peer) if peer.is_sending() => peer.flush(),
        _ => return,
    };
    match outcome {
        // Requests that arrived meanwhile were not read yet.
        Ok(Flush::Done) => table.mark_ready(token),
        Ok(Flush::Pending) => {}
        Err(e) => table.remove(registry, token, Departure::Dropped(e), &ctx.stats),
    }
}

/// Give every ready peer one chance to submit a request.
fn serve_round(registry: &Registry, table: &mut PeerTable, ctx: &LoopContext) {
    for token in std::mem::take(&mut table.ready) {
        let Some(peer) = table.peers.get_mut(&token) else {
            continue;
        };
        let departure = match peer.poll_request() {
            PeerPoll::Idle => None,
            PeerPoll::Request(frame) => match answer(peer, &frame, ctx) {
                // More requests may already be buffered.
                Ok(Flush::Done) => {
                    table.mark_ready(token);
                    None
                }
                Ok(Flush::Pending) => None,
                Err(e) => Some(Departure::Dropped(e)),
            },
            PeerPoll::Closed => Some(Departure::Closed),
            PeerPoll::Failed(e) => Some(Departure::Dropped(e)),
        };
        if let Some(departure) = departure {
            table.remove(registry, token, departure, &ctx.stats);
        }
    }
}

/// Queue the response to one request.
fn answer(peer: &mut Peer, frame: &[u8], ctx: &LoopContext) -> io::Result<Flush> {
    // Non UTF-8 requests cannot name a segment: answered as a miss.
    let segment = std::str::from_utf8(frame)
        .ok()
        .and_then(|name| ctx.cache.lookup(name));

    let payload: &[u8] = segment.as_deref().unwrap_or(&[]);
    let flush = peer.respond(payload)?;
    if segment.is_some() {
        ctx.stats.record_hit(payload.len());
    } else {
        ctx.stats.record_miss();
    }
    log::trace!(
        "[DistributionServer] {} <- {} bytes for {:?}",
        peer.addr(),
        payload.len(),
        String::from_utf8_lossy(frame)
    );
    Ok(flush)
}

/// Drop peers whose pending response missed the write deadline.
fn expire_overdue(registry: &Registry, table: &mut PeerTable, ctx: &LoopContext) {
    let now = Instant::now();
    let overdue: Vec<Token> = table
        .peers
        .iter()
        .filter(|(_, peer)| peer.is_overdue(now))
        .map(|(token, _)| *token)
        .collect();
    for token in overdue {
        let e = io::Error::new(
            io::ErrorKind::TimedOut,
            format!("response not written within {:?}", ctx.config.write_timeout),
        );
        table.remove(registry, token, Departure::Dropped(e), &ctx.stats);
    }
}

// ============================================================================
// Teardown
// ============================================================================

/// One fallible cleanup action of the server thread.
pub(crate) struct TeardownStep<'a> {
    label: String,
    action: Box<dyn FnOnce() -> io::Result<()> + 'a>,
}

impl<'a> TeardownStep<'a> {
    pub(crate) fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + 'a,
    {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }
}

/// Run every step in order, even after a failure, then report all failures
/// together.
pub(crate) fn teardown<'a, I>(steps: I) -> Result<()>
where
    I: IntoIterator<Item = TeardownStep<'a>>,
{
    let mut failures = Vec::new();
    for step in steps {
        if let Err(e) = (step.action)() {
            failures.push(format!("{}: {}", step.label, e));
        }
    }

    if failures.is_empty() {
        log::debug!("[DistributionServer] endpoint released");
        Ok(())
    } else {
        Err(Error::Teardown(failures.join("; ")))
    }
}
