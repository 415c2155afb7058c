//! OPC client sink
//!
//! Keeps one long-lived connection to an OPC server and sends every frame as
//! a set-pixel-colors broadcast. Delivery is best effort: when the peer is
//! unreachable the frame is dropped, the buffer still moves on, and the next
//! connection attempt waits for the next frame.

use crate::wire::OpcHeader;
use led_pipeline::{FrameBuffer, Stage, StageContext, StageError};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Opens transport connections for the client sink
pub trait Connector: Send {
    type Conn: Write + Send;

    fn connect(&mut self) -> io::Result<Self::Conn>;

    /// Peer description for log lines
    fn target(&self) -> &str;
}

/// Default limit on dialing the peer
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default limit on one blocked write. A peer that stops reading costs at
/// most this long per frame before the connection is dropped.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP transport with Nagle disabled
pub struct TcpConnector {
    addr: String,
    connect_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
        }
    }

    /// `None` waits for the OS to give up
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `None` lets a write block until the peer reads
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    fn open(&self) -> io::Result<TcpStream> {
        let Some(timeout) = self.connect_timeout else {
            return TcpStream::connect(&self.addr);
        };

        let mut last_err = None;
        for addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            let msg = format!("{} resolved to no addresses", self.addr);
            io::Error::new(io::ErrorKind::InvalidInput, msg)
        }))
    }
}

impl Connector for TcpConnector {
    type Conn = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = self.open()?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(self.write_timeout)?;
        Ok(stream)
    }

    fn target(&self) -> &str {
        &self.addr
    }
}

/// Reconnect policy, applied per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection attempts made for one frame before it is dropped. Zero
    /// never dials: every frame without a live connection is dropped.
    pub attempts: u32,
    /// Pause between two attempts for the same frame
    pub between_attempts: Duration,
    /// Pause before the next frame after the peer proved unreachable
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            between_attempts: Duration::from_millis(1),
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// How long to hold off the next frame after `outcome`
    pub fn delay_after(&self, outcome: &SendOutcome) -> Option<Duration> {
        match outcome {
            SendOutcome::Dropped(DropReason::Unreachable { .. }) if !self.backoff.is_zero() => {
                Some(self.backoff)
            }
            _ => None,
        }
    }
}

/// What happened to one frame
#[derive(Debug)]
pub enum SendOutcome {
    Delivered,
    Dropped(DropReason),
}

#[derive(Debug)]
pub enum DropReason {
    /// No connection could be made within the retry policy
    Unreachable { attempts: u32, last_error: io::Error },
    /// The connection broke or a write timed out; it has been discarded
    WriteFailed(io::Error),
    /// Frame does not fit in one OPC message
    TooLarge(usize),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

/// Counters shared with whoever built the sink
#[derive(Debug, Default)]
pub struct ClientStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    connects: AtomicU64,
}

impl ClientStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Successful connections, including the first
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }
}

pub struct OpcClientSink<C: Connector> {
    connector: C,
    conn: Option<C::Conn>,
    policy: RetryPolicy,
    resume_at: Option<Instant>,
    stats: Arc<ClientStats>,
}

impl OpcClientSink<TcpConnector> {
    /// Sink sending to `addr` (`host:port`) with the default retry policy
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(TcpConnector::new(addr), RetryPolicy::default())
    }
}

impl<C: Connector> OpcClientSink<C> {
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self {
            connector,
            conn: None,
            policy,
            resume_at: None,
            stats: Arc::new(ClientStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ClientStats> {
        self.stats.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connect(&mut self) -> Result<C::Conn, DropReason> {
        log::info!("[opc] connecting to {}...", self.connector.target());

        let attempts = self.policy.attempts;
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.policy.between_attempts);
            }
            match self.connector.connect() {
                Ok(conn) => {
                    log::info!("[opc]    connected");
                    self.stats.connects.fetch_add(1, Ordering::Relaxed);
                    return Ok(conn);
                }
                Err(e) => {
                    let target = self.connector.target();
                    log::warn!("[opc] attempt {}/{} to {}: {}", attempt, attempts, target, e);
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no connection attempts allowed")
        });
        Err(DropReason::Unreachable {
            attempts,
            last_error,
        })
    }

    /// Send one frame, connecting first if needed
    pub fn send_frame(&mut self, payload: &[u8]) -> SendOutcome {
        let header = match OpcHeader::pixels(payload.len()) {
            Ok(header) => header,
            Err(_) => return SendOutcome::Dropped(DropReason::TooLarge(payload.len())),
        };

        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => match self.connect() {
                Ok(conn) => conn,
                Err(reason) => return SendOutcome::Dropped(reason),
            },
        };

        let written = conn
            .write_all(&header.encode())
            .and_then(|_| conn.write_all(payload))
            .and_then(|_| conn.flush());

        match written {
            Ok(()) => {
                self.conn = Some(conn);
                SendOutcome::Delivered
            }
            // Dropping `conn` here closes it; the next frame reconnects
            Err(e) => SendOutcome::Dropped(DropReason::WriteFailed(e)),
        }
    }

    fn record(&mut self, outcome: &SendOutcome) {
        match outcome {
            SendOutcome::Delivered => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::Dropped(reason) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                match reason {
                    DropReason::Unreachable { .. } => {}
                    DropReason::WriteFailed(e) => {
                        log::warn!("[opc] {}: {}", self.connector.target(), e)
                    }
                    DropReason::TooLarge(len) => {
                        log::error!("[opc] frame of {} bytes exceeds the OPC length field", len)
                    }
                }
            }
        }

        if let Some(delay) = self.policy.delay_after(outcome) {
            log::warn!("[opc] waiting {:?} to retry", delay);
            self.resume_at = Some(Instant::now() + delay);
        }
    }

    /// Sleep out any backoff left over from the previous frame
    fn wait_for_backoff(&mut self) {
        if let Some(resume_at) = self.resume_at.take() {
            let now = Instant::now();
            if resume_at > now {
                thread::sleep(resume_at - now);
            }
        }
    }
}

impl<S, C: Connector> Stage<S> for OpcClientSink<C> {
    fn name(&self) -> &str {
        "opc-client"
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        _ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        self.wait_for_backoff();
        let outcome = self.send_frame(frame.as_bytes());
        self.record(&outcome);
        Ok(())
    }

    fn on_stop(&mut self) {
        log::info!(
            "[opc] {} frames delivered, {} dropped, {} connections",
            self.stats.delivered(),
            self.stats.dropped(),
            self.stats.connects()
        );
    }
}
