//! TCP lifecycle for the gateway link: connect/reconnect with
//! exponential backoff, inbound reassembly, and a paced outbound
//! queue.

pub mod reassembly;

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ActiveMode;
use crate::dynet::opcode::is_state_query;
use crate::dynet::packet::DynetPacket;
use crate::retry::SendGuard;

use reassembly::Inbound;

/// Minimum spacing between consecutive outbound frames. The RS485 bus
/// behind the gateway cannot absorb back-to-back packets.
pub const MESSAGE_SPACING: Duration = Duration::from_millis(200);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Reconnect delays: 1, 2, 4, ... 32, then 60 s. Reset on a
/// successful connect.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
}

impl Backoff {
    pub fn new() -> Backoff {
        Backoff { delay: Duration::from_secs(1) }
    }

    pub fn next(&mut self) -> Duration {
        let current = self.delay;
        self.delay = if current < Duration::from_secs(32) {
            current * 2
        } else {
            Duration::from_secs(60)
        };
        current
    }

    pub fn reset(&mut self) {
        self.delay = Duration::from_secs(1);
    }
}

impl Default for Backoff {
    fn default() -> Backoff {
        Backoff::new()
    }
}

/// One frame queued for transmission, with an optional send-time
/// relevance check.
#[derive(Debug)]
pub struct WireRequest {
    pub packet: DynetPacket,
    pub guard: Option<SendGuard>,
}

impl WireRequest {
    pub fn plain(packet: DynetPacket) -> WireRequest {
        WireRequest { packet, guard: None }
    }

    pub fn guarded(packet: DynetPacket, guard: SendGuard) -> WireRequest {
        WireRequest { packet, guard: Some(guard) }
    }
}

/// Messages from the connection task to the engine.
#[derive(Debug)]
pub enum ConnEvent {
    Up,
    Down,
    Packet(DynetPacket),
}

/// Spawn the connection task. Returns the outbound request sender;
/// packets enqueued while the link is down are flushed once it comes
/// up.
pub fn spawn(
    host: String,
    port: u16,
    active: ActiveMode,
    events: mpsc::UnboundedSender<ConnEvent>,
    shutdown: watch::Receiver<bool>,
) -> mpsc::UnboundedSender<WireRequest> {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Connection {
        host,
        port,
        active,
        requests: rx,
        events,
        shutdown,
        state: ConnState::Disconnected,
        queue: VecDeque::new(),
        last_sent: None,
        backoff: Backoff::new(),
    };
    tokio::spawn(connection.run());
    tx
}

struct Connection {
    host: String,
    port: u16,
    active: ActiveMode,
    requests: mpsc::UnboundedReceiver<WireRequest>,
    events: mpsc::UnboundedSender<ConnEvent>,
    shutdown: watch::Receiver<bool>,
    state: ConnState,
    queue: VecDeque<WireRequest>,
    last_sent: Option<Instant>,
    backoff: Backoff,
}

impl Connection {
    async fn run(mut self) {
        loop {
            if self.shutting_down() {
                return;
            }
            match self.state {
                ConnState::Disconnected => {
                    self.state = ConnState::Connecting;
                }
                ConnState::Connecting => match self.dial().await {
                    Ok(stream) => {
                        self.backoff.reset();
                        info!(host = %self.host, port = self.port, "connected to gateway");
                        let _ = self.events.send(ConnEvent::Up);
                        self.state = ConnState::Connected;
                        self.drive(stream).await;
                        let _ = self.events.send(ConnEvent::Down);
                        self.state = ConnState::Failed;
                    }
                    Err(e) => {
                        warn!(host = %self.host, port = self.port, error = %e, "could not connect to gateway");
                        self.state = ConnState::Failed;
                    }
                },
                ConnState::Connected => {
                    // Unreachable: the Connecting arm drives the link
                    // to completion before returning here.
                    self.state = ConnState::Failed;
                }
                ConnState::Failed => {
                    let delay = self.backoff.next();
                    debug!(delay_s = delay.as_secs(), "retrying connect after backoff");
                    self.wait(delay).await;
                    self.state = ConnState::Disconnected;
                }
            }
        }
    }

    fn shutting_down(&self) -> bool {
        // A dropped sender counts as shutdown.
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    async fn dial(&mut self) -> io::Result<TcpStream> {
        debug!(host = %self.host, port = self.port, "connecting to gateway");
        match timeout(CONNECT_TIMEOUT, TcpStream::connect((self.host.as_str(), self.port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        }
    }

    /// Service an established link until it is lost or shutdown is
    /// requested.
    async fn drive(&mut self, mut stream: TcpStream) {
        let mut inbuf = BytesMut::with_capacity(1024);
        loop {
            let next_send = self.last_sent.map_or_else(Instant::now, |t| t + MESSAGE_SPACING);
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return;
                    }
                }
                read = stream.read_buf(&mut inbuf) => match read {
                    Ok(0) => {
                        info!("gateway closed the connection");
                        return;
                    }
                    Ok(_) => self.drain_inbound(&mut inbuf),
                    Err(e) => {
                        warn!(error = %e, "read failed");
                        return;
                    }
                },
                request = self.requests.recv() => match request {
                    Some(request) => self.queue.push_back(request),
                    None => return,
                },
                _ = sleep_until(next_send), if !self.queue.is_empty() => {
                    if let Err(e) = self.send_one(&mut stream).await {
                        warn!(error = %e, "write failed");
                        return;
                    }
                }
            }
        }
    }

    fn drain_inbound(&mut self, inbuf: &mut BytesMut) {
        for item in reassembly::drain(inbuf) {
            match item {
                Inbound::Packet(packet) => {
                    let _ = self.events.send(ConnEvent::Packet(packet));
                }
                Inbound::Debug(msg) => {
                    debug!(msg = %String::from_utf8_lossy(&msg), "gateway debug message");
                }
                Inbound::Device(frame) => {
                    debug!(frame = ?frame, "ignoring device frame");
                }
            }
        }
    }

    /// Transmit the first still-relevant queued frame. Discarded
    /// frames (stale guard, gated query) do not consume the pacing
    /// window.
    async fn send_one(&mut self, stream: &mut TcpStream) -> io::Result<()> {
        while let Some(request) = self.queue.pop_front() {
            if let Some(guard) = &request.guard {
                if !guard.should_run() {
                    debug!(command = request.packet.command, "dropping answered query");
                    continue;
                }
            }
            if self.active == ActiveMode::Off && is_state_query(request.packet.command) {
                debug_assert!(false, "state query enqueued while active mode is off");
                warn!(command = request.packet.command, "dropping state query in active=off mode");
                continue;
            }
            let bytes = request.packet.encode();
            stream.write_all(&bytes).await?;
            debug!(bytes = ?bytes, "frame sent");
            self.last_sent = Some(Instant::now());
            break;
        }
        Ok(())
    }

    async fn wait(&mut self, delay: Duration) {
        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
