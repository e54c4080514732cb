//! Per-subscriber duplex pump.
//!
//! A connection runs two loops against one transport. The read pump only
//! consumes liveness traffic and enforces a read deadline that resets on every
//! frame. The write pump drains the subscriber queue and interleaves heartbeat
//! pings. Whichever loop stops first ends the connection; the subscriber is
//! then unregistered and the transport closed.
//!
//! The transport is abstract: anything that is a `Sink<Frame>` and a
//! `Stream<Item = Result<Frame, E>>` will do, so the pumps can be driven by an
//! axum WebSocket in production and by in-memory channels in tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{HubError, HubResult};
use crate::hub::Hub;
use crate::subscriber::{SubscriberId, SubscriberQueue, DEFAULT_QUEUE_CAPACITY};

/// Transport frame as seen by the pumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Heartbeat probe.
    Ping(Vec<u8>),
    /// Heartbeat acknowledgement.
    Pong(Vec<u8>),
    /// Graceful close.
    Close,
}

impl Frame {
    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data.len(),
            Self::Close => 0,
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle of a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Transport accepted, pumps not yet running.
    Connecting,
    /// Pumps running.
    Active,
    /// A pump stopped; tearing down.
    Closing,
    /// Unregistered and transport released.
    Closed,
}

impl SubscriberState {
    /// Whether updates can still flow.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or ended the stream.
    PeerClosed,
    /// Nothing arrived within the read deadline.
    ReadDeadline,
    /// The transport reported a read error.
    ReadError,
    /// Peer sent a frame above the inbound limit.
    FrameTooLarge,
    /// A write failed or exceeded the write timeout.
    WriteFailed,
    /// The hub closed the queue and everything queued was written.
    QueueDrained,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::PeerClosed => "peer closed",
            Self::ReadDeadline => "read deadline expired",
            Self::ReadError => "read error",
            Self::FrameTooLarge => "inbound frame too large",
            Self::WriteFailed => "write failed",
            Self::QueueDrained => "queue closed",
        };
        f.write_str(reason)
    }
}

/// Final report of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOutcome {
    /// The subscriber that ran.
    pub id: SubscriberId,
    /// Always [`SubscriberState::Closed`] once `run_connection` returns.
    pub state: SubscriberState,
    /// What ended the connection.
    pub reason: CloseReason,
}

/// Timing and sizing for subscriber connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum silence from the peer before the connection is dropped.
    pub read_deadline: Duration,
    /// Interval between heartbeat pings. Must be shorter than `read_deadline`.
    pub ping_interval: Duration,
    /// Upper bound for a single frame write.
    pub write_timeout: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_inbound_frame: usize,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_deadline: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
            max_inbound_frame: 512,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Set the read deadline.
    #[must_use]
    pub const fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// Set the ping interval.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the inbound frame limit.
    #[must_use]
    pub const fn with_max_inbound_frame(mut self, bytes: usize) -> Self {
        self.max_inbound_frame = bytes;
        self
    }

    /// Set the outbound queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Check the settings are consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if a healthy peer could time out between pings, or if
    /// a duration or the queue capacity is zero.
    pub fn validate(&self) -> HubResult<()> {
        if self.ping_interval.is_zero() || self.write_timeout.is_zero() {
            return Err(HubError::InvalidConfig(
                "ping interval and write timeout must be non-zero".to_string(),
            ));
        }
        if self.ping_interval >= self.read_deadline {
            return Err(HubError::InvalidConfig(format!(
                "ping interval {:?} must be shorter than read deadline {:?}",
                self.ping_interval, self.read_deadline
            )));
        }
        if self.queue_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "queue capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run a registered subscriber until either pump stops.
///
/// The queue must already be registered with `hub` (see [`Hub::subscribe`]).
/// On return the subscriber is unregistered and the sink closed.
pub async fn run_connection<Si, St, E>(
    hub: Arc<Hub>,
    queue: SubscriberQueue,
    sink: Si,
    stream: St,
    config: ConnectionConfig,
) -> ConnectionOutcome
where
    Si: Sink<Frame> + Unpin + Send,
    Si::Error: fmt::Display,
    St: Stream<Item = Result<Frame, E>> + Unpin + Send,
    E: fmt::Display,
{
    let id = queue.id();
    let mut queue = queue;
    let mut sink = sink;
    let mut stream = stream;
    let mut state = SubscriberState::Connecting;

    transition(id, &mut state, SubscriberState::Active);
    info!(subscriber = %id, "subscriber connected");

    let reason = tokio::select! {
        reason = read_pump(&mut stream, id, &config) => reason,
        reason = write_pump(&mut sink, &mut queue, id, &config) => reason,
    };

    transition(id, &mut state, SubscriberState::Closing);
    hub.unregister(id);

    if !matches!(reason, CloseReason::WriteFailed | CloseReason::QueueDrained) {
        // Best effort; the peer may already be gone.
        let _ = timeout(config.write_timeout, sink.send(Frame::Close)).await;
    }
    let _ = timeout(config.write_timeout, sink.close()).await;

    transition(id, &mut state, SubscriberState::Closed);
    info!(subscriber = %id, %reason, "subscriber disconnected");

    ConnectionOutcome { id, state, reason }
}

fn transition(id: SubscriberId, state: &mut SubscriberState, next: SubscriberState) {
    debug!(subscriber = %id, from = ?state, to = ?next, "subscriber state");
    *state = next;
}

async fn read_pump<St, E>(stream: &mut St, id: SubscriberId, config: &ConnectionConfig) -> CloseReason
where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let frame = match timeout(config.read_deadline, stream.next()).await {
            Err(_) => {
                debug!(subscriber = %id, "read deadline expired");
                return CloseReason::ReadDeadline;
            }
            Ok(None) => return CloseReason::PeerClosed,
            Ok(Some(Err(e))) => {
                warn!(subscriber = %id, error = %e, "subscriber read error");
                return CloseReason::ReadError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        if frame.len() > config.max_inbound_frame {
            warn!(
                subscriber = %id,
                size = frame.len(),
                limit = config.max_inbound_frame,
                "inbound frame too large"
            );
            return CloseReason::FrameTooLarge;
        }

        match frame {
            Frame::Close => return CloseReason::PeerClosed,
            Frame::Pong(_) => debug!(subscriber = %id, "pong"),
            // Any traffic counts as liveness; payloads are ignored.
            Frame::Ping(_) | Frame::Text(_) | Frame::Binary(_) => {}
        }
    }
}

async fn write_pump<Si>(
    sink: &mut Si,
    queue: &mut SubscriberQueue,
    id: SubscriberId,
    config: &ConnectionConfig,
) -> CloseReason
where
    Si: Sink<Frame> + Unpin,
    Si::Error: fmt::Display,
{
    let mut heartbeat = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            update = queue.recv() => {
                let Some(update) = update else {
                    let _ = write_frame(sink, Frame::Close, id, config).await;
                    return CloseReason::QueueDrained;
                };
                match update.to_json() {
                    Ok(text) => {
                        if !write_frame(sink, Frame::Text(text), id, config).await {
                            return CloseReason::WriteFailed;
                        }
                    }
                    Err(e) => {
                        warn!(subscriber = %id, kind = update.kind().as_str(), error = %e, "dropping unserializable update");
                    }
                }
            }
            _ = heartbeat.tick() => {
                if !write_frame(sink, Frame::Ping(Vec::new()), id, config).await {
                    return CloseReason::WriteFailed;
                }
            }
        }
    }
}

async fn write_frame<Si>(sink: &mut Si, frame: Frame, id: SubscriberId, config: &ConnectionConfig) -> bool
where
    Si: Sink<Frame> + Unpin,
    Si::Error: fmt::Display,
{
    match timeout(config.write_timeout, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(subscriber = %id, error = %e, "subscriber write failed");
            false
        }
        Err(_) => {
            warn!(subscriber = %id, "subscriber write timed out");
            false
        }
    }
}
