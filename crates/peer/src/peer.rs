use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::error::Error;
use crate::identity::{Capabilities, PeerId};
use crate::pending::PendingRequests;
use crate::state::{PeerState, StateMachine};
use crate::timing::{jittered_watchdog_interval, ReconnectBackoff, DEFAULT_WATCHDOG_INTERVAL};
use crate::uri::Transport;

/// Whether a peer was configured to dial out and stay connected, or was
/// only ever reachable by accepting its inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Persistent,
    Transient,
}

/// A Diameter peer connection: identity, FSM state, the requests it has
/// outstanding, and the timers that drive its watchdog and (for
/// persistent peers) reconnect schedule.
///
/// Holds no socket itself — the transport lives above this in the node
/// layer, which drives `transition`/`record_activity`/watchdog checks
/// off whatever actually arrives on the wire.
pub struct Peer {
    pub id: PeerId,
    pub role: PeerRole,
    pub remote_addr: Option<SocketAddr>,
    /// The socket family advertised for this peer's connection (spec
    /// §3, §6). Defaults to TCP; `SCTP`-flagged peers carry the data but
    /// have no concrete connection driver in this toolkit — see
    /// [`crate::uri::Transport`].
    transport: RwLock<Transport>,
    state: StateMachine,
    pending: PendingRequests,
    capabilities: RwLock<Option<Capabilities>>,
    last_activity: RwLock<Instant>,
    next_watchdog_deadline: RwLock<Instant>,
    watchdog_interval: RwLock<Duration>,
    backoff: RwLock<ReconnectBackoff>,
    next_hop_by_hop_id: AtomicU32,
    clock: Arc<dyn Clock>,
}

impl Peer {
    pub fn new(id: PeerId, role: PeerRole, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let state = StateMachine::new(id.origin_host.clone(), PeerState::Closed);
        Self {
            id,
            role,
            remote_addr: None,
            transport: RwLock::new(Transport::Tcp),
            state,
            pending: PendingRequests::new(),
            capabilities: RwLock::new(None),
            last_activity: RwLock::new(now),
            next_watchdog_deadline: RwLock::new(now + jittered_watchdog_interval(DEFAULT_WATCHDOG_INTERVAL)),
            watchdog_interval: RwLock::new(DEFAULT_WATCHDOG_INTERVAL),
            backoff: RwLock::new(ReconnectBackoff::new()),
            next_hop_by_hop_id: AtomicU32::new(1),
            clock,
        }
    }

    /// Overrides Tw for this peer (defaults to
    /// [`DEFAULT_WATCHDOG_INTERVAL`]), e.g. from a node's configured
    /// `watchdog_interval_secs`. Re-arms the next deadline against the
    /// new interval so a shorter Tw takes effect immediately.
    pub fn set_watchdog_interval(&self, interval: Duration) {
        *self.watchdog_interval.write() = interval;
        *self.next_watchdog_deadline.write() = self.clock.now() + jittered_watchdog_interval(interval);
    }

    pub fn transport(&self) -> Transport {
        *self.transport.read()
    }

    pub fn set_transport(&self, transport: Transport) {
        *self.transport.write() = transport;
    }

    pub fn state(&self) -> PeerState {
        self.state.current()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_ready()
    }

    pub fn transition(&self, to: PeerState) -> Result<(), Error> {
        self.state.transition(to)?;
        if to == PeerState::Open {
            self.backoff.write().reset();
            self.record_activity();
        }
        Ok(())
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities.read().clone()
    }

    pub fn record_capabilities(&self, caps: Capabilities) {
        *self.capabilities.write() = Some(caps);
    }

    /// Allocates the next unique Hop-by-Hop-Id for a request sent on
    /// this connection. Unique only for the lifetime of one connection,
    /// per RFC 6733 §3 — a fresh one starts at 1 on every reconnect.
    pub fn next_hop_by_hop_id(&self) -> u32 {
        self.next_hop_by_hop_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn track_request(&self, hop_by_hop_id: u32, timeout: Duration) -> Result<(), Error> {
        self.pending.insert(hop_by_hop_id, self.clock.now() + timeout)
    }

    pub fn complete_request(&self, hop_by_hop_id: u32) -> Result<(), Error> {
        self.pending.complete(hop_by_hop_id)
    }

    pub fn outstanding_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn expired_requests(&self) -> Vec<u32> {
        self.pending.expired(self.clock.now())
    }

    pub fn drop_pending_requests(&self) -> Vec<u32> {
        self.pending.drop_all()
    }

    pub fn record_activity(&self) {
        *self.last_activity.write() = self.clock.now();
    }

    /// Whether the watchdog timer Tw has expired, meaning a DWR should
    /// be sent. Resets the deadline with a fresh jittered interval.
    pub fn watchdog_due(&self) -> bool {
        let now = self.clock.now();
        let mut deadline = self.next_watchdog_deadline.write();
        if now < *deadline {
            return false;
        }
        *deadline = now + jittered_watchdog_interval(*self.watchdog_interval.read());
        true
    }

    /// Whether the last DWR has gone unanswered past 2×Tw, meaning this
    /// connection should be dropped.
    pub fn watchdog_timed_out(&self) -> bool {
        let elapsed = self.clock.now().duration_since(*self.last_activity.read());
        elapsed > *self.watchdog_interval.read() * 2
    }

    /// The delay before the next reconnect attempt, for persistent
    /// peers that just lost their connection.
    pub fn next_reconnect_delay(&self) -> Duration {
        self.backoff.write().next()
    }
}
