//! Bridges the transport-agnostic `node`/`peer`/`session` crates to
//! live tokio connections: a registry of each connected peer's outbound
//! channel, the table that correlates a DSC-forwarded answer back to
//! the peer and hop-by-hop/end-to-end id that originated it, and the
//! send-and-await path an application uses to originate a request
//! (spec §4.2 "Receiving", §4.5 outgoing send, §4.6 routing agent, §5
//! "suspension points").

use std::sync::Arc;
use std::time::Duration;

use ahash::HashMap;
use codec::constants::result_code;
use codec::header::Header;
use codec::Message;
use node::{DispatchError, Node, NodeIdentity};
use parking_lot::{Mutex, RwLock};
use peer::{Peer, PeerId};
use tokio::sync::{mpsc, oneshot};

/// A node sends/forwards no traffic until some connection registers
/// itself here; accept/connect loops do that registration around
/// [`crate::transport::run_connection`] and
/// [`crate::transport::accept_connection`].
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// Every live peer connection's outbound channel, keyed by Diameter
/// identity rather than socket — messages handed to
/// [`ConnectionRegistry::send_to`] are delivered whichever connection
/// currently holds that peer, surviving a reconnect transparently.
#[derive(Default)]
pub struct ConnectionRegistry {
    outbound: RwLock<HashMap<PeerId, OutboundSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: PeerId, sender: OutboundSender) {
        self.outbound.write().insert(id, sender);
    }

    pub fn unregister(&self, id: &PeerId) {
        self.outbound.write().remove(id);
    }

    /// `false` means the peer has no live connection right now — the
    /// caller is responsible for turning that into whatever error its
    /// protocol layer expects.
    pub fn send_to(&self, id: &PeerId, message: Message) -> bool {
        self.outbound
            .read()
            .get(id)
            .map(|sender| sender.send(message).is_ok())
            .unwrap_or(false)
    }
}

/// Where a forwarded request's answer must go, and what header it must
/// be rewritten to carry: the peer it arrived from and its original
/// Hop-by-Hop/End-to-End-Id, before this node stamped its own for the
/// onward hop (spec §4.6 S4: "forwards it on the original incoming
/// peer with the original hop-by-hop-id and end-to-end-id").
#[derive(Debug, Clone)]
struct ForwardOrigin {
    peer_id: PeerId,
    header: Header,
}

#[derive(Default)]
struct ForwardTable {
    entries: Mutex<HashMap<(PeerId, u32), ForwardOrigin>>,
}

impl ForwardTable {
    fn insert(&self, target: PeerId, target_hop_by_hop_id: u32, origin: ForwardOrigin) {
        self.entries.lock().insert((target, target_hop_by_hop_id), origin);
    }

    fn take(&self, target: &PeerId, target_hop_by_hop_id: u32) -> Option<ForwardOrigin> {
        self.entries.lock().remove(&(target.clone(), target_hop_by_hop_id))
    }

    /// Drains every entry this node was waiting on an answer from
    /// `target` for, e.g. because `target`'s connection just died.
    fn drain_target(&self, target: &PeerId) -> Vec<((PeerId, u32), ForwardOrigin)> {
        let mut entries = self.entries.lock();
        let keys: Vec<(PeerId, u32)> = entries
            .keys()
            .filter(|(peer_id, _)| peer_id == target)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| entries.remove(&key).map(|origin| (key, origin)))
            .collect()
    }
}

/// Errors a send-and-await can resolve with (spec §7 error taxonomy).
#[derive(Debug)]
pub enum SendError {
    Dispatch(DispatchError),
    Timeout,
    PeerClosed,
    Cancelled,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch(err) => write!(f, "{err}"),
            Self::Timeout => write!(f, "timed out awaiting an answer"),
            Self::PeerClosed => write!(f, "peer connection closed with this request outstanding"),
            Self::Cancelled => write!(f, "the send-and-await was cancelled"),
        }
    }
}

impl std::error::Error for SendError {}

type AnswerSender = oneshot::Sender<Result<Message, SendError>>;

/// Oneshots for requests this node itself originated (as opposed to
/// forwarded on behalf of another peer), resolved when the matching
/// answer is decoded off the target peer's connection, or failed if
/// that connection dies first.
#[derive(Default)]
struct PendingAnswers {
    entries: Mutex<HashMap<(PeerId, u32), AnswerSender>>,
}

impl PendingAnswers {
    fn insert(&self, target: PeerId, hop_by_hop_id: u32, sender: AnswerSender) {
        self.entries.lock().insert((target, hop_by_hop_id), sender);
    }

    fn take(&self, target: &PeerId, hop_by_hop_id: u32) -> Option<AnswerSender> {
        self.entries.lock().remove(&(target.clone(), hop_by_hop_id))
    }

    fn drain_target(&self, target: &PeerId) -> Vec<AnswerSender> {
        let mut entries = self.entries.lock();
        let keys: Vec<(PeerId, u32)> = entries
            .keys()
            .filter(|(peer_id, _)| peer_id == target)
            .cloned()
            .collect();
        keys.into_iter().filter_map(|key| entries.remove(&key)).collect()
    }
}

/// Default outbound-send deadline when a caller doesn't pick its own
/// (used by the DSC forwarding path, which has no caller to ask).
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// The live half of a node: its in-memory peer/application state
/// ([`node::Node`]) plus the connection registry and correlation
/// tables that make outbound sends and DSC forwarding possible over
/// real sockets. One gateway is shared by every connection a
/// [`crate::entity::DiameterEntity`] drives.
pub struct PeerGateway {
    pub node: Arc<Node>,
    pub registry: Arc<ConnectionRegistry>,
    forward_table: ForwardTable,
    pending_answers: PendingAnswers,
}

impl PeerGateway {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            registry: Arc::new(ConnectionRegistry::new()),
            forward_table: ForwardTable::default(),
            pending_answers: PendingAnswers::default(),
        }
    }

    /// The DSC routing-agent path (spec §4.6): picks a next-hop peer for
    /// `message` by its Destination-Realm, stamps a fresh hop-by-hop-id
    /// for that connection, and remembers how to route the answer back.
    /// Returns an immediate error answer if routing fails; `None` means
    /// the request is in flight and its answer will arrive asynchronously
    /// on the target connection.
    pub fn forward(&self, inbound_peer: &PeerId, identity: &NodeIdentity, message: Message) -> Option<Message> {
        let destination_realm = message.destination_realm().unwrap_or_default().to_string();
        let route_records: Vec<String> = message.route_records().into_iter().map(str::to_owned).collect();

        let target_id = match self
            .node
            .route_outbound(message.header.application_id, &destination_realm, &route_records)
        {
            Ok(id) => id,
            Err(err) => return Some(error_answer(&message, identity, err.result_code())),
        };

        let Some(target_peer) = self.node.peer(&target_id) else {
            return Some(error_answer(&message, identity, result_code::UNABLE_TO_DELIVER));
        };

        let new_hop_by_hop_id = target_peer.next_hop_by_hop_id();
        if target_peer.track_request(new_hop_by_hop_id, DEFAULT_SEND_TIMEOUT).is_err() {
            return Some(error_answer(&message, identity, result_code::UNABLE_TO_COMPLY));
        }

        self.forward_table.insert(
            target_id.clone(),
            new_hop_by_hop_id,
            ForwardOrigin {
                peer_id: inbound_peer.clone(),
                header: message.header,
            },
        );

        let mut forwarded = message.clone();
        forwarded.append_route_record(&identity.origin_host);
        forwarded.header.hop_by_hop_id = new_hop_by_hop_id;

        if !self.registry.send_to(&target_id, forwarded) {
            self.forward_table.take(&target_id, new_hop_by_hop_id);
            let _ = target_peer.complete_request(new_hop_by_hop_id);
            return Some(error_answer(&message, identity, result_code::UNABLE_TO_DELIVER));
        }

        None
    }

    /// Decoded a non-request (answer) off `peer`'s connection: resolve
    /// it against whichever table is waiting for it — the forwarding
    /// table if this node forwarded the original request on behalf of
    /// another peer, else the local pending-answers table if this node
    /// originated it itself. An answer matching neither is logged and
    /// dropped (spec §4.2: "Unknown hop-by-hop answers are logged and
    /// dropped").
    pub fn complete_answer(&self, peer: &Peer, message: Message) {
        let hop_by_hop_id = message.header.hop_by_hop_id;
        let _ = peer.complete_request(hop_by_hop_id);

        if let Some(origin) = self.forward_table.take(&peer.id, hop_by_hop_id) {
            let mut translated = message;
            translated.header.hop_by_hop_id = origin.header.hop_by_hop_id;
            translated.header.end_to_end_id = origin.header.end_to_end_id;
            if !self.registry.send_to(&origin.peer_id, translated) {
                log::warn!(
                    "dropped a forwarded answer: originating peer {} is no longer connected",
                    origin.peer_id
                );
            }
            return;
        }

        if let Some(sender) = self.pending_answers.take(&peer.id, hop_by_hop_id) {
            let _ = sender.send(Ok(message));
            return;
        }

        log::warn!("peer {}: unmatched answer for hop-by-hop-id {hop_by_hop_id}", peer.id);
    }

    /// Sends `message` on the peer selected for `(application_id,
    /// destination_realm)` and awaits its answer or `timeout`, whichever
    /// comes first (spec §4.5 outgoing send; §5 "send-and-await blocks
    /// the caller ... on a completion handle"). The caller is
    /// responsible for binding `message`/the answer into a session
    /// before/after calling this.
    pub async fn send_and_await(
        &self,
        application_id: u32,
        destination_realm: &str,
        mut message: Message,
        timeout: Duration,
    ) -> Result<Message, SendError> {
        let target_id = self
            .node
            .route_outbound(application_id, destination_realm, &[])
            .map_err(SendError::Dispatch)?;
        let target_peer = self.node.peer(&target_id).ok_or(SendError::PeerClosed)?;

        let hop_by_hop_id = target_peer.next_hop_by_hop_id();
        target_peer
            .track_request(hop_by_hop_id, timeout)
            .map_err(|_| SendError::Dispatch(DispatchError::UnableToDeliver))?;

        let (tx, rx) = oneshot::channel();
        self.pending_answers.insert(target_id.clone(), hop_by_hop_id, tx);

        message.header.hop_by_hop_id = hop_by_hop_id;
        if !self.registry.send_to(&target_id, message) {
            self.pending_answers.take(&target_id, hop_by_hop_id);
            let _ = target_peer.complete_request(hop_by_hop_id);
            return Err(SendError::PeerClosed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SendError::Cancelled),
            Err(_) => {
                self.pending_answers.take(&target_id, hop_by_hop_id);
                let _ = target_peer.complete_request(hop_by_hop_id);
                Err(SendError::Timeout)
            }
        }
    }

    /// A request this node sent or forwarded on `peer_id`'s connection
    /// with `hop_by_hop_id` has passed its deadline with no answer
    /// (spec §7 "Timeout on send-and-await ... pending entry purged"):
    /// resolve whichever table was waiting on it, the same way
    /// [`PeerGateway::complete_answer`] would have on a real answer.
    /// The caller has already removed the entry from the peer's own
    /// pending-request table.
    pub fn fail_expired(&self, peer_id: &PeerId, hop_by_hop_id: u32, identity: &NodeIdentity) {
        if let Some(origin) = self.forward_table.take(peer_id, hop_by_hop_id) {
            let answer = error_answer_for_header(&origin.header, identity, result_code::UNABLE_TO_DELIVER);
            if !self.registry.send_to(&origin.peer_id, answer) {
                log::warn!("dropped a timed-out forward's failure answer: {} is gone too", origin.peer_id);
            }
            return;
        }

        if let Some(sender) = self.pending_answers.take(peer_id, hop_by_hop_id) {
            let _ = sender.send(Err(SendError::Timeout));
        }
    }

    /// A connection to `peer_id` just ended: unregister its outbound
    /// channel and fail every completion this gateway was still holding
    /// for it — forwards awaiting its answer and local sends alike —
    /// with `PeerClosed` (spec §7 "Peer-closed on outstanding requests").
    pub fn close_peer(&self, peer_id: &PeerId, identity: &NodeIdentity) {
        self.registry.unregister(peer_id);

        for (_, origin) in self.forward_table.drain_target(peer_id) {
            let answer = error_answer_for_header(&origin.header, identity, result_code::UNABLE_TO_DELIVER);
            if !self.registry.send_to(&origin.peer_id, answer) {
                log::warn!("dropped a pending forward's failure answer: {} is gone too", origin.peer_id);
            }
        }

        for sender in self.pending_answers.drain_target(peer_id) {
            let _ = sender.send(Err(SendError::PeerClosed));
        }
    }
}

fn error_answer(request: &Message, identity: &NodeIdentity, code: u32) -> Message {
    error_answer_for_header(&request.header, identity, code)
}

fn error_answer_for_header(request_header: &Header, identity: &NodeIdentity, code: u32) -> Message {
    let mut answer = Message::new(Header {
        flags: request_header.flags.as_answer(),
        length: 0,
        ..*request_header
    });
    answer.set_result_code(code);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::constants::{application, command};
    use codec::header::CommandFlags;
    use node::ApplicationBinding;
    use peer::{PeerRole, PeerState, SystemClock};

    fn identity(origin_host: &str, origin_realm: &str) -> NodeIdentity {
        NodeIdentity {
            origin_host: origin_host.to_string(),
            origin_realm: origin_realm.to_string(),
            product_name: "diameter-toolkit".to_string(),
            vendor_ids: vec![10415],
            firmware_revision: 1,
        }
    }

    fn ccr(destination_realm: &str, hbh: u32) -> Message {
        let mut msg = Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code: command::CREDIT_CONTROL,
            application_id: application::GX,
            hop_by_hop_id: hbh,
            end_to_end_id: hbh,
        });
        msg.set_session_id("pcef;1;1");
        msg.set_destination_realm(destination_realm);
        msg
    }

    fn open_peer(node: &Node, host: &str, realm: &str) -> PeerId {
        let id = PeerId::new(host, realm);
        let peer = node.add_peer(id.clone(), PeerRole::Persistent);
        peer.transition(PeerState::WaitConnAck).unwrap();
        peer.transition(PeerState::WaitCea).unwrap();
        peer.transition(PeerState::Open).unwrap();
        id
    }

    #[test]
    fn forward_answers_unable_to_deliver_with_no_open_candidate() {
        let node = Arc::new(Node::new(identity("dsc.example.com", "r.example.com")));
        let gateway = PeerGateway::new(node.clone());
        node.add_application(application::GX, ApplicationBinding::new([], ["b.example.com".to_string()]));

        let pcef = PeerId::new("pcef.example.com", "a.example.com");
        let answer = gateway
            .forward(&pcef, &identity("dsc.example.com", "r.example.com"), ccr("b.example.com", 1))
            .expect("no candidate, so an immediate error answer");
        assert_eq!(answer.result_code(), Some(result_code::UNABLE_TO_DELIVER));
    }

    #[test]
    fn forward_appends_the_route_record_and_stamps_a_fresh_hop_by_hop_id_for_the_target() {
        let node = Arc::new(Node::new(identity("dsc.example.com", "r.example.com")));
        let gateway = PeerGateway::new(node.clone());
        let pcrf = open_peer(&node, "pcrf.example.com", "b.example.com");
        node.add_application(application::GX, ApplicationBinding::new([pcrf.clone()], ["b.example.com".to_string()]));

        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.registry.register(pcrf.clone(), tx);

        let pcef = PeerId::new("pcef.example.com", "a.example.com");
        let outcome = gateway.forward(&pcef, &identity("dsc.example.com", "r.example.com"), ccr("b.example.com", 42));
        assert!(outcome.is_none());

        let forwarded = rx.try_recv().unwrap();
        assert_eq!(forwarded.route_records(), vec!["dsc.example.com"]);
        assert_ne!(forwarded.header.hop_by_hop_id, 42);
    }

    #[test]
    fn forward_rejects_a_route_that_already_contains_this_node() {
        let node = Arc::new(Node::new(identity("dsc.example.com", "r.example.com")));
        let gateway = PeerGateway::new(node.clone());
        let pcef = PeerId::new("pcef.example.com", "a.example.com");

        let mut request = ccr("b.example.com", 1);
        request.append_route_record("dsc.example.com");

        let answer = gateway
            .forward(&pcef, &identity("dsc.example.com", "r.example.com"), request)
            .expect("loop detected is an immediate error answer");
        assert_eq!(answer.result_code(), Some(result_code::LOOP_DETECTED));
    }

    #[tokio::test]
    async fn complete_answer_translates_a_forwarded_answer_back_to_its_origin() {
        let node = Arc::new(Node::new(identity("dsc.example.com", "r.example.com")));
        let gateway = PeerGateway::new(node.clone());
        let pcrf_id = open_peer(&node, "pcrf.example.com", "b.example.com");
        node.add_application(
            application::GX,
            ApplicationBinding::new([pcrf_id.clone()], ["b.example.com".to_string()]),
        );

        let (pcrf_tx, mut pcrf_rx) = mpsc::unbounded_channel();
        gateway.registry.register(pcrf_id.clone(), pcrf_tx);
        let (pcef_tx, mut pcef_rx) = mpsc::unbounded_channel();
        let pcef_id = PeerId::new("pcef.example.com", "a.example.com");
        gateway.registry.register(pcef_id.clone(), pcef_tx);

        gateway.forward(&pcef_id, &identity("dsc.example.com", "r.example.com"), ccr("b.example.com", 42));
        let forwarded = pcrf_rx.try_recv().unwrap();

        let mut answer = Message::new(forwarded.answer_header());
        answer.set_result_code(result_code::SUCCESS);
        let pcrf_peer = node.peer(&pcrf_id).unwrap();
        gateway.complete_answer(&pcrf_peer, answer);

        let returned = pcef_rx.try_recv().unwrap();
        assert_eq!(returned.header.hop_by_hop_id, 42);
        assert_eq!(returned.result_code(), Some(result_code::SUCCESS));
    }
}
