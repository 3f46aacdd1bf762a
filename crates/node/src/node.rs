use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;

use peer::{Peer, PeerId, PeerRole, PeerState, SystemClock};

use crate::binding::ApplicationBinding;
use crate::error::DispatchError;
use crate::routing::RoutingAgent;

/// This node's own identity and the handful of CER/CEA fields it
/// advertises to every peer it connects to.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub origin_host: String,
    pub origin_realm: String,
    pub product_name: String,
    pub vendor_ids: Vec<u32>,
    pub firmware_revision: u32,
}

/// Owns every peer connection and the per-application-id binding table
/// that decides which peers and realms each application serves.
///
/// Holds no sockets: `add_peer`/`add_application` register state built
/// elsewhere (the embedding binary's transport loop), and `dispatch_*`
/// answers pure questions about that state — which application should
/// handle an inbound request, and which peer an outbound request should
/// go out on.
pub struct Node {
    pub identity: NodeIdentity,
    peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
    applications: RwLock<HashMap<u32, ApplicationBinding>>,
    routing: RoutingAgent,
    clock: Arc<dyn peer::Clock>,
}

impl Node {
    pub fn new(identity: NodeIdentity) -> Self {
        Self::with_clock(identity, Arc::new(SystemClock))
    }

    pub fn with_clock(identity: NodeIdentity, clock: Arc<dyn peer::Clock>) -> Self {
        Self {
            identity,
            peers: RwLock::new(HashMap::default()),
            applications: RwLock::new(HashMap::default()),
            routing: RoutingAgent::new(),
            clock,
        }
    }

    pub fn add_peer(&self, id: PeerId, role: PeerRole) -> Arc<Peer> {
        let peer = Arc::new(Peer::new(id.clone(), role, self.clock.clone()));
        self.peers.write().insert(id, peer.clone());
        peer
    }

    pub fn remove_peer(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.peers.write().remove(id)
    }

    pub fn peer(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.peers.read().get(id).cloned()
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    pub fn add_application(&self, application_id: u32, binding: ApplicationBinding) {
        self.applications.write().insert(application_id, binding);
    }

    /// Picks which application should handle an inbound request: the
    /// one bound to `application_id` whose realm set admits the
    /// inbound peer's realm (spec §4.3).
    pub fn dispatch_inbound(&self, application_id: u32, inbound_realm: &str) -> Result<(), DispatchError> {
        let applications = self.applications.read();
        let binding = applications
            .get(&application_id)
            .ok_or(DispatchError::RealmNotServed)?;

        if binding.serves_realm(inbound_realm) {
            Ok(())
        } else {
            Err(DispatchError::RealmNotServed)
        }
    }

    /// Picks the next-hop peer for an outbound request per the routing
    /// agent policy (spec §4.6): Open, bound to `application_id`,
    /// whose realm matches `destination_realm`.
    pub fn route_outbound(
        &self,
        application_id: u32,
        destination_realm: &str,
        route_records: &[String],
    ) -> Result<PeerId, DispatchError> {
        let applications = self.applications.read();
        let binding = applications
            .get(&application_id)
            .ok_or(DispatchError::UnableToDeliver)?;

        let peers = self.peers.read();
        let candidates: Vec<(PeerId, Arc<Peer>)> = binding
            .peers
            .iter()
            .filter_map(|id| peers.get(id).map(|p| (id.clone(), p.clone())))
            .filter(|(id, p)| id.origin_realm == destination_realm && p.state() == PeerState::Open)
            .collect();

        self.routing
            .select(&self.identity.origin_host, route_records, &candidates)
            .cloned()
    }

    /// Initiates a graceful shutdown of every peer: Open connections
    /// transition to Closing (the caller is responsible for actually
    /// sending DPR on the wire before calling this).
    pub fn begin_shutdown(&self) {
        for peer in self.peers.read().values() {
            if peer.is_open() {
                let _ = peer.transition(PeerState::Closing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> NodeIdentity {
        NodeIdentity {
            origin_host: "dsc.example.com".to_string(),
            origin_realm: "example.com".to_string(),
            product_name: "diameter-toolkit".to_string(),
            vendor_ids: vec![10415],
            firmware_revision: 1,
        }
    }

    #[test]
    fn unbound_application_id_is_unable_to_deliver() {
        let node = Node::new(identity());
        let err = node
            .route_outbound(16777238, "example.com", &[])
            .unwrap_err();
        assert_eq!(err, DispatchError::UnableToDeliver);
    }

    #[test]
    fn routes_to_the_only_open_bound_peer_for_the_realm() {
        let node = Node::new(identity());
        let peer_id = PeerId::new("pcrf1.example.com", "example.com");
        let peer = node.add_peer(peer_id.clone(), PeerRole::Persistent);
        peer.transition(PeerState::WaitConnAck).unwrap();
        peer.transition(PeerState::WaitCea).unwrap();
        peer.transition(PeerState::Open).unwrap();

        node.add_application(16777238, ApplicationBinding::new([peer_id.clone()], []));

        let routed = node.route_outbound(16777238, "example.com", &[]).unwrap();
        assert_eq!(routed, peer_id);
    }

    #[test]
    fn a_peer_that_is_not_open_is_never_a_candidate() {
        let node = Node::new(identity());
        let peer_id = PeerId::new("pcrf1.example.com", "example.com");
        node.add_peer(peer_id.clone(), PeerRole::Persistent);
        node.add_application(16777238, ApplicationBinding::new([peer_id], []));

        let err = node
            .route_outbound(16777238, "example.com", &[])
            .unwrap_err();
        assert_eq!(err, DispatchError::UnableToDeliver);
    }

    #[test]
    fn dispatch_inbound_honors_an_any_realm_binding() {
        let node = Node::new(identity());
        node.add_application(0, ApplicationBinding::new([], []));
        node.dispatch_inbound(0, "anything.example.com").unwrap();
    }
}
