use std::sync::Arc;

use codec::Message;
use node::{ApplicationBinding, NodeIdentity};
use peer::PeerId;

use crate::config::NodeConfig;
use crate::entity::DiameterEntity;
use crate::gateway::PeerGateway;
use crate::transport::Dispatch;

/// A Diameter Signaling Controller: adds no application of its own — it
/// only enables the node's routing agent across every application-id
/// it has peers bound for (spec §4.6, §4.7).
pub struct Dsc {
    pub entity: DiameterEntity,
}

impl Dsc {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            entity: DiameterEntity::new(config),
        }
    }

    /// Registers a batch of peers this DSC forwards `application_id`
    /// traffic to, bound to the realms they serve.
    pub fn add_peers(
        &self,
        application_id: u32,
        peers: impl IntoIterator<Item = (String, String, bool)>,
        realms: impl IntoIterator<Item = String>,
    ) {
        let peer_ids = peers
            .into_iter()
            .map(|(host, realm, persistent)| self.entity.add_peer(&host, &realm, persistent))
            .collect::<Vec<_>>();
        self.entity
            .node
            .add_application(application_id, ApplicationBinding::new(peer_ids, realms));
    }

    /// Starts accepting connections and forwarding every request that
    /// arrives on one of them through this node's routing agent.
    pub async fn start(&self) -> std::io::Result<()> {
        let dispatch = Arc::new(self.routing_dispatch());
        self.entity.start(dispatch).await
    }

    /// Builds the `Dispatch` this DSC forwards requests through,
    /// without also starting a TCP listener for it.
    pub fn routing_dispatch(&self) -> RoutingDispatch {
        RoutingDispatch {
            gateway: self.entity.gateway.clone(),
            identity: self.entity.node.identity.clone(),
        }
    }
}

/// The `Dispatch` seam for a DSC: every request that isn't part of the
/// base protocol is forwarded onward per the routing agent policy
/// (spec §4.6), never answered locally by application logic.
pub struct RoutingDispatch {
    gateway: Arc<PeerGateway>,
    identity: NodeIdentity,
}

impl Dispatch for RoutingDispatch {
    fn handle(&self, from: &PeerId, message: Message) -> Option<Message> {
        self.gateway.forward(from, &self.identity, message)
    }
}
