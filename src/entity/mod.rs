//! Entity façades: PCEF, PCRF, AF, OCS and DSC, each a thin assembly of
//! a [`node::Node`] plus the applications that particular role speaks
//! (spec §4.7), mirroring how the source composes `DiameterEntity`
//! subclasses out of `create_node` plus one `Application` per reference
//! point.

pub mod af;
pub mod dsc;
pub mod ocs;
pub mod pcef;
pub mod pcrf;

use std::sync::Arc;

use node::{Node, NodeIdentity};
use peer::{PeerId, PeerRole, PeerUri};
use tokio::net::{TcpListener, TcpStream};

use crate::config::NodeConfig;
use crate::gateway::PeerGateway;
use crate::transport::{self, Dispatch};

/// The shared machinery every façade wraps: a node's peer/application
/// state, the connection registry and correlation tables that let it
/// send and forward over real sockets, and the listener(s)/connectors
/// that keep its peers alive.
pub struct DiameterEntity {
    pub node: Arc<Node>,
    pub gateway: Arc<PeerGateway>,
    config: NodeConfig,
}

impl DiameterEntity {
    pub fn new(config: NodeConfig) -> Self {
        let identity = NodeIdentity {
            origin_host: config.origin_host.clone(),
            origin_realm: config.origin_realm.clone(),
            product_name: config.product_name.clone(),
            vendor_ids: config.vendor_ids.clone(),
            firmware_revision: config.firmware_revision,
        };
        let node = Arc::new(Node::new(identity));
        let gateway = Arc::new(PeerGateway::new(node.clone()));
        Self { node, gateway, config }
    }

    /// Registers a peer this node expects to either dial (`persistent`)
    /// or accept a connection from.
    pub fn add_peer(&self, origin_host: &str, origin_realm: &str, persistent: bool) -> PeerId {
        let id = PeerId::new(origin_host, origin_realm);
        let role = if persistent {
            PeerRole::Persistent
        } else {
            PeerRole::Transient
        };
        let peer = self.node.add_peer(id.clone(), role);
        peer.set_watchdog_interval(std::time::Duration::from_secs(self.config.watchdog_interval_secs));
        id
    }

    /// Registers a peer from its full `aaa://host:port;transport=...`
    /// form (spec §6), recording the advertised [`peer::Transport`] on
    /// it alongside the identity [`Self::add_peer`] already tracks. SCTP
    /// peers are registered the same as TCP ones; dialing one is left to
    /// an embedding binary's own transport, since this toolkit's
    /// concrete connection driver only speaks TCP today.
    pub fn add_peer_uri(&self, uri: &str, origin_realm: &str, persistent: bool) -> Result<PeerId, peer::Error> {
        let parsed = PeerUri::parse(uri)?;
        let id = self.add_peer(&parsed.host, origin_realm, persistent);
        if let Some(peer) = self.node.peer(&id) {
            peer.set_transport(parsed.transport);
        }
        Ok(id)
    }

    /// Binds `bind_addresses` and accepts inbound connections,
    /// answering base-protocol exchanges itself and handing every
    /// other request to `dispatch`. Returns once every listener has
    /// bound, leaving the accept loops running as background tasks.
    pub async fn start(&self, dispatch: Arc<dyn Dispatch>) -> std::io::Result<()> {
        for addr in self.config.bind_addresses.clone() {
            let listener = TcpListener::bind(addr).await?;
            let node = self.node.clone();
            let gateway = self.gateway.clone();
            let dispatch = dispatch.clone();

            tokio::spawn(async move {
                loop {
                    let Ok((stream, remote_addr)) = listener.accept().await else {
                        break;
                    };
                    accept_connection(stream, remote_addr, node.clone(), gateway.clone(), dispatch.clone());
                }
            });
        }
        Ok(())
    }

    /// Initiates a graceful shutdown: every Open peer moves to Closing
    /// (the connection task driving it sends DPR and closes).
    pub fn stop(&self) {
        self.node.begin_shutdown();
    }
}

fn accept_connection(
    stream: TcpStream,
    remote_addr: std::net::SocketAddr,
    node: Arc<Node>,
    gateway: Arc<PeerGateway>,
    dispatch: Arc<dyn Dispatch>,
) {
    tokio::spawn(async move {
        if let Err(err) = transport::accept_connection(stream, node, gateway, dispatch).await {
            log::warn!("connection from {remote_addr} ended: {err}");
        }
    });
}

/// Dials a persistent peer, retrying with the peer's own backoff
/// schedule is the embedding binary's responsibility; this performs a
/// single connection attempt and drives it until it ends.
pub async fn connect_peer(
    addr: std::net::SocketAddr,
    peer: Arc<peer::Peer>,
    gateway: Arc<PeerGateway>,
    dispatch: Arc<dyn Dispatch>,
) -> std::io::Result<()> {
    peer.transition(peer::PeerState::WaitConnAck).ok();
    let stream = TcpStream::connect(addr).await?;
    transport::run_connection(stream, peer, gateway, dispatch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NodeConfig {
        NodeConfig::new("pcrf.example.com", "example.com")
    }

    #[test]
    fn add_peer_uri_records_the_advertised_transport() {
        let entity = DiameterEntity::new(config());
        let id = entity
            .add_peer_uri("aaa://pcef.example.com:3868;transport=sctp", "example.com", true)
            .unwrap();
        let peer = entity.node.peer(&id).unwrap();
        assert_eq!(peer.transport(), peer::Transport::Sctp);
    }

    #[test]
    fn add_peer_uri_defaults_to_tcp_with_no_transport_parameter() {
        let entity = DiameterEntity::new(config());
        let id = entity
            .add_peer_uri("aaa://pcef.example.com:3868", "example.com", true)
            .unwrap();
        let peer = entity.node.peer(&id).unwrap();
        assert_eq!(peer.transport(), peer::Transport::Tcp);
    }

    #[test]
    fn add_peer_uri_rejects_a_malformed_uri() {
        let entity = DiameterEntity::new(config());
        assert!(entity.add_peer_uri("not-a-uri", "example.com", true).is_err());
    }
}
