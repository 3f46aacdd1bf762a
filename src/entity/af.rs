use std::sync::Arc;

use codec::Message;
use node::ApplicationBinding;
use session::{Application, RxSession};

use crate::config::NodeConfig;
use crate::dispatch::{self, RxServerDispatch};
use crate::entity::DiameterEntity;
use crate::gateway::SendError;

/// An AF: requests QoS authorization for a media flow over Rx (spec
/// §4.7, grounded on the source's `AF`).
pub struct Af {
    pub entity: DiameterEntity,
    pub rx: Arc<Application<RxSession>>,
}

impl Af {
    pub fn new(config: NodeConfig) -> Self {
        let entity = DiameterEntity::new(config.clone());
        let rx = Arc::new(Application::new(codec::constants::application::RX, true, false));
        Self { entity, rx }
    }

    pub fn add_rx_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        let peer_ids = peers
            .into_iter()
            .map(|(host, realm, persistent)| self.entity.add_peer(&host, &realm, persistent))
            .collect::<Vec<_>>();
        self.entity
            .node
            .add_application(codec::constants::application::RX, ApplicationBinding::new(peer_ids, realms));
    }

    /// Starts answering inbound requests against this AF's Rx
    /// application — most notably the ASR a PCRF sends to abort a
    /// session it admitted.
    pub async fn start(&self) -> std::io::Result<()> {
        // An AF answers ASR with a plain success/failure, since it has
        // no Gx session of its own to cross-reference; reuse the Rx
        // server dispatch against an empty Gx store so AAR/STR keep
        // their ordinary binding behavior.
        let empty_gx_store = Arc::new(session::SessionStore::new());
        let dispatch = Arc::new(RxServerDispatch::new(
            self.rx.store.clone(),
            empty_gx_store,
            self.entity.node.identity.clone(),
        ));
        self.entity.start(dispatch).await
    }

    /// Sends an AAR built by the caller, binding it into this AF's Rx
    /// session store before and after the exchange.
    pub async fn send_aar(&self, destination_realm: &str, request: Message) -> Result<Message, SendError> {
        dispatch::send_rx_request(&self.entity.gateway, &self.rx.store, destination_realm, request).await
    }
}
