use std::sync::Arc;

use codec::Message;
use node::ApplicationBinding;
use parking_lot::RwLock;
use session::{Application, ApnRegistry, GxSession};

use crate::config::NodeConfig;
use crate::dispatch::{self, GxServerDispatch};
use crate::entity::DiameterEntity;
use crate::gateway::SendError;

/// A PCEF: speaks Gx to one or more PCRFs to request and receive policy
/// and charging control decisions (spec §4.7, grounded on the source's
/// `PCEF`).
pub struct Pcef {
    pub entity: DiameterEntity,
    pub gx: Arc<Application<GxSession>>,
    pub apns: Arc<RwLock<ApnRegistry>>,
}

impl Pcef {
    pub fn new(config: NodeConfig) -> Self {
        let entity = DiameterEntity::new(config.clone());
        let gx = Arc::new(Application::new(codec::constants::application::GX, true, false));
        Self {
            entity,
            gx,
            apns: Arc::new(RwLock::new(ApnRegistry::new())),
        }
    }

    pub fn add_gx_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        let peer_ids = peers
            .into_iter()
            .map(|(host, realm, persistent)| self.entity.add_peer(&host, &realm, persistent))
            .collect::<Vec<_>>();
        self.entity
            .node
            .add_application(codec::constants::application::GX, ApplicationBinding::new(peer_ids, realms));
    }

    /// Registers an APN this PCEF leases Framed-IP-Addresses from
    /// before attaching them to a CCR-I.
    pub fn register_apn(&self, apn: ip_pool::Apn) {
        self.apns.write().register(apn);
    }

    /// Starts answering inbound requests against this PCEF's Gx
    /// application (RAR over an existing session, most commonly).
    pub async fn start(&self) -> std::io::Result<()> {
        let dispatch = Arc::new(GxServerDispatch::new(
            self.gx.store.clone(),
            self.apns.clone(),
            self.entity.node.identity.clone(),
        ));
        self.entity.start(dispatch).await
    }

    /// Sends a CCR built by the caller (typically after populating its
    /// own AVPs and, for CCR-I, leasing an address via [`Pcef::register_apn`]
    /// and setting it on the request), binding it into this PCEF's Gx
    /// session store before and after the exchange.
    pub async fn send_ccr(&self, destination_realm: &str, request: Message) -> Result<Message, SendError> {
        dispatch::send_gx_request(&self.entity.gateway, &self.gx.store, destination_realm, request).await
    }
}
