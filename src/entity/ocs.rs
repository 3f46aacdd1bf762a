use std::sync::Arc;

use node::ApplicationBinding;
use session::{Application, SySession};

use crate::config::NodeConfig;
use crate::dispatch::SyServerDispatch;
use crate::entity::DiameterEntity;

/// An OCS: answers Sy Spending-Limit-Requests with a subscriber's
/// policy counter statuses (spec §4.7, grounded on the source's `OCS`).
pub struct Ocs {
    pub entity: DiameterEntity,
    pub sy: Arc<Application<SySession>>,
    policy: Arc<dyn Fn(&str) -> Vec<(String, bool)> + Send + Sync>,
}

impl Ocs {
    pub fn new(config: NodeConfig) -> Self {
        Self::with_policy(config, Arc::new(|_session_id| Vec::new()))
    }

    /// Builds an OCS whose Spending-Limit-Answers are populated by
    /// `policy`, a lookup from a Sy session-id to its
    /// Policy-Counter-Status entries (spec §4.5 "the OCS policy table
    /// (external)").
    pub fn with_policy(config: NodeConfig, policy: Arc<dyn Fn(&str) -> Vec<(String, bool)> + Send + Sync>) -> Self {
        let entity = DiameterEntity::new(config.clone());
        let sy = Arc::new(Application::new(codec::constants::application::SY, true, false));
        Self { entity, sy, policy }
    }

    pub fn add_sy_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        let peer_ids = peers
            .into_iter()
            .map(|(host, realm, persistent)| self.entity.add_peer(&host, &realm, persistent))
            .collect::<Vec<_>>();
        self.entity
            .node
            .add_application(codec::constants::application::SY, ApplicationBinding::new(peer_ids, realms));
    }

    /// Starts answering inbound Sy requests against this OCS's policy
    /// lookup.
    pub async fn start(&self) -> std::io::Result<()> {
        let dispatch = Arc::new(SyServerDispatch::new(
            self.sy.store.clone(),
            self.entity.node.identity.clone(),
            self.policy.clone(),
        ));
        self.entity.start(dispatch).await
    }
}
