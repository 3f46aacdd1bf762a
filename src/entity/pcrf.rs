use std::sync::Arc;

use codec::constants::application;
use codec::header::{CommandFlags, Header};
use node::ApplicationBinding;
use parking_lot::RwLock;
use session::{rx, Application, ApnRegistry, GxSession, RxSession, SySession};

use crate::config::NodeConfig;
use crate::dispatch::{self, ApplicationRouter, GxServerDispatch, RxServerDispatch, SyServerDispatch};
use crate::entity::DiameterEntity;
use crate::gateway::SendError;

/// A PCRF: the policy decision point, speaking Gx to PCEFs, Rx to
/// application functions, and Sy to an OCS (spec §4.7, grounded on the
/// source's `PCRF`).
pub struct Pcrf {
    pub entity: DiameterEntity,
    pub gx: Arc<Application<GxSession>>,
    pub rx: Arc<Application<RxSession>>,
    pub sy: Arc<Application<SySession>>,
    pub apns: Arc<RwLock<ApnRegistry>>,
}

impl Pcrf {
    pub fn new(config: NodeConfig) -> Self {
        let entity = DiameterEntity::new(config.clone());
        Self {
            gx: Arc::new(Application::new(application::GX, true, false)),
            rx: Arc::new(Application::new(application::RX, true, false)),
            sy: Arc::new(Application::new(application::SY, true, false)),
            apns: Arc::new(RwLock::new(ApnRegistry::new())),
            entity,
        }
    }

    pub fn add_gx_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        bind(&self.entity, application::GX, peers, realms);
    }

    pub fn add_rx_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        bind(&self.entity, application::RX, peers, realms);
    }

    pub fn add_sy_peers(&self, peers: impl IntoIterator<Item = (String, String, bool)>, realms: impl IntoIterator<Item = String>) {
        bind(&self.entity, application::SY, peers, realms);
    }

    /// Registers an APN this PCRF releases Gx leases back to on CCR-T
    /// (spec §4.5 "release is guaranteed on session destruction").
    pub fn register_apn(&self, apn: ip_pool::Apn) {
        self.apns.write().register(apn);
    }

    /// Starts answering inbound Gx, Rx and Sy requests, multiplexed by
    /// application-id onto one `Dispatch` (spec §4.7).
    pub async fn start(&self) -> std::io::Result<()> {
        let identity = self.entity.node.identity.clone();
        let router = Arc::new(ApplicationRouter::new());
        router.register(
            application::GX,
            Arc::new(GxServerDispatch::new(self.gx.store.clone(), self.apns.clone(), identity.clone())),
        );
        router.register(
            application::RX,
            Arc::new(RxServerDispatch::new(self.rx.store.clone(), self.gx.store.clone(), identity.clone())),
        );
        router.register(
            application::SY,
            Arc::new(SyServerDispatch::new(self.sy.store.clone(), identity, self.sy_policy())),
        );
        self.entity.start(router).await
    }

    /// The Sy policy lookup handed to [`SyServerDispatch`]; overridden
    /// per deployment by constructing [`SyServerDispatch`] directly if
    /// the default (every counter under limit) isn't suitable.
    fn sy_policy(&self) -> Arc<dyn Fn(&str) -> Vec<(String, bool)> + Send + Sync> {
        Arc::new(|_session_id| Vec::new())
    }

    /// Administratively terminates an open Rx session: sends an ASR to
    /// the peer holding it, and on a successful ASA sends the STR
    /// addressed back to that same peer (spec §4.5 Rx binding rules;
    /// §9 open question on STR addressing).
    pub async fn abort_rx_session(&self, session_id: &str, destination_realm: &str) -> Result<(), SendError> {
        let mut asr = codec::Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code: codec::constants::command::ABORT_SESSION,
            application_id: application::RX,
            hop_by_hop_id: 0,
            end_to_end_id: 0,
        });
        asr.set_session_id(session_id);
        asr.set_origin_host(&self.entity.node.identity.origin_host);
        asr.set_origin_realm(&self.entity.node.identity.origin_realm);

        let asa = dispatch::send_rx_request(&self.entity.gateway, &self.rx.store, destination_realm, asr).await?;
        if asa.result_code() != Some(codec::constants::result_code::SUCCESS) {
            return Ok(());
        }

        let str_request = rx::build_administrative_str(
            session_id,
            &asa,
            &self.entity.node.identity.origin_host,
            &self.entity.node.identity.origin_realm,
        );
        dispatch::send_rx_request(&self.entity.gateway, &self.rx.store, destination_realm, str_request).await?;
        Ok(())
    }
}

fn bind(
    entity: &DiameterEntity,
    application_id: u32,
    peers: impl IntoIterator<Item = (String, String, bool)>,
    realms: impl IntoIterator<Item = String>,
) {
    let peer_ids = peers
        .into_iter()
        .map(|(host, realm, persistent)| entity.add_peer(&host, &realm, persistent))
        .collect::<Vec<_>>();
    entity
        .node
        .add_application(application_id, ApplicationBinding::new(peer_ids, realms));
}
