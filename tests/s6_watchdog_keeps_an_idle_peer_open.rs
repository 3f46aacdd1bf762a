//! S6 (spec §8): with no application traffic at all, a peer whose
//! watchdog interval (Tw) is configured short still emits DWR before
//! its own 2×Tw idle deadline, and the automatic DWA answer on the
//! other end resets that deadline — so the connection survives well
//! past what a single Tw window would allow on its own.

mod common;

use std::sync::Arc;
use std::time::Duration;

use diameter_toolkit::{NodeConfig, Pcef, Pcrf};
use peer::{PeerId, PeerState};

#[tokio::test]
async fn s6_a_short_watchdog_interval_keeps_an_otherwise_idle_peer_open() {
    let mut pcef_config = NodeConfig::new("pgw.example.com", "pgw.example.com");
    pcef_config.watchdog_interval_secs = 1;
    let mut pcrf_config = NodeConfig::new("pcrf.example.com", "pcrf.example.com");
    pcrf_config.watchdog_interval_secs = 1;

    let pcef = Pcef::new(pcef_config);
    let pcrf = Pcrf::new(pcrf_config);

    pcef.add_gx_peers([("pcrf.example.com".to_string(), "pcrf.example.com".to_string(), true)], []);
    pcrf.add_gx_peers([("pgw.example.com".to_string(), "pgw.example.com".to_string(), false)], []);

    let no_dispatch: Arc<dyn diameter_toolkit::transport::Dispatch> = Arc::new(common::no_dispatch);

    let peer = common::connect(
        &pcef.entity,
        PeerId::new("pcrf.example.com", "pcrf.example.com"),
        no_dispatch.clone(),
        &pcrf.entity,
        no_dispatch,
    )
    .await;

    // 2×Tw (the idle-drop deadline a node with no watchdog at all would
    // hit) is 2s here; wait past it without ever sending application
    // traffic and confirm the automatic DWR/DWA cycle kept it alive.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(peer.state(), PeerState::Open, "the watchdog cycle should have kept this peer open");

    let pcrf_peer = pcrf
        .entity
        .node
        .peer(&PeerId::new("pgw.example.com", "pgw.example.com"))
        .expect("the pcrf side registered the inbound peer under the pcef's asserted identity");
    assert_eq!(pcrf_peer.state(), PeerState::Open);
}
