//! Shared harness for the end-to-end scenarios in this directory.
//!
//! Every scenario drives a connection over an in-memory
//! `tokio::io::duplex` pair rather than a real socket, calling
//! [`transport::run_connection`]/[`transport::accept_connection`]
//! directly the same way [`diameter_toolkit::DiameterEntity::start`]
//! and its free function `connect_peer` do internally — that's the
//! only way to get two `DiameterEntity`s talking without binding a
//! port per test.

use std::sync::Arc;
use std::time::Duration;

use codec::Message;
use diameter_toolkit::{transport, DiameterEntity};
use peer::{Peer, PeerId, PeerState};

/// Polls until `peer` reaches `state`, failing the test rather than
/// hanging forever if it never does.
pub async fn wait_state(peer: &Arc<Peer>, state: PeerState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while peer.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} stuck at {}, never reached {state}", peer.id, peer.state()));
}

pub async fn wait_open(peer: &Arc<Peer>) {
    wait_state(peer, PeerState::Open).await;
}

/// A `Dispatch` that answers nothing — for the side of a connection
/// whose own application logic isn't what the scenario is exercising.
#[allow(dead_code)]
pub fn no_dispatch(_from: &PeerId, _message: Message) -> Option<Message> {
    None
}

/// Wires up a CER/CEA handshake between two already-configured
/// entities over an in-memory duplex pair: `dialer` sends the CER (the
/// same role [`diameter_toolkit::entity::connect_peer`] plays for a
/// persistent peer), `acceptor` reads it and answers first (the same
/// role [`DiameterEntity::start`]'s accept loop plays). Returns the
/// dialer's own view of the peer once it reaches `Open`.
///
/// `dialer_peer_on_dialer` is the identity under which `dialer` already
/// registered `acceptor` (via `add_*_peers`) — not necessarily
/// `acceptor`'s own Origin-Host/Origin-Realm, since a routing table
/// entry's realm tag is a local routing decision, not an assertion
/// about the remote node's identity (spec §4.6).
pub async fn connect(
    dialer: &DiameterEntity,
    dialer_peer_on_dialer: PeerId,
    dialer_dispatch: Arc<dyn transport::Dispatch>,
    acceptor: &DiameterEntity,
    acceptor_dispatch: Arc<dyn transport::Dispatch>,
) -> Arc<Peer> {
    let peer = dialer
        .node
        .peer(&dialer_peer_on_dialer)
        .expect("the dialer must have registered this peer before connecting");
    peer.transition(PeerState::WaitConnAck)
        .expect("a freshly registered peer starts Closed");

    let (dial_stream, accept_stream) = tokio::io::duplex(64 * 1024);

    let gateway = dialer.gateway.clone();
    let driven_peer = peer.clone();
    tokio::spawn(async move {
        if let Err(err) = transport::run_connection(dial_stream, driven_peer, gateway, dialer_dispatch).await {
            log::warn!("test dialer connection ended: {err}");
        }
    });

    let node = acceptor.node.clone();
    let gateway = acceptor.gateway.clone();
    tokio::spawn(async move {
        if let Err(err) = transport::accept_connection(accept_stream, node, gateway, acceptor_dispatch).await {
            log::warn!("test acceptor connection ended: {err}");
        }
    });

    wait_open(&peer).await;
    peer
}
