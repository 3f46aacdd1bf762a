//! Drives one peer's TCP connection: reads bytes into a buffer, frames
//! them into messages with [`codec::RawDiameterCodec`], answers the
//! base-protocol exchanges (CER/CEA, DWR/DWA, DPR/DPA) itself, routes
//! decoded answers to the [`crate::gateway::PeerGateway`] waiting for
//! them, and hands everything else to the node's dispatch callback.

use std::sync::Arc;

use bytes::BytesMut;
use codec::constants::{command, result_code};
use codec::{CommandFlags, Header, Message, MessageCodec, RawDiameterCodec, HEADER_LEN};
use node::{Node, NodeIdentity};
use peer::{Capabilities, Peer, PeerId, PeerRole, PeerState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::gateway::PeerGateway;

const READ_CHUNK: usize = 4096;

/// How often the connection loop checks watchdog deadlines and
/// pending-request timeouts. Fine-grained relative to Tw (default 30s)
/// so a configured short Tw in tests still fires within its own
/// jittered window (spec §8 property 5).
const TIMER_TICK: std::time::Duration = std::time::Duration::from_millis(50);

/// Handles one inbound request that isn't part of the base protocol
/// handshake, returning the answer to write back (if any). `from`
/// identifies the peer the request arrived on, needed by a routing
/// agent forwarding it onward (spec §4.6).
pub trait Dispatch: Send + Sync {
    fn handle(&self, from: &PeerId, message: Message) -> Option<Message>;
}

impl<F> Dispatch for F
where
    F: Fn(&PeerId, Message) -> Option<Message> + Send + Sync,
{
    fn handle(&self, from: &PeerId, message: Message) -> Option<Message> {
        self(from, message)
    }
}

/// Runs a single peer connection to completion: performs the CER/CEA
/// handshake appropriate to `peer`'s role (the caller has already put
/// `peer` into `WaitConnAck`/`WaitCer` as appropriate), registers this
/// connection's outbound channel with `gateway` for the duration, then
/// loops reading, answering, and forwarding messages until the socket
/// closes or the peer moves to `Closing`.
pub async fn run_connection<S>(
    mut stream: S,
    peer: Arc<Peer>,
    gateway: Arc<PeerGateway>,
    dispatch: Arc<dyn Dispatch>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let codec = RawDiameterCodec;
    let mut read_buf = BytesMut::with_capacity(READ_CHUNK);
    let identity = gateway.node.identity.clone();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    gateway.registry.register(peer.id.clone(), outbound_tx);

    let result = drive_connection(
        &mut stream,
        &mut read_buf,
        &codec,
        &peer,
        &identity,
        dispatch.as_ref(),
        gateway.as_ref(),
        &mut outbound_rx,
    )
    .await;

    gateway.close_peer(&peer.id, &identity);
    result
}

/// Runs one passively accepted connection to completion. A peer that
/// dials in isn't known by its real Diameter identity until its CER
/// arrives, so unlike [`run_connection`] this reads and answers the CER
/// itself first, re-using whatever peer was pre-configured under the
/// advertised Origin-Host/Origin-Realm (or creating an ad hoc transient
/// one) before handing off to the shared connection loop — otherwise
/// the connection would live under a placeholder identity the routing
/// agent and application bindings can never match (spec §4.2, §4.6).
pub async fn accept_connection<S>(
    mut stream: S,
    node: Arc<Node>,
    gateway: Arc<PeerGateway>,
    dispatch: Arc<dyn Dispatch>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let codec = RawDiameterCodec;
    let mut read_buf = BytesMut::with_capacity(READ_CHUNK);
    let identity = gateway.node.identity.clone();

    let cer = read_one_message(&mut stream, &codec, &mut read_buf).await?;
    if cer.header.command_code != command::CAPABILITIES_EXCHANGE || !cer.header.flags.is_request() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "expected Capabilities-Exchange-Request as the first message on an accepted connection",
        ));
    }

    let remote_id = PeerId::new(
        cer.origin_host().unwrap_or_default(),
        cer.origin_realm().unwrap_or_default(),
    );
    let peer = node.peer(&remote_id).unwrap_or_else(|| node.add_peer(remote_id, PeerRole::Transient));
    peer.transition(PeerState::WaitCer).ok();
    let answer = handle_cer(&peer, &identity, &cer);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    gateway.registry.register(peer.id.clone(), outbound_tx);

    write_message(&mut stream, &codec, &answer).await?;

    let result = drive_connection(
        &mut stream,
        &mut read_buf,
        &codec,
        &peer,
        &identity,
        dispatch.as_ref(),
        gateway.as_ref(),
        &mut outbound_rx,
    )
    .await;

    gateway.close_peer(&peer.id, &identity);
    result
}

/// Reads until one full message is framed, for a connection that has no
/// outbound queue registered yet (so there is nothing to race against).
async fn read_one_message<S>(stream: &mut S, codec: &RawDiameterCodec, read_buf: &mut BytesMut) -> std::io::Result<Message>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(message) = codec.try_decode(read_buf).unwrap_or(None) {
            return Ok(message);
        }
        read_buf.reserve(READ_CHUNK);
        let read = stream.read_buf(read_buf).await?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before completing the capabilities exchange",
            ));
        }
    }
}

async fn drive_connection<S>(
    stream: &mut S,
    read_buf: &mut BytesMut,
    codec: &RawDiameterCodec,
    peer: &Arc<Peer>,
    identity: &NodeIdentity,
    dispatch: &dyn Dispatch,
    gateway: &PeerGateway,
    outbound_rx: &mut mpsc::UnboundedReceiver<Message>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if peer.state() == PeerState::WaitConnAck {
        peer.transition(PeerState::WaitCea).ok();
        let cer = build_cer(identity, peer);
        write_message(stream, codec, &cer).await?;
    }

    let mut timer = tokio::time::interval(TIMER_TICK);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if let Some(message) = codec.try_decode(read_buf).unwrap_or(None) {
            peer.record_activity();
            if let Some(answer) = handle_message(peer, identity, &message, dispatch, gateway) {
                write_message(stream, codec, &answer).await?;
            }
            if peer.state() == PeerState::Closing {
                return Ok(());
            }
            continue;
        }

        read_buf.reserve(READ_CHUNK);
        tokio::select! {
            read = stream.read_buf(read_buf) => {
                let read = read?;
                if read == 0 {
                    peer.transition(PeerState::Closed).ok();
                    return Ok(());
                }
            }
            Some(outbound) = outbound_rx.recv() => {
                write_message(stream, codec, &outbound).await?;
            }
            _ = timer.tick() => {
                if peer.state() == PeerState::Open {
                    if peer.watchdog_timed_out() {
                        peer.transition(PeerState::Closing).ok();
                        return Ok(());
                    }
                    if peer.watchdog_due() {
                        let dwr = build_dwr(identity, peer);
                        write_message(stream, codec, &dwr).await?;
                    }
                }
                for hop_by_hop_id in peer.expired_requests() {
                    peer.complete_request(hop_by_hop_id).ok();
                    gateway.fail_expired(&peer.id, hop_by_hop_id, identity);
                }
            }
        }
    }
}

fn handle_message(
    peer: &Arc<Peer>,
    identity: &NodeIdentity,
    message: &Message,
    dispatch: &dyn Dispatch,
    gateway: &PeerGateway,
) -> Option<Message> {
    match message.header.command_code {
        command::CAPABILITIES_EXCHANGE if message.header.flags.is_request() => {
            handle_cer(peer, identity, message)
        }
        command::CAPABILITIES_EXCHANGE => {
            handle_cea(peer, message);
            None
        }
        command::DEVICE_WATCHDOG if message.header.flags.is_request() => Some(answer_dwr(identity, message)),
        command::DEVICE_WATCHDOG => None,
        command::DISCONNECT_PEER if message.header.flags.is_request() => {
            let answer = answer_dpr(identity, message);
            peer.transition(PeerState::Closing).ok();
            Some(answer)
        }
        _ if message.header.flags.is_request() => {
            match gateway.node.dispatch_inbound(message.header.application_id, &peer.id.origin_realm) {
                Ok(()) => dispatch.handle(&peer.id, message.clone()),
                Err(err) => Some(error_answer(identity, message, err.result_code())),
            }
        }
        _ => {
            gateway.complete_answer(peer, message.clone());
            None
        }
    }
}

fn handle_cer(peer: &Arc<Peer>, identity: &NodeIdentity, message: &Message) -> Message {
    record_capabilities(peer, message);
    if peer.transition(PeerState::Open).is_err() {
        peer.transition(PeerState::Closing).ok();
    }

    let mut answer = Message::new(message.answer_header());
    answer.set_result_code(result_code::SUCCESS);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer.set_product_name(&identity.product_name);
    answer
}

fn handle_cea(peer: &Arc<Peer>, message: &Message) {
    if message.result_code() == Some(result_code::SUCCESS) {
        record_capabilities(peer, message);
        peer.transition(PeerState::Open).ok();
    } else {
        peer.transition(PeerState::Closing).ok();
    }
}

fn record_capabilities(peer: &Arc<Peer>, message: &Message) {
    peer.record_capabilities(Capabilities {
        host_ip_addresses: message.host_ip_address().into_iter().collect(),
        supported_applications: message
            .auth_application_id()
            .into_iter()
            .chain(message.acct_application_id())
            .collect(),
        vendor_ids: message.supported_vendor_ids(),
        product_name: message.product_name().map(str::to_owned),
    });
}

fn build_cer(identity: &NodeIdentity, peer: &Peer) -> Message {
    let mut message = Message::new(Header {
        version: 1,
        length: 0,
        flags: CommandFlags::request(),
        command_code: command::CAPABILITIES_EXCHANGE,
        application_id: codec::constants::application::COMMON,
        hop_by_hop_id: peer.next_hop_by_hop_id(),
        end_to_end_id: peer.next_hop_by_hop_id(),
    });
    message.set_origin_host(&identity.origin_host);
    message.set_origin_realm(&identity.origin_realm);
    message.set_product_name(&identity.product_name);
    message.set_firmware_revision(identity.firmware_revision);
    for vendor_id in &identity.vendor_ids {
        message.append_supported_vendor_id(*vendor_id);
    }
    message
}

/// Builds an outbound DWR for the watchdog sweep to send when Tw
/// expires with no traffic on this peer (spec §4.2). Not tracked in
/// the pending-request table: liveness is judged by
/// [`Peer::watchdog_timed_out`]'s idle-time check, not by correlating
/// this specific hop-by-hop-id to its DWA.
fn build_dwr(identity: &NodeIdentity, peer: &Peer) -> Message {
    let mut message = Message::new(Header {
        version: 1,
        length: 0,
        flags: CommandFlags::request(),
        command_code: command::DEVICE_WATCHDOG,
        application_id: codec::constants::application::COMMON,
        hop_by_hop_id: peer.next_hop_by_hop_id(),
        end_to_end_id: peer.next_hop_by_hop_id(),
    });
    message.set_origin_host(&identity.origin_host);
    message.set_origin_realm(&identity.origin_realm);
    message
}

/// Builds an error answer stamped with this node's own identity, for
/// the realm-not-served check ahead of every application dispatch
/// (spec §7 "Realm not served ... 3003").
fn error_answer(identity: &NodeIdentity, message: &Message, code: u32) -> Message {
    let mut answer = Message::new(message.answer_header());
    answer.set_result_code(code);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer
}

fn answer_dwr(identity: &NodeIdentity, message: &Message) -> Message {
    let mut answer = Message::new(message.answer_header());
    answer.set_result_code(result_code::SUCCESS);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer
}

fn answer_dpr(identity: &NodeIdentity, message: &Message) -> Message {
    let mut answer = Message::new(message.answer_header());
    answer.set_result_code(result_code::SUCCESS);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer
}

async fn write_message<S>(stream: &mut S, codec: &RawDiameterCodec, message: &Message) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    codec.encode(message, &mut buf);
    stream.write_all(&buf).await
}
