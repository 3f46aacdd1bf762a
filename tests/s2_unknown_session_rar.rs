//! S2 (spec §8): a Re-Auth-Request against a session-id the receiving
//! node has never heard of is answered UNKNOWN_SESSION_ID (5002) rather
//! than silently dropped or crashing the dispatch.

mod common;

use std::sync::Arc;

use codec::constants::{application, command, result_code};
use codec::header::{CommandFlags, Header};
use diameter_toolkit::dispatch::GxServerDispatch;
use diameter_toolkit::gateway::DEFAULT_SEND_TIMEOUT;
use diameter_toolkit::{NodeConfig, Pcef, Pcrf};
use peer::PeerId;

#[tokio::test]
async fn s2_unknown_session_rar_is_answered_unknown_session_id() {
    let pcef = Pcef::new(NodeConfig::new("pgw.example.com", "pgw.example.com"));
    let pcrf = Pcrf::new(NodeConfig::new("pcrf.example.com", "pcrf.example.com"));

    pcef.add_gx_peers([("pcrf.example.com".to_string(), "pcrf.example.com".to_string(), true)], []);
    pcrf.add_gx_peers([("pgw.example.com".to_string(), "pgw.example.com".to_string(), false)], []);

    let pcef_dispatch: Arc<dyn diameter_toolkit::transport::Dispatch> = Arc::new(GxServerDispatch::new(
        pcef.gx.store.clone(),
        pcef.apns.clone(),
        pcef.entity.node.identity.clone(),
    ));
    // The PCRF side of this scenario never answers anything — only the
    // PCEF's dispatch (answering the RAR the PCRF originates) is under
    // test.
    let pcrf_dispatch: Arc<dyn diameter_toolkit::transport::Dispatch> = Arc::new(common::no_dispatch);

    common::connect(
        &pcrf.entity,
        PeerId::new("pgw.example.com", "pgw.example.com"),
        pcrf_dispatch,
        &pcef.entity,
        pcef_dispatch,
    )
    .await;

    let mut rar = codec::Message::new(Header {
        version: 1,
        length: 0,
        flags: CommandFlags::request(),
        command_code: command::RE_AUTH,
        application_id: application::GX,
        hop_by_hop_id: 0,
        end_to_end_id: 1,
    });
    rar.set_session_id("nobody-has-this-session;1;1");

    let answer = pcrf
        .entity
        .gateway
        .send_and_await(application::GX, "pgw.example.com", rar, DEFAULT_SEND_TIMEOUT)
        .await
        .expect("an answer, even an error one");

    assert_eq!(answer.result_code(), Some(result_code::UNKNOWN_SESSION_ID));
}
