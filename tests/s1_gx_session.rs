//! S1 (spec §8): a PCEF opens a Gx session against a PCRF with CCR-I,
//! leasing a Framed-IP-Address out of a registered APN, then tears it
//! down with CCR-T — checking both sides' session stores (primary and
//! framed-IPv4 secondary index) before and after each leg.

mod common;

use std::sync::Arc;

use codec::constants::{application, cc_request_type, command, result_code};
use codec::header::{CommandFlags, Header};
use codec::Message;
use diameter_toolkit::dispatch::GxServerDispatch;
use diameter_toolkit::{NodeConfig, Pcef, Pcrf};
use peer::PeerId;

fn ccr(session_id: &str, req_type: u32, destination_realm: &str, apn: &str, hbh: u32) -> Message {
    let mut msg = Message::new(Header {
        version: 1,
        length: 0,
        flags: CommandFlags::request(),
        command_code: command::CREDIT_CONTROL,
        application_id: application::GX,
        hop_by_hop_id: hbh,
        end_to_end_id: hbh,
    });
    msg.set_session_id(session_id);
    msg.set_cc_request_type(req_type);
    msg.set_destination_realm(destination_realm);
    msg.set_called_station_id(apn);
    msg
}

#[tokio::test]
async fn s1_gx_session_open_and_close() {
    let pcef = Pcef::new(NodeConfig::new("pgw.example.com", "pgw.example.com"));
    let pcrf = Pcrf::new(NodeConfig::new("pcrf.example.com", "pcrf.example.com"));
    pcrf.register_apn(ip_pool::Apn::from_cidr("internet", "10.45.0.0/29").unwrap());

    pcef.add_gx_peers([("pcrf.example.com".to_string(), "pcrf.example.com".to_string(), true)], []);
    pcrf.add_gx_peers([("pgw.example.com".to_string(), "pgw.example.com".to_string(), false)], []);

    let pcef_dispatch: Arc<dyn diameter_toolkit::transport::Dispatch> = Arc::new(GxServerDispatch::new(
        pcef.gx.store.clone(),
        pcef.apns.clone(),
        pcef.entity.node.identity.clone(),
    ));
    let pcrf_dispatch: Arc<dyn diameter_toolkit::transport::Dispatch> = Arc::new(GxServerDispatch::new(
        pcrf.gx.store.clone(),
        pcrf.apns.clone(),
        pcrf.entity.node.identity.clone(),
    ));

    common::connect(
        &pcef.entity,
        PeerId::new("pcrf.example.com", "pcrf.example.com"),
        pcef_dispatch,
        &pcrf.entity,
        pcrf_dispatch,
    )
    .await;

    let cca_i = pcef
        .send_ccr(
            "pcrf.example.com",
            ccr("pgw;1;1", cc_request_type::INITIAL, "pcrf.example.com", "internet", 0),
        )
        .await
        .expect("a CCA-I");
    assert_eq!(cca_i.result_code(), Some(result_code::SUCCESS));
    let leased = cca_i.framed_ip_address().expect("CCA-I carries the leased address");

    let pcrf_session = pcrf.gx.store.get_by_id("pgw;1;1").expect("pcrf holds the session");
    assert_eq!(pcrf_session.framed_ip_address, Some(leased));
    assert!(pcrf.gx.store.get_by_framed_ipv4(leased).is_some());

    let pcef_session = pcef.gx.store.get_by_id("pgw;1;1").expect("pcef holds its own copy");
    assert_eq!(pcef_session.framed_ip_address, Some(leased));

    let cca_t = pcef
        .send_ccr(
            "pcrf.example.com",
            ccr("pgw;1;1", cc_request_type::TERMINATION, "pcrf.example.com", "internet", 0),
        )
        .await
        .expect("a CCA-T");
    assert_eq!(cca_t.result_code(), Some(result_code::SUCCESS));

    assert!(pcrf.gx.store.get_by_id("pgw;1;1").is_none());
    assert!(pcrf.gx.store.get_by_framed_ipv4(leased).is_none());
    assert!(pcef.gx.store.get_by_id("pgw;1;1").is_none());
}
