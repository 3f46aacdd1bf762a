//! Per-application request handlers: the concrete [`Dispatch`] types
//! that apply each application's session binding rules (spec §4.5) and
//! answer from its session store, plus the client-side send helpers a
//! façade uses to originate a request through a [`PeerGateway`]. These
//! are the handlers every entity façade wires into
//! [`crate::entity::DiameterEntity::start`] in place of the
//! source's per-reference-point `Application` subclasses.

use std::sync::Arc;

use ahash::HashMap;
use codec::constants::{application, cc_request_type, command, result_code};
use codec::Message;
use node::NodeIdentity;
use parking_lot::RwLock;
use peer::PeerId;
use session::{ApnRegistry, GxSession, LoggedMessage, RxSession, SessionStore, SySession};

use crate::gateway::{PeerGateway, SendError, DEFAULT_SEND_TIMEOUT};
use crate::transport::Dispatch;

pub fn error_answer(request: &Message, identity: &NodeIdentity, code: u32) -> Message {
    let mut answer = Message::new(request.answer_header());
    answer.set_result_code(code);
    answer.set_origin_host(&identity.origin_host);
    answer.set_origin_realm(&identity.origin_realm);
    answer
}

fn success_answer(request: &Message, identity: &NodeIdentity) -> Message {
    error_answer(request, identity, result_code::SUCCESS)
}

/// Dispatches every application-id a node serves to the handler
/// registered for it, the request-routing analogue of [`node::Node`]'s
/// application bindings. Unregistered application-ids are logged and
/// dropped — no answer is sent, matching a node that never bound that
/// application in the first place.
#[derive(Default)]
pub struct ApplicationRouter {
    routes: RwLock<HashMap<u32, Arc<dyn Dispatch>>>,
}

impl ApplicationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, application_id: u32, dispatch: Arc<dyn Dispatch>) {
        self.routes.write().insert(application_id, dispatch);
    }
}

impl Dispatch for ApplicationRouter {
    fn handle(&self, from: &PeerId, message: Message) -> Option<Message> {
        let route = self.routes.read().get(&message.header.application_id).cloned();
        match route {
            Some(dispatch) => dispatch.handle(from, message),
            None => {
                log::warn!("no application bound for application-id {}", message.header.application_id);
                None
            }
        }
    }
}

/// Answers every inbound Gx request (spec §4.5 Gx binding rules): a
/// PCRF's server-side handler for CCR-I/U/T, and UNKNOWN_SESSION_ID for
/// any other command against a session-id this store doesn't hold.
pub struct GxServerDispatch {
    store: Arc<SessionStore<GxSession>>,
    apns: Arc<RwLock<ApnRegistry>>,
    identity: NodeIdentity,
}

impl GxServerDispatch {
    pub fn new(store: Arc<SessionStore<GxSession>>, apns: Arc<RwLock<ApnRegistry>>, identity: NodeIdentity) -> Self {
        Self { store, apns, identity }
    }
}

impl Dispatch for GxServerDispatch {
    fn handle(&self, _from: &PeerId, message: Message) -> Option<Message> {
        if !message.header.flags.is_request() {
            return None;
        }
        let Some(session_id) = message.session_id().map(str::to_owned) else {
            return Some(error_answer(&message, &self.identity, result_code::UNABLE_TO_COMPLY));
        };

        if message.header.command_code != command::CREDIT_CONTROL {
            return Some(match self.store.get_by_id(&session_id) {
                Some(_) => success_answer(&message, &self.identity),
                None => error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID),
            });
        }

        match message.cc_request_type() {
            Some(cc_request_type::TERMINATION) => {
                let Some(mut session) = self.store.get_by_id(&session_id) else {
                    return Some(error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID));
                };
                let released = session.apply_request(&message);
                if let (Some(addr), Some(apn)) = (released, session.apn()) {
                    self.apns.read().release(apn, addr);
                }
                self.store.remove(&session_id);
                Some(success_answer(&message, &self.identity))
            }
            Some(cc_request_type::INITIAL) => {
                let mut session = self
                    .store
                    .get_by_id(&session_id)
                    .unwrap_or_else(|| GxSession::new(session_id.clone()));
                session.apply_request(&message);

                if session.framed_ip_address.is_none() {
                    if let Some(apn) = session.apn().map(str::to_owned) {
                        match self.apns.read().allocate(&apn) {
                            Ok(addr) => session.framed_ip_address = Some(addr),
                            Err(_) => return Some(error_answer(&message, &self.identity, result_code::UNABLE_TO_COMPLY)),
                        }
                    }
                }

                let mut answer = success_answer(&message, &self.identity);
                if let Some(addr) = session.framed_ip_address {
                    answer.set_framed_ip_address(addr);
                }
                self.store.add(session);
                Some(answer)
            }
            _ => {
                let Some(mut session) = self.store.get_by_id(&session_id) else {
                    return Some(error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID));
                };
                session.apply_request(&message);
                self.store.add(session);
                Some(success_answer(&message, &self.identity))
            }
        }
    }
}

/// Answers every inbound Rx request (spec §4.5 Rx binding rules): AAR
/// opens a session and, if it carries a Framed-IP-Address matching a
/// live Gx session, binds `gx_session_id` and inherits its Subscriber;
/// STR/ASR close it.
pub struct RxServerDispatch {
    store: Arc<SessionStore<RxSession>>,
    gx_store: Arc<SessionStore<GxSession>>,
    identity: NodeIdentity,
}

impl RxServerDispatch {
    pub fn new(store: Arc<SessionStore<RxSession>>, gx_store: Arc<SessionStore<GxSession>>, identity: NodeIdentity) -> Self {
        Self { store, gx_store, identity }
    }
}

impl Dispatch for RxServerDispatch {
    fn handle(&self, _from: &PeerId, message: Message) -> Option<Message> {
        if !message.header.flags.is_request() {
            return None;
        }
        let Some(session_id) = message.session_id().map(str::to_owned) else {
            return Some(error_answer(&message, &self.identity, result_code::UNABLE_TO_COMPLY));
        };

        match message.header.command_code {
            command::AA => {
                let mut session = self
                    .store
                    .get_by_id(&session_id)
                    .unwrap_or_else(|| RxSession::new(session_id.clone()));
                session.apply_request(&message);

                if session.gx_session_id.is_none() {
                    if let Some(framed_ip) = message.framed_ip_address() {
                        if let Some(gx_session) = self.gx_store.get_by_framed_ipv4(framed_ip) {
                            session.gx_session_id = Some(gx_session.base.session_id.clone());
                            session.base.subscriber = gx_session.base.subscriber.clone();
                        }
                    }
                }

                self.store.add(session);
                Some(success_answer(&message, &self.identity))
            }
            command::SESSION_TERMINATION | command::ABORT_SESSION => {
                let Some(mut session) = self.store.get_by_id(&session_id) else {
                    return Some(error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID));
                };
                session.apply_request(&message);
                self.store.remove(&session_id);
                Some(success_answer(&message, &self.identity))
            }
            _ => Some(match self.store.get_by_id(&session_id) {
                Some(_) => success_answer(&message, &self.identity),
                None => error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID),
            }),
        }
    }
}

/// Answers every inbound Sy request (spec §4.5 Sy binding rules): SLR
/// opens a session and runs it through the caller-supplied policy
/// lookup to fill in Policy-Counter-Status entries ("OCS policy table
/// (external)"); STR closes it.
pub struct SyServerDispatch {
    store: Arc<SessionStore<SySession>>,
    identity: NodeIdentity,
    policy: Arc<dyn Fn(&str) -> Vec<(String, bool)> + Send + Sync>,
}

impl SyServerDispatch {
    pub fn new(
        store: Arc<SessionStore<SySession>>,
        identity: NodeIdentity,
        policy: Arc<dyn Fn(&str) -> Vec<(String, bool)> + Send + Sync>,
    ) -> Self {
        Self { store, identity, policy }
    }
}

impl Dispatch for SyServerDispatch {
    fn handle(&self, _from: &PeerId, message: Message) -> Option<Message> {
        if !message.header.flags.is_request() {
            return None;
        }
        let Some(session_id) = message.session_id().map(str::to_owned) else {
            return Some(error_answer(&message, &self.identity, result_code::UNABLE_TO_COMPLY));
        };

        match message.header.command_code {
            command::SPENDING_LIMIT => {
                let mut session = self
                    .store
                    .get_by_id(&session_id)
                    .unwrap_or_else(|| SySession::new(session_id.clone()));
                session.apply_request(&message);
                for (identifier, under_limit) in (self.policy)(&session_id) {
                    session.set_policy_counter(identifier, under_limit);
                }
                self.store.add(session);
                Some(success_answer(&message, &self.identity))
            }
            command::SESSION_TERMINATION => {
                let Some(mut session) = self.store.get_by_id(&session_id) else {
                    return Some(error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID));
                };
                session.apply_request(&message);
                self.store.remove(&session_id);
                Some(success_answer(&message, &self.identity))
            }
            _ => Some(match self.store.get_by_id(&session_id) {
                Some(_) => success_answer(&message, &self.identity),
                None => error_answer(&message, &self.identity, result_code::UNKNOWN_SESSION_ID),
            }),
        }
    }
}

/// Sends a Gx request through `gateway`, binding it into `store` first
/// (spec §4.5 "Outgoing send": stamp, bind, send-and-await, bind the
/// answer, remove if no longer active). Used by a PCEF originating
/// CCR-I/U/T.
pub async fn send_gx_request(
    gateway: &PeerGateway,
    store: &SessionStore<GxSession>,
    destination_realm: &str,
    request: Message,
) -> Result<Message, SendError> {
    let session_id = request.session_id().unwrap_or_default().to_string();
    let mut session = store.get_by_id(&session_id).unwrap_or_else(|| GxSession::new(session_id.clone()));
    session.apply_request(&request);
    store.add(session);

    let answer = gateway
        .send_and_await(application::GX, destination_realm, request, DEFAULT_SEND_TIMEOUT)
        .await?;

    store.update(&session_id, |session| {
        session.base.add_message(LoggedMessage {
            hop_by_hop_id: answer.header.hop_by_hop_id,
            end_to_end_id: answer.header.end_to_end_id,
            is_request: false,
        });
        if let Some(addr) = answer.framed_ip_address() {
            session.framed_ip_address = Some(addr);
        }
    });
    if let Some(session) = store.get_by_id(&session_id) {
        if !session.base.active {
            store.remove(&session_id);
        }
    }
    Ok(answer)
}

/// Sends an Rx request through `gateway`, binding it into `store` the
/// same way [`send_gx_request`] does for Gx. Used by an AF originating
/// an AAR or STR.
pub async fn send_rx_request(
    gateway: &PeerGateway,
    store: &SessionStore<RxSession>,
    destination_realm: &str,
    request: Message,
) -> Result<Message, SendError> {
    let session_id = request.session_id().unwrap_or_default().to_string();
    let mut session = store.get_by_id(&session_id).unwrap_or_else(|| RxSession::new(session_id.clone()));
    session.apply_request(&request);
    store.add(session);

    let answer = gateway
        .send_and_await(application::RX, destination_realm, request, DEFAULT_SEND_TIMEOUT)
        .await?;

    store.update(&session_id, |session| {
        session.base.add_message(LoggedMessage {
            hop_by_hop_id: answer.header.hop_by_hop_id,
            end_to_end_id: answer.header.end_to_end_id,
            is_request: false,
        });
    });
    if let Some(session) = store.get_by_id(&session_id) {
        if !session.base.active {
            store.remove(&session_id);
        }
    }
    Ok(answer)
}

/// Sends a Sy request through `gateway`, binding it into `store` the
/// same way [`send_gx_request`] does for Gx. Used by a PCRF originating
/// an SLR or STR against an OCS.
pub async fn send_sy_request(
    gateway: &PeerGateway,
    store: &SessionStore<SySession>,
    destination_realm: &str,
    request: Message,
) -> Result<Message, SendError> {
    let session_id = request.session_id().unwrap_or_default().to_string();
    let mut session = store.get_by_id(&session_id).unwrap_or_else(|| SySession::new(session_id.clone()));
    session.apply_request(&request);
    store.add(session);

    let answer = gateway
        .send_and_await(application::SY, destination_realm, request, DEFAULT_SEND_TIMEOUT)
        .await?;

    store.update(&session_id, |session| {
        session.base.add_message(LoggedMessage {
            hop_by_hop_id: answer.header.hop_by_hop_id,
            end_to_end_id: answer.header.end_to_end_id,
            is_request: false,
        });
    });
    if let Some(session) = store.get_by_id(&session_id) {
        if !session.base.active {
            store.remove(&session_id);
        }
    }
    Ok(answer)
}
