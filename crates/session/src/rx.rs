use codec::constants::application;
use codec::constants::command;
use codec::header::{CommandFlags, Header};
use codec::Message;

use crate::base::{LoggedMessage, SessionBase};
use crate::store::SessionKeys;

/// An Rx (AF-PCRF) session: opened by an AAR, closed either by its own
/// STR or administratively after a successful ASR/ASA exchange (spec
/// §4.5 / §9 open question: the STR in that case addresses the peer
/// that sent the ASA, i.e. the ASA's Origin-Host becomes the STR's
/// Destination-Host).
#[derive(Debug, Clone)]
pub struct RxSession {
    pub base: SessionBase,
    /// The Gx session this Rx session was bound to via Framed-IP-Address
    /// on its opening AAR, if the target Gx application had a matching
    /// session at that address (spec §4.5 Rx binding rules, §3 "Rx/Sy
    /// add: bound gx-session-id").
    pub gx_session_id: Option<String>,
}

impl RxSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            base: SessionBase::new(session_id, application::RX),
            gx_session_id: None,
        }
    }

    /// Applies a request to this session's message log and, for
    /// Abort-Session-Request, marks the session ended — the caller is
    /// responsible for then sending the administrative STR.
    pub fn apply_request(&mut self, message: &Message) {
        let entry = LoggedMessage {
            hop_by_hop_id: message.header.hop_by_hop_id,
            end_to_end_id: message.header.end_to_end_id,
            is_request: true,
        };
        if !self.base.add_message(entry) {
            return;
        }

        if message.header.command_code == command::AA {
            self.base.start();
        } else if message.header.command_code == command::SESSION_TERMINATION
            || message.header.command_code == command::ABORT_SESSION
        {
            self.base.end();
        }
    }
}

impl SessionKeys for RxSession {
    fn session_id(&self) -> &str {
        &self.base.session_id
    }
}

/// Builds the administrative Session-Termination-Request this node sends
/// after a successful Abort-Session-Answer, per the spec §9 open
/// question decision: addressed back to whichever peer originated the
/// ASA rather than the AAR. The caller stamps a connection-fresh
/// Hop-by-Hop-Id (and End-to-End-Id) before sending it.
pub fn build_administrative_str(session_id: &str, asa: &Message, own_origin_host: &str, own_origin_realm: &str) -> Message {
    let mut request = Message::new(Header {
        version: 1,
        length: 0,
        flags: CommandFlags::request(),
        command_code: command::SESSION_TERMINATION,
        application_id: application::RX,
        hop_by_hop_id: 0,
        end_to_end_id: 0,
    });
    request.set_session_id(session_id);
    request.set_origin_host(own_origin_host);
    request.set_origin_realm(own_origin_realm);
    if let Some(host) = asa.origin_host() {
        request.set_destination_host(host);
    }
    if let Some(realm) = asa.origin_realm() {
        request.set_destination_realm(realm);
    }
    request
}
