use std::net::{Ipv4Addr, Ipv6Addr};

use codec::constants::{application, cc_request_type};
use codec::Message;

use crate::base::{LoggedMessage, SessionBase};
use crate::error::Error;
use crate::store::SessionKeys;
use crate::subscriber::Subscriber;

/// A Gx (PCEF-PCRF) policy and charging control session.
///
/// Binding rules (spec §4.5, adopting the richest source variant): the
/// session starts on CCR-I, which is also the only point a subscriber
/// is bound and the framed address / APN / MCC-MNC are captured; it
/// ends on CCR-T, at which point the leased IP address is released
/// back to the APN's pool.
#[derive(Debug, Clone)]
pub struct GxSession {
    pub base: SessionBase,
    pub framed_ip_address: Option<Ipv4Addr>,
    pub framed_ipv6_prefix: Option<(Ipv6Addr, u8)>,
    pub called_station_id: Option<String>,
    pub sgsn_mcc_mnc: Option<String>,
}

impl GxSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            base: SessionBase::new(session_id, application::GX),
            framed_ip_address: None,
            framed_ipv6_prefix: None,
            called_station_id: None,
            sgsn_mcc_mnc: None,
        }
    }

    /// The Called-Station-Id doubles as the APN name this session is
    /// attached to.
    pub fn apn(&self) -> Option<&str> {
        self.called_station_id.as_deref()
    }

    /// Applies a decoded request to this session's state, per its
    /// CC-Request-Type. Returns the IPv4 address that should now be
    /// released back to its APN pool, if this call just ended the
    /// session (CCR-T).
    pub fn apply_request(&mut self, message: &Message) -> Option<Ipv4Addr> {
        let entry = LoggedMessage {
            hop_by_hop_id: message.header.hop_by_hop_id,
            end_to_end_id: message.header.end_to_end_id,
            is_request: true,
        };
        if !self.base.add_message(entry) {
            return None;
        }

        match message.cc_request_type() {
            Some(cc_request_type::INITIAL) => {
                self.base.start();
                if let Some(ip) = message.framed_ip_address() {
                    self.framed_ip_address = Some(ip);
                }
                if let Some(prefix) = message.framed_ipv6_prefix() {
                    self.framed_ipv6_prefix = Some(prefix);
                }
                if let Some(apn) = message.called_station_id() {
                    self.called_station_id = Some(apn.to_string());
                }
                if let Some(mcc_mnc) = message.sgsn_mcc_mnc() {
                    self.sgsn_mcc_mnc = Some(mcc_mnc.to_string());
                }
                if self.base.subscriber.is_none() {
                    let ids = message.subscription_ids();
                    self.base.subscriber = Subscriber::from_subscription_ids(&ids);
                }
                None
            }
            Some(cc_request_type::TERMINATION) => {
                self.base.end();
                self.framed_ip_address.take()
            }
            _ => None,
        }
    }
}

impl SessionKeys for GxSession {
    fn session_id(&self) -> &str {
        &self.base.session_id
    }

    fn framed_ipv4(&self) -> Option<Ipv4Addr> {
        self.framed_ip_address
    }

    fn framed_ipv6(&self) -> Option<(Ipv6Addr, u8)> {
        self.framed_ipv6_prefix
    }
}

/// A named APN's IP pool, wired up so a Gx session's CCR-T always gets
/// its lease released even if the caller only has the session, not the
/// pool, in hand.
pub struct ApnRegistry {
    apns: ahash::HashMap<String, ip_pool::Apn>,
}

impl Default for ApnRegistry {
    fn default() -> Self {
        Self {
            apns: ahash::HashMap::default(),
        }
    }
}

impl ApnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, apn: ip_pool::Apn) {
        self.apns.insert(apn.name.clone(), apn);
    }

    pub fn allocate(&self, apn_name: &str) -> Result<Ipv4Addr, Error> {
        let apn = self.apns.get(apn_name).ok_or_else(|| Error::UnknownApn(apn_name.to_string()))?;
        Ok(apn.allocate()?)
    }

    pub fn release(&self, apn_name: &str, addr: Ipv4Addr) {
        if let Some(apn) = self.apns.get(apn_name) {
            apn.release(addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::header::{CommandFlags, Header};
    use codec::constants::command;

    fn ccr(req_type: u32, hbh: u32) -> Message {
        let mut msg = Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code: command::CREDIT_CONTROL,
            application_id: application::GX,
            hop_by_hop_id: hbh,
            end_to_end_id: hbh,
        });
        msg.set_session_id("pgw.example.com;1;1");
        msg.set_cc_request_type(req_type);
        msg
    }

    #[test]
    fn ccr_i_starts_the_session_and_binds_the_subscriber() {
        let mut session = GxSession::new("pgw.example.com;1;1");
        let mut msg = ccr(cc_request_type::INITIAL, 1);
        msg.set_framed_ip_address(Ipv4Addr::new(10, 0, 0, 9));
        msg.set_called_station_id("internet.apn");
        msg.append_subscription_id(0, "15551230000");

        session.apply_request(&msg);

        assert!(session.base.active);
        assert_eq!(session.framed_ip_address, Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(session.apn(), Some("internet.apn"));
        assert_eq!(session.base.subscriber.unwrap().msisdn, "15551230000");
    }

    #[test]
    fn ccr_t_ends_the_session_and_returns_the_leased_address() {
        let mut session = GxSession::new("pgw.example.com;1;1");
        let mut initial = ccr(cc_request_type::INITIAL, 1);
        initial.set_framed_ip_address(Ipv4Addr::new(10, 0, 0, 1));
        session.apply_request(&initial);

        let released = session.apply_request(&ccr(cc_request_type::TERMINATION, 2));
        assert!(!session.base.active);
        assert_eq!(released, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(session.framed_ip_address, None);
    }

    #[test]
    fn a_retransmitted_ccr_i_is_not_applied_twice() {
        let mut session = GxSession::new("pgw.example.com;1;1");
        let msg = ccr(cc_request_type::INITIAL, 7);
        session.apply_request(&msg);
        session.base.end();
        session.apply_request(&msg);
        assert!(!session.base.active);
    }
}
