use codec::constants::{application, command};
use codec::Message;

use crate::base::{LoggedMessage, SessionBase};
use crate::store::SessionKeys;

/// One entry of a Sy Spending-Limit-Answer's Policy-Counter-Status-Report:
/// whether a named policy counter (an APN, in the source's fixture) is
/// still under its spending limit.
#[derive(Debug, Clone)]
pub struct PolicyCounterStatus {
    pub policy_counter_identifier: String,
    pub under_limit: bool,
}

/// A Sy (OCS-PCRF) spending-limit reporting session: opened by an SLR,
/// closed by an STR (spec §4.5 Sy binding rules).
#[derive(Debug, Clone)]
pub struct SySession {
    pub base: SessionBase,
    /// The Gx session this Sy session reports spending limits for,
    /// if bound (spec §3 "Rx/Sy add: bound gx-session-id").
    pub gx_session_id: Option<String>,
    pub policy_counters: Vec<PolicyCounterStatus>,
}

impl SySession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            base: SessionBase::new(session_id, application::SY),
            gx_session_id: None,
            policy_counters: Vec::new(),
        }
    }

    pub fn set_policy_counter(&mut self, identifier: impl Into<String>, under_limit: bool) {
        let identifier = identifier.into();
        if let Some(existing) = self
            .policy_counters
            .iter_mut()
            .find(|pcs| pcs.policy_counter_identifier == identifier)
        {
            existing.under_limit = under_limit;
        } else {
            self.policy_counters.push(PolicyCounterStatus {
                policy_counter_identifier: identifier,
                under_limit,
            });
        }
    }

    /// Applies a request to this session's message log, starting it on
    /// Spending-Limit-Request and ending it on Session-Termination-Request.
    pub fn apply_request(&mut self, message: &Message) {
        let entry = LoggedMessage {
            hop_by_hop_id: message.header.hop_by_hop_id,
            end_to_end_id: message.header.end_to_end_id,
            is_request: true,
        };
        if !self.base.add_message(entry) {
            return;
        }

        if message.header.command_code == command::SPENDING_LIMIT {
            self.base.start();
        } else if message.header.command_code == command::SESSION_TERMINATION {
            self.base.end();
        }
    }
}

impl SessionKeys for SySession {
    fn session_id(&self) -> &str {
        &self.base.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::header::{CommandFlags, Header};

    fn message(command_code: u32, hbh: u32) -> Message {
        let mut msg = Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code,
            application_id: application::SY,
            hop_by_hop_id: hbh,
            end_to_end_id: hbh,
        });
        msg.set_session_id("pcrf;1;1");
        msg
    }

    #[test]
    fn slr_opens_and_str_closes_the_session() {
        let mut session = SySession::new("pcrf;1;1");
        session.apply_request(&message(command::SPENDING_LIMIT, 1));
        assert!(session.base.active);

        session.apply_request(&message(command::SESSION_TERMINATION, 2));
        assert!(!session.base.active);
    }

    #[test]
    fn set_policy_counter_updates_an_existing_entry_in_place() {
        let mut session = SySession::new("pcrf;1;1");
        session.set_policy_counter("internet.apn", true);
        session.set_policy_counter("internet.apn", false);
        assert_eq!(session.policy_counters.len(), 1);
        assert!(!session.policy_counters[0].under_limit);
    }
}
