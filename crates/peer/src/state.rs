use parking_lot::RwLock;

use crate::error::Error;

/// A peer connection's lifecycle state (spec §4.2).
///
/// `WaitCer` only ever arises for a passively accepted peer, between
/// accept and sending its own CEA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Closed,
    WaitConnAck,
    WaitCea,
    WaitCer,
    Open,
    Closing,
}

impl PeerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::WaitConnAck => "WaitConnAck",
            Self::WaitCea => "WaitCea",
            Self::WaitCer => "WaitCer",
            Self::Open => "Open",
            Self::Closing => "Closing",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for PeerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wraps a [`PeerState`] behind a lock and validates every transition
/// against the table in spec §4.2, logging each move.
pub struct StateMachine {
    state: RwLock<PeerState>,
    label: String,
}

impl StateMachine {
    pub fn new(label: impl Into<String>, initial: PeerState) -> Self {
        Self {
            state: RwLock::new(initial),
            label: label.into(),
        }
    }

    pub fn current(&self) -> PeerState {
        *self.state.read()
    }

    /// Moves to `to` if the table allows it from the current state,
    /// logging the transition either way.
    pub fn transition(&self, to: PeerState) -> Result<(), Error> {
        let mut state = self.state.write();
        if !is_allowed(*state, to) {
            log::warn!(
                "peer {}: rejected illegal transition {} -> {}",
                self.label,
                state,
                to
            );
            return Err(Error::IllegalTransition {
                from: state.name(),
                to: to.name(),
            });
        }

        log::info!("peer {}: {} -> {}", self.label, state, to);
        *state = to;
        Ok(())
    }
}

fn is_allowed(from: PeerState, to: PeerState) -> bool {
    use PeerState::*;
    matches!(
        (from, to),
        (Closed, WaitConnAck)
            | (Closed, WaitCer)
            | (WaitConnAck, WaitCea)
            | (WaitConnAck, Closing)
            | (WaitCea, Open)
            | (WaitCea, Closing)
            | (WaitCer, Open)
            | (WaitCer, Closing)
            | (Open, Closing)
            | (Open, Closed)
            | (Closing, Closed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_peer_walks_through_connect_handshake() {
        let fsm = StateMachine::new("test", PeerState::Closed);
        fsm.transition(PeerState::WaitConnAck).unwrap();
        fsm.transition(PeerState::WaitCea).unwrap();
        fsm.transition(PeerState::Open).unwrap();
        assert!(fsm.current().is_ready());
    }

    #[test]
    fn passive_peer_goes_through_wait_cer() {
        let fsm = StateMachine::new("test", PeerState::Closed);
        fsm.transition(PeerState::WaitCer).unwrap();
        fsm.transition(PeerState::Open).unwrap();
        assert!(fsm.current().is_ready());
    }

    #[test]
    fn rejects_a_transition_not_in_the_table() {
        let fsm = StateMachine::new("test", PeerState::Closed);
        assert!(fsm.transition(PeerState::Open).is_err());
        assert_eq!(fsm.current(), PeerState::Closed);
    }

    #[test]
    fn open_peer_can_close_on_transport_error_or_dpr() {
        let fsm = StateMachine::new("test", PeerState::Open);
        fsm.transition(PeerState::Closed).unwrap();

        let fsm = StateMachine::new("test", PeerState::Open);
        fsm.transition(PeerState::Closing).unwrap();
        fsm.transition(PeerState::Closed).unwrap();
    }
}
