//! A Diameter peer connection: identity, the FSM from RFC 6733 §5.6,
//! pending-request tracking, and the watchdog/reconnect timers that
//! drive it. Owns no socket; the node layer drives this off whatever
//! transport it is actually running.

pub mod clock;
pub mod error;
pub mod identity;
pub mod peer;
pub mod pending;
pub mod state;
pub mod timing;
pub mod uri;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use identity::{Capabilities, PeerId};
pub use peer::{Peer, PeerRole};
pub use pending::PendingRequests;
pub use state::{PeerState, StateMachine};
pub use timing::{jittered_watchdog_interval, ReconnectBackoff, DEFAULT_WATCHDOG_INTERVAL};
pub use uri::{PeerUri, Transport};
