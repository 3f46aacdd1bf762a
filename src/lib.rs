//! A pure Rust Diameter toolkit for 3GPP policy/charging control
//! planes: base-protocol peer connections, the Gx/Rx/Sy session
//! binding rules, an IP-pool resource core, and the PCEF/PCRF/AF/OCS/DSC
//! entity façades built on top of them (spec §1 OVERVIEW).
//!
//! The wire codec, peer state machine, session store and routing agent
//! all live in their own workspace crates (`codec`, `peer`, `node`,
//! `session`, `ip_pool`) and never depend on tokio; this crate is the
//! only place sockets and the async runtime appear, bridging them
//! through [`gateway::PeerGateway`] and [`transport::Dispatch`].

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod entity;
pub mod gateway;
pub mod logger;
pub mod transport;

pub use codec::Message;
pub use config::NodeConfig;
pub use entity::{af::Af, dsc::Dsc, ocs::Ocs, pcef::Pcef, pcrf::Pcrf, DiameterEntity};
pub use gateway::{PeerGateway, SendError};
pub use node::{Node, NodeIdentity};
pub use peer::{Peer, PeerId, PeerUri, Transport};
