//! A Diameter node's peer registry, per-application binding table, and
//! the realm-based routing agent (the "DSC policy") that picks a
//! next-hop peer for an outbound request. Pure in-memory state; the
//! accept loop and socket I/O that feed it live in the embedding
//! binary's runtime layer.

pub mod binding;
pub mod error;
pub mod node;
pub mod routing;

pub use binding::ApplicationBinding;
pub use error::DispatchError;
pub use node::{Node, NodeIdentity};
pub use routing::RoutingAgent;
