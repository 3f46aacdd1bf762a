//! Wire types for the Diameter base protocol (RFC 6733): the fixed
//! 20-byte header, AVPs, and a length-framed codec between the two. Does
//! not know about peers, sessions, or any particular application; see
//! the `peer`, `node` and `session` crates for those.

pub mod avp;
pub mod constants;
pub mod error;
pub mod header;
pub mod message;
pub mod transport;

pub use avp::{Avp, AvpFlags};
pub use error::Error;
pub use header::{CommandFlags, Header, HEADER_LEN};
pub use message::Message;
pub use transport::{MessageCodec, RawDiameterCodec};
