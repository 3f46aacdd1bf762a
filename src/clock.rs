//! Re-exports the clock abstraction from the `peer` crate so callers
//! embedding this toolkit only need to depend on the root crate.

pub use peer::{Clock, ManualClock, SystemClock};
