//! Session store, Gx/Rx/Sy session types with their per-application
//! binding rules, and the `Application` handle that pairs an
//! application-id with the session store a node's `Dispatch` and
//! `send_*_request` paths (root crate) bind requests into.

pub mod application;
pub mod base;
pub mod error;
pub mod gx;
pub mod rx;
pub mod store;
pub mod subscriber;
pub mod sy;

pub use application::Application;
pub use base::{LoggedMessage, SessionBase};
pub use error::Error;
pub use gx::{ApnRegistry, GxSession};
pub use rx::RxSession;
pub use store::{SessionKeys, SessionStore};
pub use subscriber::Subscriber;
pub use sy::{PolicyCounterStatus, SySession};
