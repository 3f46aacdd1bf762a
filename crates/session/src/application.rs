use std::sync::Arc;

use crate::store::SessionKeys;
use crate::store::SessionStore;

/// One Diameter application bound to a node: an application-id, whether
/// it is an auth and/or acct application, and its session store (spec
/// §4.5). The actual inbound dispatch and outbound send-and-await live
/// on the transport-facing `Dispatch` implementations and
/// `send_*_request` helpers in the root crate, which hold this
/// `store` directly; this type is the session-table handle a façade
/// hands to both sides.
pub struct Application<S> {
    pub application_id: u32,
    pub is_auth_application: bool,
    pub is_acct_application: bool,
    pub store: Arc<SessionStore<S>>,
}

impl<S> Application<S>
where
    S: SessionKeys + Clone + Send + Sync + 'static,
{
    pub fn new(application_id: u32, is_auth_application: bool, is_acct_application: bool) -> Self {
        Self {
            application_id,
            is_auth_application,
            is_acct_application,
            store: Arc::new(SessionStore::new()),
        }
    }
}
