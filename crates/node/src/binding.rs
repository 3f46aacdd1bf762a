use ahash::HashSet;

use peer::PeerId;

/// Which peers and realms a single application-id is bound to.
///
/// An empty `realms` set means "serve any realm" — used by applications
/// that are not realm-scoped (Device-Watchdog, Capabilities-Exchange).
#[derive(Debug, Default, Clone)]
pub struct ApplicationBinding {
    pub peers: HashSet<PeerId>,
    pub realms: HashSet<String>,
}

impl ApplicationBinding {
    pub fn new(peers: impl IntoIterator<Item = PeerId>, realms: impl IntoIterator<Item = String>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
            realms: realms.into_iter().collect(),
        }
    }

    pub fn serves_realm(&self, realm: &str) -> bool {
        self.realms.is_empty() || self.realms.contains(realm)
    }
}
