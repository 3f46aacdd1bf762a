use std::net::{Ipv4Addr, Ipv6Addr};

use ahash::HashMap;
use parking_lot::RwLock;

/// What a session store needs to be able to pull out of a session to
/// index it. Gx sessions populate both address hooks; Rx and Sy
/// sessions only ever return `None` from them, leaving those indexes
/// always empty without the store needing to know why.
pub trait SessionKeys {
    fn session_id(&self) -> &str;

    fn framed_ipv4(&self) -> Option<Ipv4Addr> {
        None
    }

    fn framed_ipv6(&self) -> Option<(Ipv6Addr, u8)> {
        None
    }
}

struct Tables<S> {
    by_id: HashMap<String, S>,
    by_framed_ipv4: HashMap<Ipv4Addr, String>,
    by_framed_ipv6: HashMap<(Ipv6Addr, u8), String>,
}

impl<S> Default for Tables<S> {
    fn default() -> Self {
        Self {
            by_id: HashMap::default(),
            by_framed_ipv4: HashMap::default(),
            by_framed_ipv6: HashMap::default(),
        }
    }
}

/// Per-application session store: a primary index by session-id and two
/// secondary indexes by the framed addresses a Gx session was assigned
/// (spec §4.4).
pub struct SessionStore<S> {
    tables: RwLock<Tables<S>>,
}

impl<S> Default for SessionStore<S> {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl<S: SessionKeys + Clone> SessionStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a session. A new session claiming an address
    /// another live session already holds overwrites that secondary
    /// index entry — the displaced session stays in `by_id` but is no
    /// longer reachable by that address, matching address reassignment
    /// in the field.
    pub fn add(&self, session: S) {
        let mut tables = self.tables.write();
        let id = session.session_id().to_string();

        if let Some(ipv4) = session.framed_ipv4() {
            tables.by_framed_ipv4.insert(ipv4, id.clone());
        }
        if let Some(ipv6) = session.framed_ipv6() {
            tables.by_framed_ipv6.insert(ipv6, id.clone());
        }

        tables.by_id.insert(id, session);
    }

    pub fn get_by_id(&self, session_id: &str) -> Option<S> {
        self.tables.read().by_id.get(session_id).cloned()
    }

    pub fn get_by_framed_ipv4(&self, addr: Ipv4Addr) -> Option<S> {
        let tables = self.tables.read();
        let id = tables.by_framed_ipv4.get(&addr)?;
        tables.by_id.get(id).cloned()
    }

    pub fn get_by_framed_ipv6(&self, addr: Ipv6Addr, prefix_len: u8) -> Option<S> {
        let tables = self.tables.read();
        let id = tables.by_framed_ipv6.get(&(addr, prefix_len))?;
        tables.by_id.get(id).cloned()
    }

    /// Mutates the stored session in place via `f`, re-indexing if `f`
    /// changed its framed addresses.
    pub fn update(&self, session_id: &str, f: impl FnOnce(&mut S)) -> bool {
        let mut tables = self.tables.write();
        let Some(session) = tables.by_id.get_mut(session_id) else {
            return false;
        };
        f(session);

        let ipv4 = session.framed_ipv4();
        let ipv6 = session.framed_ipv6();
        if let Some(ipv4) = ipv4 {
            tables.by_framed_ipv4.insert(ipv4, session_id.to_string());
        }
        if let Some(ipv6) = ipv6 {
            tables.by_framed_ipv6.insert(ipv6, session_id.to_string());
        }
        true
    }

    /// Removes a session from the primary table and from every
    /// secondary index that still points at it.
    pub fn remove(&self, session_id: &str) -> Option<S> {
        let mut tables = self.tables.write();
        let removed = tables.by_id.remove(session_id)?;

        tables.by_framed_ipv4.retain(|_, id| id != session_id);
        tables.by_framed_ipv6.retain(|_, id| id != session_id);

        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Fake {
        id: String,
        ipv4: Option<Ipv4Addr>,
    }

    impl SessionKeys for Fake {
        fn session_id(&self) -> &str {
            &self.id
        }

        fn framed_ipv4(&self) -> Option<Ipv4Addr> {
            self.ipv4
        }
    }

    #[test]
    fn reaches_a_session_by_its_framed_address() {
        let store: SessionStore<Fake> = SessionStore::new();
        store.add(Fake {
            id: "s1".into(),
            ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
        });

        let found = store.get_by_framed_ipv4(Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(found.id, "s1");
    }

    #[test]
    fn a_reassigned_address_points_at_the_newest_session() {
        let store: SessionStore<Fake> = SessionStore::new();
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        store.add(Fake {
            id: "s1".into(),
            ipv4: Some(addr),
        });
        store.add(Fake {
            id: "s2".into(),
            ipv4: Some(addr),
        });

        assert_eq!(store.get_by_framed_ipv4(addr).unwrap().id, "s2");
        assert!(store.get_by_id("s1").is_some());
    }

    #[test]
    fn remove_clears_every_secondary_index_pointing_at_it() {
        let store: SessionStore<Fake> = SessionStore::new();
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        store.add(Fake {
            id: "s1".into(),
            ipv4: Some(addr),
        });

        store.remove("s1");
        assert!(store.get_by_id("s1").is_none());
        assert!(store.get_by_framed_ipv4(addr).is_none());
    }
}
