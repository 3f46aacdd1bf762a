use std::time::Instant;

use ahash::HashMap;
use parking_lot::Mutex;

use crate::error::Error;

struct Entry {
    deadline: Instant,
}

/// Tracks requests this peer has sent and is awaiting an answer for,
/// keyed by Hop-by-Hop-Id. RFC 6733 requires that identifier be unique
/// among a peer's outstanding requests; [`PendingRequests::insert`]
/// enforces that rather than silently overwriting an in-flight entry.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<u32, Entry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::default()),
        }
    }

    pub fn insert(&self, hop_by_hop_id: u32, deadline: Instant) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&hop_by_hop_id) {
            return Err(Error::DuplicateHopByHop(hop_by_hop_id));
        }
        entries.insert(hop_by_hop_id, Entry { deadline });
        Ok(())
    }

    /// Removes and confirms a pending request on receipt of its answer.
    pub fn complete(&self, hop_by_hop_id: u32) -> Result<(), Error> {
        self.entries
            .lock()
            .remove(&hop_by_hop_id)
            .map(|_| ())
            .ok_or(Error::UnmatchedAnswer(hop_by_hop_id))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hop-by-Hop-Ids whose deadline has passed as of `now`.
    pub fn expired(&self, now: Instant) -> Vec<u32> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn drop_all(&self) -> Vec<u32> {
        self.entries.lock().drain().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_a_duplicate_hop_by_hop_id() {
        let table = PendingRequests::new();
        let now = Instant::now();
        table.insert(1, now + Duration::from_secs(1)).unwrap();
        assert!(table.insert(1, now + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn complete_requires_a_matching_pending_entry() {
        let table = PendingRequests::new();
        assert!(table.complete(42).is_err());
        table.insert(42, Instant::now()).unwrap();
        table.complete(42).unwrap();
        assert!(table.complete(42).is_err());
    }

    #[test]
    fn expired_lists_only_entries_past_their_deadline() {
        let table = PendingRequests::new();
        let now = Instant::now();
        table.insert(1, now).unwrap();
        table.insert(2, now + Duration::from_secs(60)).unwrap();
        assert_eq!(table.expired(now), vec![1]);
    }
}
