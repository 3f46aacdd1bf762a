use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use peer::{Peer, PeerId};

use crate::error::DispatchError;

/// Picks the next-hop peer for an outbound request per the DSC policy
/// (spec §4.6): realm- and application-id-scoped candidates, chosen by
/// lowest outstanding-request count, ties broken round-robin.
#[derive(Default)]
pub struct RoutingAgent {
    round_robin_cursor: AtomicUsize,
}

impl RoutingAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// `candidates` is every peer bound to `application_id` (the caller
    /// filters to realm and Open state before calling this, since that
    /// filtering needs the node's own binding table).
    pub fn select<'a>(
        &self,
        own_origin_host: &str,
        route_records: &[String],
        candidates: &'a [(PeerId, Arc<Peer>)],
    ) -> Result<&'a PeerId, DispatchError> {
        if route_records.iter().any(|host| host == own_origin_host) {
            return Err(DispatchError::LoopDetected);
        }

        if candidates.is_empty() {
            return Err(DispatchError::UnableToDeliver);
        }

        let lowest = candidates
            .iter()
            .map(|(_, peer)| peer.outstanding_requests())
            .min()
            .expect("candidates is non-empty");

        let tied: Vec<&(PeerId, Arc<Peer>)> = candidates
            .iter()
            .filter(|(_, peer)| peer.outstanding_requests() == lowest)
            .collect();

        let index = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % tied.len();
        Ok(&tied[index].0)
    }
}
