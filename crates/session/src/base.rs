use std::time::{SystemTime, UNIX_EPOCH};

use crate::subscriber::Subscriber;

/// Enough of a logged message to dedup retransmissions and answer
/// "what has this session seen", without keeping the full decoded
/// message (the application layer holds that if it needs it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedMessage {
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
    pub is_request: bool,
}

/// The fields every Gx/Rx/Sy session shares: lifecycle timestamps, the
/// bound subscriber, and a message log. Embedded by value in each
/// application-specific session type rather than used as a supertype —
/// Rust has no session class hierarchy to mirror here.
#[derive(Debug, Clone)]
pub struct SessionBase {
    pub session_id: String,
    pub application_id: u32,
    pub active: bool,
    pub error: bool,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub subscriber: Option<Subscriber>,
    messages: Vec<LoggedMessage>,
}

impl SessionBase {
    pub fn new(session_id: impl Into<String>, application_id: u32) -> Self {
        Self {
            session_id: session_id.into(),
            application_id,
            active: false,
            error: false,
            start_time: None,
            end_time: None,
            subscriber: None,
            messages: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            self.start_time = Some(now());
            log::info!("session {} started", self.session_id);
        }
    }

    pub fn end(&mut self) {
        if self.active {
            self.active = false;
            self.end_time = Some(now());
            log::info!("session {} ended", self.session_id);
        }
    }

    /// Records a message unless it is a duplicate retransmission already
    /// on the log (same hop-by-hop/end-to-end pair and request/answer
    /// direction).
    pub fn add_message(&mut self, entry: LoggedMessage) -> bool {
        if self.messages.contains(&entry) {
            return false;
        }
        self.messages.push(entry);
        true
    }

    pub fn messages(&self) -> &[LoggedMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last_message(&self) -> Option<&LoggedMessage> {
        self.messages.last()
    }

    pub fn duration_secs(&self) -> Option<u64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            (Some(start), None) => Some(now().saturating_sub(start)),
            _ => None,
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
