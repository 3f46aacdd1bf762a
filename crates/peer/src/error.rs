#[derive(Debug)]
pub enum Error {
    /// A request was sent (or a request handler invoked) while the peer
    /// was not in the Open state.
    NotOpen,
    /// Two in-flight requests collided on the same Hop-by-Hop-Id.
    DuplicateHopByHop(u32),
    /// An answer arrived whose Hop-by-Hop-Id does not match any request
    /// this peer is waiting on.
    UnmatchedAnswer(u32),
    /// The transition requested is not legal from the peer's current
    /// state.
    IllegalTransition { from: &'static str, to: &'static str },
    /// A peer URI did not match `aaa://<host>:<port>[;transport=tcp|sctp]`.
    InvalidPeerUri(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "peer is not in the Open state"),
            Self::DuplicateHopByHop(id) => write!(f, "duplicate hop-by-hop id: {id}"),
            Self::UnmatchedAnswer(id) => write!(f, "no pending request for hop-by-hop id: {id}"),
            Self::IllegalTransition { from, to } => {
                write!(f, "illegal peer state transition: {from} -> {to}")
            }
            Self::InvalidPeerUri(uri) => write!(f, "invalid peer URI: {uri}"),
        }
    }
}
