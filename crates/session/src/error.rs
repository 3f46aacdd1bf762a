#[derive(Debug)]
pub enum Error {
    UnknownSessionId(String),
    DuplicateSessionId(String),
    IpPoolExhausted(ip_pool::PoolExhausted),
    UnknownApn(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSessionId(id) => write!(f, "unknown session-id: {id}"),
            Self::DuplicateSessionId(id) => write!(f, "duplicate session-id: {id}"),
            Self::IpPoolExhausted(e) => write!(f, "{e}"),
            Self::UnknownApn(name) => write!(f, "unknown APN: {name}"),
        }
    }
}

impl From<ip_pool::PoolExhausted> for Error {
    fn from(value: ip_pool::PoolExhausted) -> Self {
        Self::IpPoolExhausted(value)
    }
}
