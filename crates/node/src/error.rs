#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// No Open peer supports the requested application-id for the
    /// requested realm (Result-Code 3002).
    UnableToDeliver,
    /// This node's own Origin-Host was already present in Route-Record
    /// (Result-Code 3005).
    LoopDetected,
    /// No application is bound to serve the inbound peer's realm
    /// (Result-Code 3003).
    RealmNotServed,
}

impl std::error::Error for DispatchError {}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnableToDeliver => write!(f, "no open peer can deliver this request"),
            Self::LoopDetected => write!(f, "route record already contains this node"),
            Self::RealmNotServed => write!(f, "no application is bound to this realm"),
        }
    }
}

impl DispatchError {
    pub fn result_code(&self) -> u32 {
        match self {
            Self::UnableToDeliver => codec::constants::result_code::UNABLE_TO_DELIVER,
            Self::LoopDetected => codec::constants::result_code::LOOP_DETECTED,
            Self::RealmNotServed => codec::constants::result_code::REALM_NOT_SERVED,
        }
    }
}
