use std::net::IpAddr;

/// What a peer told us about itself in its CER/CEA, recorded once the
/// handshake completes successfully.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub host_ip_addresses: Vec<IpAddr>,
    pub supported_applications: Vec<u32>,
    pub vendor_ids: Vec<u32>,
    pub product_name: Option<String>,
}

/// A peer's Diameter identity: Origin-Host/Origin-Realm, stable across
/// reconnects, unlike the underlying transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    pub origin_host: String,
    pub origin_realm: String,
}

impl PeerId {
    pub fn new(origin_host: impl Into<String>, origin_realm: impl Into<String>) -> Self {
        Self {
            origin_host: origin_host.into(),
            origin_realm: origin_realm.into(),
        }
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.origin_host)
    }
}
