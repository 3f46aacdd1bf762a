use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Everything a node needs to advertise itself and accept connections,
/// deserializable with `serde` the way the teacher's own configuration
/// types are (env, file, or code-built — this crate never parses a
/// config file or a CLI itself; see [crate]'s module docs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub origin_host: String,
    pub origin_realm: String,
    #[serde(default)]
    pub bind_addresses: Vec<SocketAddr>,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default)]
    pub vendor_ids: Vec<u32>,
    #[serde(default)]
    pub firmware_revision: u32,
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
}

fn default_product_name() -> String {
    "diameter-toolkit".to_string()
}

fn default_watchdog_interval_secs() -> u64 {
    30
}

impl NodeConfig {
    pub fn new(origin_host: impl Into<String>, origin_realm: impl Into<String>) -> Self {
        Self {
            origin_host: origin_host.into(),
            origin_realm: origin_realm.into(),
            bind_addresses: Vec::new(),
            product_name: default_product_name(),
            vendor_ids: Vec::new(),
            firmware_revision: 0,
            watchdog_interval_secs: default_watchdog_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fills_in_sensible_defaults() {
        let config = NodeConfig::new("pcrf.example.com", "example.com");
        assert_eq!(config.product_name, "diameter-toolkit");
        assert_eq!(config.watchdog_interval_secs, 30);
        assert!(config.bind_addresses.is_empty());
    }
}
