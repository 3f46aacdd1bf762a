//! Peer URI form (spec §6): `aaa://<host>:<port>;transport=tcp` or
//! `;transport=sctp`. No TLS in the core, so `aaas://` is rejected
//! rather than silently downgraded.

use std::fmt;

use crate::error::Error;

/// Which socket family a peer is reachable over. The core models this
/// as data on [`crate::Peer`] (spec §3 "transport ∈ {TCP, SCTP}");
/// only TCP has a concrete connection driver in this toolkit today — an
/// SCTP association is an external-collaborator transport per spec §1,
/// the same way the codec's AVP dictionary is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Sctp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Sctp => write!(f, "sctp"),
        }
    }
}

/// A parsed `aaa://host:port;transport=...` peer URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerUri {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

impl PeerUri {
    /// Parses `aaa://<host>:<port>;transport=tcp|sctp`. `transport`
    /// defaults to `tcp` when the parameter is absent, matching RFC
    /// 6733 §4.4.2's default.
    pub fn parse(uri: &str) -> Result<Self, Error> {
        let rest = uri
            .strip_prefix("aaa://")
            .ok_or_else(|| Error::InvalidPeerUri(uri.to_string()))?;

        let (authority, params) = match rest.split_once(';') {
            Some((authority, params)) => (authority, Some(params)),
            None => (rest, None),
        };

        let (host, port_str) = authority
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidPeerUri(uri.to_string()))?;
        if host.is_empty() {
            return Err(Error::InvalidPeerUri(uri.to_string()));
        }
        let port: u16 = port_str
            .parse()
            .map_err(|_| Error::InvalidPeerUri(uri.to_string()))?;

        let transport = match params {
            None => Transport::Tcp,
            Some(params) => parse_transport_param(params, uri)?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            transport,
        })
    }
}

fn parse_transport_param(params: &str, uri: &str) -> Result<Transport, Error> {
    for param in params.split(';') {
        if let Some(value) = param.strip_prefix("transport=") {
            return match value {
                "tcp" => Ok(Transport::Tcp),
                "sctp" => Ok(Transport::Sctp),
                _ => Err(Error::InvalidPeerUri(uri.to_string())),
            };
        }
    }
    Ok(Transport::Tcp)
}

impl fmt::Display for PeerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aaa://{}:{};transport={}", self.host, self.port, self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_by_default_with_no_transport_parameter() {
        let uri = PeerUri::parse("aaa://pcrf.example.com:3868").unwrap();
        assert_eq!(uri.host, "pcrf.example.com");
        assert_eq!(uri.port, 3868);
        assert_eq!(uri.transport, Transport::Tcp);
    }

    #[test]
    fn parses_an_explicit_sctp_transport_parameter() {
        let uri = PeerUri::parse("aaa://pcrf.example.com:3868;transport=sctp").unwrap();
        assert_eq!(uri.transport, Transport::Sctp);
    }

    #[test]
    fn round_trips_through_display() {
        let uri = PeerUri::parse("aaa://pcrf.example.com:3868;transport=sctp").unwrap();
        assert_eq!(uri.to_string(), "aaa://pcrf.example.com:3868;transport=sctp");
    }

    #[test]
    fn rejects_a_uri_missing_the_aaa_scheme() {
        assert!(PeerUri::parse("pcrf.example.com:3868").is_err());
    }

    #[test]
    fn rejects_an_unknown_transport_parameter() {
        assert!(PeerUri::parse("aaa://pcrf.example.com:3868;transport=sctp-bogus").is_err());
    }

    #[test]
    fn rejects_a_missing_port() {
        assert!(PeerUri::parse("aaa://pcrf.example.com").is_err());
    }
}
