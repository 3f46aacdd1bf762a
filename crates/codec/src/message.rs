use bytes::{BufMut, BytesMut};

use crate::avp::Avp;
use crate::constants::avp_code;
use crate::error::Error;
use crate::header::{CommandFlags, Header, HEADER_LEN};

/// A decoded Diameter message: header plus the ordered list of AVPs that
/// followed it. Named accessors below cover the AVPs the core node,
/// peer FSM, and binding rules need to read or write; anything else is
/// reached through [`Message::avps`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub avps: Vec<Avp>,
}

impl Message {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            avps: Vec::new(),
        }
    }

    pub fn push(&mut self, avp: Avp) -> &mut Self {
        self.avps.push(avp);
        self
    }

    pub fn find(&self, code: u32) -> Option<&Avp> {
        self.avps.iter().find(|avp| avp.code == code)
    }

    pub fn find_all(&self, code: u32) -> impl Iterator<Item = &Avp> {
        self.avps.iter().filter(move |avp| avp.code == code)
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let header = Header::decode(bytes)?;
        let total_len = header.length as usize;
        if bytes.len() < total_len {
            return Err(Error::Incomplete);
        }

        let mut avps = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < total_len {
            let (avp, consumed) = Avp::decode(&bytes[offset..total_len])?;
            avps.push(avp);
            offset += consumed;
        }

        if offset != total_len {
            return Err(Error::LengthMismatch {
                declared: header.length,
                actual: offset as u32,
            });
        }

        Ok((Self { header, avps }, total_len))
    }

    pub fn encode(&self, bytes: &mut BytesMut) {
        let body_len: usize = self.avps.iter().map(Avp::wire_len).sum();
        let mut header = self.header;
        header.length = (HEADER_LEN + body_len) as u32;
        header.encode(bytes);
        for avp in &self.avps {
            avp.encode(bytes);
        }
    }

    /// Builds an answer header for this (request) message: same codes and
    /// correlation IDs, Request flag cleared.
    pub fn answer_header(&self) -> Header {
        Header {
            flags: self.header.flags.as_answer(),
            length: 0,
            ..self.header
        }
    }

    // -- string AVPs -------------------------------------------------

    pub fn session_id(&self) -> Option<&str> {
        self.find(avp_code::SESSION_ID).and_then(Avp::as_str)
    }

    pub fn set_session_id(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::SESSION_ID, value))
    }

    pub fn origin_host(&self) -> Option<&str> {
        self.find(avp_code::ORIGIN_HOST).and_then(Avp::as_str)
    }

    pub fn set_origin_host(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::ORIGIN_HOST, value))
    }

    pub fn origin_realm(&self) -> Option<&str> {
        self.find(avp_code::ORIGIN_REALM).and_then(Avp::as_str)
    }

    pub fn set_origin_realm(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::ORIGIN_REALM, value))
    }

    pub fn destination_host(&self) -> Option<&str> {
        self.find(avp_code::DESTINATION_HOST).and_then(Avp::as_str)
    }

    pub fn set_destination_host(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::DESTINATION_HOST, value))
    }

    pub fn destination_realm(&self) -> Option<&str> {
        self.find(avp_code::DESTINATION_REALM).and_then(Avp::as_str)
    }

    pub fn set_destination_realm(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::DESTINATION_REALM, value))
    }

    pub fn product_name(&self) -> Option<&str> {
        self.find(avp_code::PRODUCT_NAME).and_then(Avp::as_str)
    }

    pub fn set_product_name(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::PRODUCT_NAME, value))
    }

    pub fn called_station_id(&self) -> Option<&str> {
        self.find(avp_code::CALLED_STATION_ID).and_then(Avp::as_str)
    }

    pub fn set_called_station_id(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::CALLED_STATION_ID, value))
    }

    pub fn sgsn_mcc_mnc(&self) -> Option<&str> {
        self.find(avp_code::SGSN_MCC_MNC).and_then(Avp::as_str)
    }

    pub fn set_sgsn_mcc_mnc(&mut self, value: &str) -> &mut Self {
        self.push(Avp::string(avp_code::SGSN_MCC_MNC, value))
    }

    pub fn firmware_revision(&self) -> Option<u32> {
        self.find(avp_code::FIRMWARE_REVISION).and_then(Avp::as_u32)
    }

    pub fn set_firmware_revision(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::FIRMWARE_REVISION, value))
    }

    // -- Route-Record (repeated) --------------------------------------

    pub fn route_records(&self) -> Vec<&str> {
        self.find_all(avp_code::ROUTE_RECORD)
            .filter_map(Avp::as_str)
            .collect()
    }

    pub fn append_route_record(&mut self, host: &str) -> &mut Self {
        self.push(Avp::string(avp_code::ROUTE_RECORD, host))
    }

    // -- u32 AVPs ------------------------------------------------------

    pub fn result_code(&self) -> Option<u32> {
        self.find(avp_code::RESULT_CODE).and_then(Avp::as_u32)
    }

    pub fn set_result_code(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::RESULT_CODE, value))
    }

    pub fn auth_application_id(&self) -> Option<u32> {
        self.find(avp_code::AUTH_APPLICATION_ID).and_then(Avp::as_u32)
    }

    pub fn set_auth_application_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::AUTH_APPLICATION_ID, value))
    }

    pub fn acct_application_id(&self) -> Option<u32> {
        self.find(avp_code::ACCT_APPLICATION_ID).and_then(Avp::as_u32)
    }

    pub fn set_acct_application_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::ACCT_APPLICATION_ID, value))
    }

    pub fn vendor_id(&self) -> Option<u32> {
        self.find(avp_code::VENDOR_ID).and_then(Avp::as_u32)
    }

    pub fn set_vendor_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::VENDOR_ID, value))
    }

    pub fn supported_vendor_ids(&self) -> Vec<u32> {
        self.find_all(avp_code::SUPPORTED_VENDOR_ID)
            .filter_map(Avp::as_u32)
            .collect()
    }

    pub fn append_supported_vendor_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::SUPPORTED_VENDOR_ID, value))
    }

    pub fn origin_state_id(&self) -> Option<u32> {
        self.find(avp_code::ORIGIN_STATE_ID).and_then(Avp::as_u32)
    }

    pub fn set_origin_state_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::ORIGIN_STATE_ID, value))
    }

    pub fn inband_security_id(&self) -> Option<u32> {
        self.find(avp_code::INBAND_SECURITY_ID).and_then(Avp::as_u32)
    }

    pub fn set_inband_security_id(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::INBAND_SECURITY_ID, value))
    }

    pub fn disconnect_cause(&self) -> Option<u32> {
        self.find(avp_code::DISCONNECT_CAUSE).and_then(Avp::as_u32)
    }

    pub fn set_disconnect_cause(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::DISCONNECT_CAUSE, value))
    }

    pub fn cc_request_type(&self) -> Option<u32> {
        self.find(avp_code::CC_REQUEST_TYPE).and_then(Avp::as_u32)
    }

    pub fn set_cc_request_type(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::CC_REQUEST_TYPE, value))
    }

    pub fn cc_request_number(&self) -> Option<u32> {
        self.find(avp_code::CC_REQUEST_NUMBER).and_then(Avp::as_u32)
    }

    pub fn set_cc_request_number(&mut self, value: u32) -> &mut Self {
        self.push(Avp::u32(avp_code::CC_REQUEST_NUMBER, value))
    }

    // -- address AVPs ----------------------------------------------------

    pub fn host_ip_address(&self) -> Option<std::net::IpAddr> {
        self.find(avp_code::HOST_IP_ADDRESS)
            .and_then(|avp| decode_address(&avp.payload))
    }

    pub fn set_host_ip_address(&mut self, addr: std::net::IpAddr) -> &mut Self {
        self.push(Avp::new(avp_code::HOST_IP_ADDRESS, encode_address(addr)))
    }

    pub fn framed_ip_address(&self) -> Option<std::net::Ipv4Addr> {
        let avp = self.find(avp_code::FRAMED_IP_ADDRESS)?;
        let bytes: [u8; 4] = avp.payload.as_slice().try_into().ok()?;
        Some(std::net::Ipv4Addr::from(bytes))
    }

    pub fn set_framed_ip_address(&mut self, addr: std::net::Ipv4Addr) -> &mut Self {
        self.push(Avp::new(avp_code::FRAMED_IP_ADDRESS, addr.octets().to_vec()))
    }

    /// Framed-IPv6-Prefix (97): a 1-byte reserved octet, a 1-byte prefix
    /// length, then the prefix bytes themselves (RFC 3162 §2.3).
    pub fn framed_ipv6_prefix(&self) -> Option<(std::net::Ipv6Addr, u8)> {
        let avp = self.find(avp_code::FRAMED_IPV6_PREFIX)?;
        if avp.payload.len() < 2 {
            return None;
        }
        let prefix_len = avp.payload[1];
        let mut octets = [0u8; 16];
        let prefix_bytes = &avp.payload[2..];
        octets[..prefix_bytes.len().min(16)].copy_from_slice(&prefix_bytes[..prefix_bytes.len().min(16)]);
        Some((std::net::Ipv6Addr::from(octets), prefix_len))
    }

    pub fn set_framed_ipv6_prefix(&mut self, addr: std::net::Ipv6Addr, prefix_len: u8) -> &mut Self {
        let mut payload = vec![0u8, prefix_len];
        let byte_len = (prefix_len as usize).div_ceil(8);
        payload.extend_from_slice(&addr.octets()[..byte_len]);
        self.push(Avp::new(avp_code::FRAMED_IPV6_PREFIX, payload))
    }

    // -- Subscription-Id grouped AVP (443: type 450 + data 444) ---------

    pub fn subscription_ids(&self) -> Vec<(u32, String)> {
        // The wire encodes Subscription-Id as a grouped AVP; this codec
        // stores groups flattened as adjacent Subscription-Id-Type /
        // Subscription-Id-Data pairs inside the group's own payload.
        self.find_all(avp_code::SUBSCRIPTION_ID)
            .filter_map(|group| parse_subscription_group(&group.payload))
            .collect()
    }

    pub fn append_subscription_id(&mut self, id_type: u32, data: &str) -> &mut Self {
        let mut inner = BytesMut::new();
        Avp::u32(avp_code::SUBSCRIPTION_ID_TYPE, id_type).encode(&mut inner);
        Avp::string(avp_code::SUBSCRIPTION_ID_DATA, data).encode(&mut inner);
        self.push(Avp::new(avp_code::SUBSCRIPTION_ID, inner.to_vec()))
    }
}

fn parse_subscription_group(payload: &[u8]) -> Option<(u32, String)> {
    let mut id_type = None;
    let mut data = None;
    let mut offset = 0;
    while offset < payload.len() {
        let (avp, consumed) = Avp::decode(&payload[offset..]).ok()?;
        match avp.code {
            avp_code::SUBSCRIPTION_ID_TYPE => id_type = avp.as_u32(),
            avp_code::SUBSCRIPTION_ID_DATA => data = avp.as_str().map(str::to_owned),
            _ => {}
        }
        offset += consumed;
    }
    Some((id_type?, data?))
}

fn encode_address(addr: std::net::IpAddr) -> Vec<u8> {
    let mut out = BytesMut::new();
    match addr {
        std::net::IpAddr::V4(v4) => {
            out.put_u16(1);
            out.extend_from_slice(&v4.octets());
        }
        std::net::IpAddr::V6(v6) => {
            out.put_u16(2);
            out.extend_from_slice(&v6.octets());
        }
    }
    out.to_vec()
}

fn decode_address(payload: &[u8]) -> Option<std::net::IpAddr> {
    if payload.len() < 2 {
        return None;
    }
    let family = u16::from_be_bytes([payload[0], payload[1]]);
    match family {
        1 if payload.len() >= 6 => {
            let bytes: [u8; 4] = payload[2..6].try_into().ok()?;
            Some(std::net::IpAddr::V4(std::net::Ipv4Addr::from(bytes)))
        }
        2 if payload.len() >= 18 => {
            let bytes: [u8; 16] = payload[2..18].try_into().ok()?;
            Some(std::net::IpAddr::V6(std::net::Ipv6Addr::from(bytes)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{application, command};

    fn request(code: u32, app: u32) -> Message {
        Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code: code,
            application_id: app,
            hop_by_hop_id: 1,
            end_to_end_id: 1,
        })
    }

    #[test]
    fn round_trips_a_ccr_with_named_avps() {
        let mut msg = request(command::CREDIT_CONTROL, application::GX);
        msg.set_session_id("pgw.example.com;1;1")
            .set_origin_host("pgw.example.com")
            .set_origin_realm("example.com")
            .set_cc_request_type(1)
            .set_cc_request_number(0)
            .set_framed_ip_address(std::net::Ipv4Addr::new(10, 0, 0, 5));

        let mut buf = BytesMut::new();
        msg.encode(&mut buf);

        let (decoded, consumed) = Message::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.session_id(), Some("pgw.example.com;1;1"));
        assert_eq!(decoded.cc_request_type(), Some(1));
        assert_eq!(
            decoded.framed_ip_address(),
            Some(std::net::Ipv4Addr::new(10, 0, 0, 5))
        );
    }

    #[test]
    fn accumulates_route_records_in_order() {
        let mut msg = request(command::CREDIT_CONTROL, application::GX);
        msg.append_route_record("a.example.com");
        msg.append_route_record("b.example.com");
        assert_eq!(msg.route_records(), vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn round_trips_a_subscription_id_group() {
        let mut msg = request(command::CREDIT_CONTROL, application::GX);
        msg.append_subscription_id(1, "123456789012345");

        let mut buf = BytesMut::new();
        msg.encode(&mut buf);

        let (decoded, _) = Message::decode(&buf).unwrap();
        assert_eq!(
            decoded.subscription_ids(),
            vec![(1, "123456789012345".to_string())]
        );
    }

    #[test]
    fn answer_header_clears_the_request_flag() {
        let msg = request(command::CREDIT_CONTROL, application::GX);
        let answer = msg.answer_header();
        assert!(!answer.flags.is_request());
        assert_eq!(answer.hop_by_hop_id, msg.header.hop_by_hop_id);
    }
}
