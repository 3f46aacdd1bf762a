use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;

/// AVP flags octet: `VM P0 0000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvpFlags(u8);

impl AvpFlags {
    const VENDOR: u8 = 0b1000_0000;
    const MANDATORY: u8 = 0b0100_0000;
    const PROTECTED: u8 = 0b0010_0000;

    pub fn mandatory() -> Self {
        Self(Self::MANDATORY)
    }

    pub fn has_vendor(&self) -> bool {
        self.0 & Self::VENDOR != 0
    }

    pub fn is_mandatory(&self) -> bool {
        self.0 & Self::MANDATORY != 0
    }

    pub fn is_protected(&self) -> bool {
        self.0 & Self::PROTECTED != 0
    }

    fn with_vendor(mut self, value: bool) -> Self {
        if value {
            self.0 |= Self::VENDOR;
        } else {
            self.0 &= !Self::VENDOR;
        }
        self
    }
}

/// One AVP, treated opaquely: the payload is the raw value octets (no
/// vendor dictionary decodes it into a typed Rust field here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub vendor_id: Option<u32>,
    pub flags: AvpFlags,
    pub payload: Vec<u8>,
}

impl Avp {
    pub fn new(code: u32, payload: Vec<u8>) -> Self {
        Self {
            code,
            vendor_id: None,
            flags: AvpFlags::mandatory(),
            payload,
        }
    }

    pub fn with_vendor(code: u32, vendor_id: u32, payload: Vec<u8>) -> Self {
        Self {
            code,
            vendor_id: Some(vendor_id),
            flags: AvpFlags::mandatory().with_vendor(true),
            payload,
        }
    }

    pub fn u32(code: u32, value: u32) -> Self {
        Self::new(code, value.to_be_bytes().to_vec())
    }

    pub fn string(code: u32, value: &str) -> Self {
        Self::new(code, value.as_bytes().to_vec())
    }

    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.payload.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// The padded-to-4-bytes wire length of this AVP, header included.
    pub fn wire_len(&self) -> usize {
        let header_len = if self.vendor_id.is_some() { 12 } else { 8 };
        let total = header_len + self.payload.len();
        total.div_ceil(4) * 4
    }

    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u32(self.code);

        let header_len = if self.vendor_id.is_some() { 12 } else { 8 };
        let avp_len = (header_len + self.payload.len()) as u32;

        bytes.put_u8(self.flags.0);
        bytes.put_u8((avp_len >> 16) as u8);
        bytes.put_u8((avp_len >> 8) as u8);
        bytes.put_u8(avp_len as u8);

        if let Some(vendor_id) = self.vendor_id {
            bytes.put_u32(vendor_id);
        }

        bytes.extend_from_slice(&self.payload);

        let padding = bytes.len() % 4;
        if padding != 0 {
            bytes.extend(std::iter::repeat_n(0u8, 4 - padding));
        }
    }

    pub fn decode(mut cursor: &[u8]) -> Result<(Self, usize), Error> {
        if cursor.len() < 8 {
            return Err(Error::TruncatedAvp);
        }

        let code = cursor.get_u32();
        let flags = AvpFlags(cursor.get_u8());
        let avp_len = u32::from(cursor[0]) << 16 | u32::from(cursor[1]) << 8 | u32::from(cursor[2]);
        cursor.advance(3);

        let avp_len = avp_len as usize;
        if avp_len < 8 {
            return Err(Error::TruncatedAvp);
        }

        let vendor_id = if flags.has_vendor() {
            if cursor.len() < 4 {
                return Err(Error::TruncatedAvp);
            }
            Some(cursor.get_u32())
        } else {
            None
        };

        let header_len = if vendor_id.is_some() { 12 } else { 8 };
        let payload_len = avp_len - header_len;
        if cursor.len() < payload_len {
            return Err(Error::TruncatedAvp);
        }

        let payload = cursor[..payload_len].to_vec();
        let padded_len = avp_len.div_ceil(4) * 4;

        Ok((
            Self {
                code,
                vendor_id,
                flags,
                payload,
            },
            padded_len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_plain_avp() {
        let avp = Avp::string(263, "pcef;1;1");
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);

        let (decoded, consumed) = Avp::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.code, 263);
        assert_eq!(decoded.as_str(), Some("pcef;1;1"));
    }

    #[test]
    fn round_trips_a_vendor_avp() {
        let avp = Avp::with_vendor(8, 10415, vec![10, 0, 0, 5]);
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);

        let (decoded, _) = Avp::decode(&buf).unwrap();
        assert_eq!(decoded.vendor_id, Some(10415));
        assert_eq!(decoded.payload, vec![10, 0, 0, 5]);
    }

    #[test]
    fn pads_payload_to_four_byte_boundary() {
        let avp = Avp::string(264, "a");
        assert_eq!(avp.wire_len() % 4, 0);

        let mut buf = BytesMut::new();
        avp.encode(&mut buf);
        assert_eq!(buf.len(), avp.wire_len());
    }
}
