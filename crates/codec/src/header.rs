use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;

pub const HEADER_LEN: usize = 20;

/// The 8-bit command-flags octet, bits `RPET____` (RFC 6733 §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFlags(u8);

impl CommandFlags {
    const REQUEST: u8 = 0b1000_0000;
    const PROXYABLE: u8 = 0b0100_0000;
    const ERROR: u8 = 0b0010_0000;
    const RETRANSMITTED: u8 = 0b0001_0000;

    pub fn request() -> Self {
        Self(Self::REQUEST)
    }

    pub fn is_request(&self) -> bool {
        self.0 & Self::REQUEST != 0
    }

    pub fn is_proxyable(&self) -> bool {
        self.0 & Self::PROXYABLE != 0
    }

    pub fn is_error(&self) -> bool {
        self.0 & Self::ERROR != 0
    }

    pub fn is_retransmitted(&self) -> bool {
        self.0 & Self::RETRANSMITTED != 0
    }

    pub fn with_proxyable(mut self, value: bool) -> Self {
        self.set(Self::PROXYABLE, value);
        self
    }

    pub fn with_error(mut self, value: bool) -> Self {
        self.set(Self::ERROR, value);
        self
    }

    pub fn with_retransmitted(mut self, value: bool) -> Self {
        self.set(Self::RETRANSMITTED, value);
        self
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn as_answer(&self) -> Self {
        Self(self.0 & !Self::REQUEST)
    }
}

impl From<u8> for CommandFlags {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<CommandFlags> for u8 {
    fn from(value: CommandFlags) -> Self {
        value.0
    }
}

/// The 20-byte Diameter message header.
///
/// # Test
///
/// ```
/// use codec::header::{CommandFlags, Header};
///
/// let header = Header {
///     version: 1,
///     length: 20,
///     flags: CommandFlags::request(),
///     command_code: 272,
///     application_id: 16777238,
///     hop_by_hop_id: 7,
///     end_to_end_id: 9,
/// };
///
/// let mut buf = bytes::BytesMut::new();
/// header.encode(&mut buf);
/// assert_eq!(buf.len(), 20);
///
/// let decoded = Header::decode(&buf).unwrap();
/// assert_eq!(decoded.command_code, 272);
/// assert!(decoded.flags.is_request());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub length: u32,
    pub flags: CommandFlags,
    pub command_code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

impl Header {
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Incomplete);
        }

        let mut cursor = bytes;
        let version = cursor.get_u8();
        if version != 1 {
            return Err(Error::UnsupportedVersion(version));
        }

        let length = read_u24(&mut cursor);
        let flags = CommandFlags::from(cursor.get_u8());
        let command_code = read_u24(&mut cursor);
        let application_id = cursor.get_u32();
        let hop_by_hop_id = cursor.get_u32();
        let end_to_end_id = cursor.get_u32();

        Ok(Self {
            version,
            length,
            flags,
            command_code,
            application_id,
            hop_by_hop_id,
            end_to_end_id,
        })
    }

    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(self.version);
        write_u24(bytes, self.length);
        bytes.put_u8(self.flags.into());
        write_u24(bytes, self.command_code);
        bytes.put_u32(self.application_id);
        bytes.put_u32(self.hop_by_hop_id);
        bytes.put_u32(self.end_to_end_id);
    }
}

fn read_u24(cursor: &mut &[u8]) -> u32 {
    let value = u32::from(cursor[0]) << 16 | u32::from(cursor[1]) << 8 | u32::from(cursor[2]);
    cursor.advance(3);
    value
}

fn write_u24(bytes: &mut BytesMut, value: u32) {
    bytes.put_u8((value >> 16) as u8);
    bytes.put_u8((value >> 8) as u8);
    bytes.put_u8(value as u8);
}
