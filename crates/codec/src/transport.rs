use bytes::BytesMut;

use crate::error::Error;
use crate::message::Message;

/// Frames a byte stream into Diameter messages and back.
///
/// Implementations own no I/O; they only turn accumulated bytes into
/// [`Message`]s (and vice versa) so the peer layer can sit on top of
/// whatever actually carries the bytes — a TCP stream in production, an
/// in-memory duplex pipe in tests.
pub trait MessageCodec: Send + Sync {
    /// Tries to decode one message from the front of `buf`, consuming its
    /// bytes on success. Returns `Ok(None)` when `buf` holds an
    /// incomplete message and the caller should read more.
    fn try_decode(&self, buf: &mut BytesMut) -> Result<Option<Message>, Error>;

    fn encode(&self, message: &Message, out: &mut BytesMut);
}

/// The standard RFC 6733 framing: the header's own 24-bit Message Length
/// field is the frame length, there is no additional length prefix or
/// delimiter on the wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDiameterCodec;

impl MessageCodec for RawDiameterCodec {
    fn try_decode(&self, buf: &mut BytesMut) -> Result<Option<Message>, Error> {
        match Message::decode(buf) {
            Ok((message, consumed)) => {
                let _ = buf.split_to(consumed);
                Ok(Some(message))
            }
            Err(Error::Incomplete) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn encode(&self, message: &Message, out: &mut BytesMut) {
        message.encode(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{CommandFlags, Header};

    #[test]
    fn waits_for_a_full_message_before_decoding() {
        let codec = RawDiameterCodec;
        let mut msg = Message::new(Header {
            version: 1,
            length: 0,
            flags: CommandFlags::request(),
            command_code: 280,
            application_id: 0,
            hop_by_hop_id: 1,
            end_to_end_id: 1,
        });
        msg.set_origin_host("peer.example.com");

        let mut full = BytesMut::new();
        msg.encode(&mut full);

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec.try_decode(&mut partial).unwrap().is_none());

        let mut buf = full.clone();
        let decoded = codec.try_decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.origin_host(), Some("peer.example.com"));
        assert!(buf.is_empty());
    }
}
