//! `tokio_util` codec for RCON frames.
//!
//! The decoder trusts the declared size to delimit frames in the
//! stream and leaves partial frames in the buffer until the rest
//! arrives.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RconError;
use crate::packet::{MAX_FRAME_SIZE, Packet, peek_frame_len};

#[derive(Debug, Default, Clone, Copy)]
pub struct RconCodec;

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let size = match peek_frame_len(src)? {
            Some(size) => size,
            None => return Ok(None),
        };
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let frame = src.split_to(size);
        Packet::decode(&frame).map(Some)
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = RconError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = item.encoded_len();
        if size > MAX_FRAME_SIZE {
            return Err(RconError::InvalidFrameSize {
                size,
                min: crate::packet::HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageType, Origin};
    use crate::sequence::Sequence;
    use crate::word::Word;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn event(counter: u32, words: &[&str]) -> Packet {
        Packet::new(
            Sequence::new(counter, Origin::Server, MessageType::Request),
            words.iter().map(|w| Word::from(*w)).collect(),
        )
    }

    #[tokio::test]
    async fn frame_split_across_reads() {
        let packet = event(1, &["player.onJoin", "Soldier", "EA_1234"]);
        let bytes = packet.to_bytes();

        let mock = tokio_test::io::Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..15])
            .read(&bytes[15..])
            .build();
        let mut frames = FramedRead::new(mock, RconCodec);

        assert_eq!(frames.next().await.unwrap().unwrap(), packet);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn several_frames_in_one_read() {
        let a = event(1, &["server.onRoundOver", "1"]);
        let b = event(2, &["player.onLeave", "Soldier"]);
        let mut joined = a.to_bytes().to_vec();
        joined.extend_from_slice(&b.to_bytes());

        let mock = tokio_test::io::Builder::new().read(&joined).build();
        let mut frames = FramedRead::new(mock, RconCodec);

        assert_eq!(frames.next().await.unwrap().unwrap(), a);
        assert_eq!(frames.next().await.unwrap().unwrap(), b);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn garbage_size_is_an_error() {
        let mut bytes = event(1, &["x"]).to_bytes().to_vec();
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

        let mock = tokio_test::io::Builder::new().read(&bytes).build();
        let mut frames = FramedRead::new(mock, RconCodec);

        let err = frames.next().await.unwrap().unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn encode_appends_frame() {
        let packet = event(3, &["OK"]);
        let mut dst = BytesMut::new();
        RconCodec.encode(packet.clone(), &mut dst).unwrap();
        assert_eq!(&dst[..], &packet.to_bytes()[..]);
    }

    #[test]
    fn partial_header_waits() {
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0, 20][..]);
        assert!(RconCodec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);
    }
}
