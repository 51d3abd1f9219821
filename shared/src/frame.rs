//! Length-prefixed bincode frames.
//!
//! Each frame is a big-endian `u32` payload length followed by one encoded
//! [`Packet`]. Both ends of a connection use these helpers.

use crate::Packet;
use bincode::{deserialize, serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
    #[error("malformed packet: {0}")]
    Codec(#[from] bincode::Error),
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serialize(packet)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let packet = Packet::JoinRoom {
            identity: Identity::with_account("pid-1", "alice"),
            code: "ABC234".to_string(),
        };
        write_packet(&mut a, &packet).await.unwrap();

        match read_packet(&mut b).await.unwrap() {
            Packet::JoinRoom { identity, code } => {
                assert_eq!(code, "ABC234");
                assert_eq!(identity.account.as_deref(), Some("alice"));
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_LEN + 1) as u32).await.unwrap();
        match read_packet(&mut b).await {
            Err(FrameError::TooLarge(len)) => assert_eq!(len, MAX_FRAME_LEN + 1),
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_payload_is_a_codec_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(4).await.unwrap();
        a.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();
        assert!(matches!(read_packet(&mut b).await, Err(FrameError::Codec(_))));
    }

    #[tokio::test]
    async fn test_closed_stream_is_an_io_error() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(matches!(read_packet(&mut b).await, Err(FrameError::Io(_))));
    }
}
