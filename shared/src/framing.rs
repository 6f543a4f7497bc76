//! Length-delimited message framing over reliable byte streams.
//!
//! Wire format: a 4-byte big-endian payload length followed by the
//! bincode-encoded message. TCP gives us ordering and reliability, so a
//! frame is either delivered whole and in order or the connection dies.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload either side accepts. A late-join snapshot for two fighters
/// is a few hundred bytes.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed by peer")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge(usize),
    #[error("malformed message: {0}")]
    Decode(bincode::Error),
    #[error("failed to encode message: {0}")]
    Encode(bincode::Error),
}

impl FrameError {
    /// True when the peer sent bytes we cannot interpret.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FrameError::TooLarge(_) | FrameError::Decode(_))
    }
}

/// Serializes `message` and writes it as a single frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message).map_err(FrameError::Encode)?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(FrameError::TooLarge(payload.len()));
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and decodes it.
///
/// A clean EOF before the length prefix is reported as `Closed`.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(FrameError::Io(e)),
    };

    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(len as usize));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(FrameError::Decode)
}
