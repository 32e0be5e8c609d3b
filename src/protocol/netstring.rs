//! Netstring framing
//!
//! Frame format: `<decimal length>:<payload>,`

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// Largest payload accepted in either direction (16MB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Digits needed to express MAX_FRAME_LEN
const MAX_LEN_DIGITS: usize = 8;

/// Initial read buffer capacity
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Framing violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid length prefix")]
    InvalidLength,
    #[error("frame of {0} bytes exceeds the 16MB limit")]
    TooLarge(usize),
    #[error("missing ',' terminator")]
    MissingTerminator,
}

/// Append one framed payload to `dst`
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }

    let header = payload.len().to_string();
    dst.reserve(header.len() + payload.len() + 2);
    dst.put_slice(header.as_bytes());
    dst.put_u8(b':');
    dst.put_slice(payload);
    dst.put_u8(b',');

    Ok(())
}

/// Split the next complete frame off the front of `src`
///
/// Returns `Ok(None)` if more bytes are needed.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
    let window = &src[..src.len().min(MAX_LEN_DIGITS + 1)];
    let colon = match window.iter().position(|&b| b == b':') {
        Some(pos) => pos,
        None if src.len() > MAX_LEN_DIGITS => return Err(FrameError::InvalidLength),
        None => {
            if !window.iter().all(u8::is_ascii_digit) {
                return Err(FrameError::InvalidLength);
            }
            return Ok(None);
        }
    };

    let digits = &src[..colon];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidLength);
    }
    // ASCII digits only, cannot fail to be UTF-8
    let len: usize = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(FrameError::InvalidLength)?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let total = colon + 1 + len + 1;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }
    if src[total - 1] != b',' {
        return Err(FrameError::MissingTerminator);
    }

    src.advance(colon + 1);
    let payload = src.split_to(len).freeze();
    src.advance(1);

    Ok(Some(payload))
}

/// Buffered frame reader over any async byte stream
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Read the next frame
    ///
    /// `Ok(None)` means the peer closed the stream on a frame boundary.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf)? {
                return Ok(Some(frame));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // EOF inside a frame
                return Err(TransportError::Closed);
            }
        }
    }
}

/// Frame `payload` and write it out in one go
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    encode_frame(payload, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
