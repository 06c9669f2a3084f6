// Length-prefixed CBOR framing for group messages

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (16MB). Bounds memory per connection; a single chunk
/// is small, but `InitWorkers` carries the whole peer map.
pub const MESSAGE_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Read a length-prefixed CBOR message from an async stream
pub async fn read_frame<T, M>(io: &mut T) -> io::Result<M>
where
    T: AsyncRead + Unpin,
    M: for<'de> Deserialize<'de>,
{
    // Read u32 length prefix (big-endian)
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    // Enforce size limit
    if len > MESSAGE_SIZE_LIMIT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame size {} exceeds limit {}", len, MESSAGE_SIZE_LIMIT),
        ));
    }

    // Read CBOR payload
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;

    // Deserialize CBOR
    ciborium::from_reader(&buf[..]).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a length-prefixed CBOR message to an async stream
pub async fn write_frame<T, M>(io: &mut T, message: &M) -> io::Result<()>
where
    T: AsyncWrite + Unpin,
    M: Serialize,
{
    // Serialize to CBOR
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // Check size limit
    if buf.len() > MESSAGE_SIZE_LIMIT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame size {} exceeds limit {}",
                buf.len(),
                MESSAGE_SIZE_LIMIT
            ),
        ));
    }

    // Write u32 length prefix (big-endian)
    let len = buf.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;

    // Write CBOR payload
    io.write_all(&buf).await?;
    io.flush().await?;

    Ok(())
}
