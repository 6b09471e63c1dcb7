//! Frame I/O on raw streams

use franchise_core::{FrameCodec, HEADER_LEN, Message};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Read one frame; `None` when the stream ends cleanly between frames
pub async fn read_frame<R>(reader: &mut R, codec: &FrameCodec) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = FrameCodec::body_len(header);
    codec.check_len(len)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(codec.decode_body(&body)?))
}

/// Write one frame in a single call and flush it
pub async fn write_frame<W>(writer: &mut W, codec: &FrameCodec, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = codec.encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
