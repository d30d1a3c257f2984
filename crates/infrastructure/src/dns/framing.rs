//! Two-byte big-endian length prefix used by DNS over TCP, TLS and RFC 9250 QUIC.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub(crate) async fn write_framed<S>(stream: &mut S, message: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let length = u16::try_from(message.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes does not fit a length prefix", message.len()),
        )
    })?;

    stream.write_all(&length.to_be_bytes()).await?;
    stream.write_all(message).await?;
    stream.flush().await
}

/// Reads one framed message into `buf`, returning its length.
///
/// A clean EOF before the length prefix surfaces as `UnexpectedEof`.
pub(crate) async fn read_framed_into<S>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let length = u16::from_be_bytes(len_buf) as usize;

    if length > buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {} bytes exceeds buffer of {}", length, buf.len()),
        ));
    }

    stream.read_exact(&mut buf[..length]).await?;
    Ok(length)
}

pub(crate) async fn read_framed<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let mut message = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut message).await?;
    Ok(message)
}
