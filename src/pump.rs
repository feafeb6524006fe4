//! Bidirectional byte pump between two already-connected streams.
//!
//! Two independent copy loops joined with `tokio::join!` so a stalled
//! direction never starves its peer, each over a fixed-size buffer, each
//! closing its write half on EOF.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const CHUNK_SIZE: usize = 4 * 1024;

/// Copy bytes from `a` to `b` and from `b` to `a` concurrently until both
/// directions have reached EOF or hit an error. Opaque: no byte is
/// inspected or altered. Both streams are closed when this returns, since
/// `a` and `b` are borrowed for the duration and the caller drops them
/// afterwards.
pub async fn pump_bidirectional(a: &mut TcpStream, b: &mut TcpStream) {
    let (mut a_read, mut a_write) = a.split();
    let (mut b_read, mut b_write) = b.split();

    let a_to_b = copy_direction(&mut a_read, &mut b_write);
    let b_to_a = copy_direction(&mut b_read, &mut a_write);

    let (a_to_b_bytes, b_to_a_bytes) = tokio::join!(a_to_b, b_to_a);
    tracing::debug!(
        a_to_b_bytes,
        b_to_a_bytes,
        "pump finished, closing both streams"
    );
}

async fn copy_direction<R, W>(reader: &mut R, writer: &mut W) -> u64
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "pump read error, ending this direction");
                break;
            }
        };
        total += n as u64;
        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(error = %e, "pump write error, ending this direction");
            break;
        }
    }
    let _ = writer.shutdown().await;
    total
}
