//! The `PendingRequest` variant and its release/drop paths.
//!
//! A `PendingRequest` is created by the Connection Handler when the Gate is
//! in manual mode, exclusively owned by the Gate's queue until released or
//! dropped. Release hands the client stream to a fresh Byte Pump task (after
//! dialing upstream and, for tunnels, sending the CONNECT sentinel); drop
//! closes the client stream outright by letting it fall out of scope.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::HandlerError;
use crate::pump;
use crate::record::RequestRecord;

pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// A live request awaiting an operator decision (or immediate auto-release).
pub enum PendingRequest {
    Http {
        client: TcpStream,
        record: RequestRecord,
    },
    Tunnel {
        client: TcpStream,
        host: String,
        port: u16,
        record: RequestRecord,
    },
}

impl PendingRequest {
    pub fn record(&self) -> &RequestRecord {
        match self {
            PendingRequest::Http { record, .. } => record,
            PendingRequest::Tunnel { record, .. } => record,
        }
    }

    /// Request-target, used for FIFO-order assertions in tests and for
    /// nothing in production — production code reads `record()` directly.
    pub fn target(&self) -> &str {
        &self.record().target
    }

    /// Dial upstream and either pump an HTTP response back to the client
    /// (HTTP variant) or complete the CONNECT handshake and pump both
    /// directions opaquely (Tunnel variant). Consumes `self`; on any
    /// failure the client socket is closed by being dropped.
    pub async fn release(self, connect_timeout: Duration) {
        match self {
            PendingRequest::Http { mut client, record } => {
                match dial(&record.host, record.port, connect_timeout).await {
                    Ok(mut upstream) => {
                        use tokio::io::AsyncWriteExt;
                        if let Err(e) = upstream.write_all(&record.raw_head).await {
                            tracing::warn!(error = %e, host = %record.host, "failed writing request head upstream");
                            return;
                        }
                        pump::pump_bidirectional(&mut client, &mut upstream).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, host = %record.host, "upstream dial failed, closing client");
                    }
                }
            }
            PendingRequest::Tunnel {
                mut client,
                host,
                port,
                ..
            } => match dial(&host, port, connect_timeout).await {
                Ok(mut upstream) => {
                    use tokio::io::AsyncWriteExt;
                    if let Err(e) = client.write_all(CONNECTION_ESTABLISHED).await {
                        tracing::warn!(error = %e, "failed to send 200 Connection Established");
                        return;
                    }
                    pump::pump_bidirectional(&mut client, &mut upstream).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, %host, "upstream dial failed, closing client");
                }
            },
        }
        // `client` (and `upstream` on the success path) are dropped here,
        // closing both sockets.
    }
}

async fn dial(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, HandlerError> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(HandlerError::UpstreamDial(format!("{addr}: {e}"))),
        Err(_) => Err(HandlerError::UpstreamDial(format!("{addr}: connect timed out"))),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn release_http_forwards_raw_head_and_pumps_response() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"GET /hi HTTP/1.1\r\n\r\n");
            sock.write_all(b"HTTP/1.1 200 OK\r\n\r\nhi").await.unwrap();
        });

        let (client, mut peer) = loopback_pair().await;
        let mut record = stub_record("/hi");
        record.host = upstream_addr.ip().to_string();
        record.port = upstream_addr.port();

        let pending = PendingRequest::Http { client, record };
        pending.release(Duration::from_secs(2)).await;
        server.await.unwrap();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"HTTP/1.1 200 OK\r\n\r\nhi");
    }

    #[tokio::test]
    async fn release_tunnel_sends_connection_established_before_payload() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"payload").await.unwrap();
        });

        let (client, mut peer) = loopback_pair().await;
        let record = stub_record("api.test:443");
        let pending = PendingRequest::Tunnel {
            client,
            host: upstream_addr.ip().to_string(),
            port: upstream_addr.port(),
            record,
        };
        pending.release(Duration::from_secs(2)).await;
        server.await.unwrap();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(&received, b"HTTP/1.1 200 Connection Established\r\n\r\npayload");
    }

    #[tokio::test]
    async fn release_closes_client_on_dial_failure() {
        let (client, mut peer) = loopback_pair().await;
        let mut record = stub_record("/x");
        // Port 0 after connect-time resolution reliably refuses.
        record.host = "127.0.0.1".to_string();
        record.port = 1; // privileged/unused port, expected to refuse locally
        let pending = PendingRequest::Http { client, record };
        pending.release(Duration::from_millis(500)).await;

        let mut buf = [0u8; 1];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "peer should observe EOF once client is dropped");
    }
}
