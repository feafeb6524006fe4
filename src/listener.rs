//! TCP listener and top-level accept loop.
//!
//! Binds once, then loops on `accept`, spawning a task per connection and
//! logging-and-continuing on transient accept errors. A failed bind is
//! fatal and surfaces to the caller as a `BindError`.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::display::DisplaySink;
use crate::error::BindError;
use crate::gate::InterceptionGate;
use crate::handler;
use crate::record::ClientAddr;

/// Bind and run the accept loop until `shutdown` resolves (typically
/// `tokio::signal::ctrl_c()`). Each accepted client is dispatched to its own
/// `handle_connection` task; accept errors other than the shutdown signal
/// are logged and do not stop the loop.
pub async fn run(
    config: Arc<Config>,
    gate: Arc<InterceptionGate>,
    display: Arc<dyn DisplaySink>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), BindError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Bind { addr, source })?;
    tracing::info!(%addr, "listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let client_addr = ClientAddr::from(peer);
                        let gate = Arc::clone(&gate);
                        let display = Arc::clone(&display);
                        let config = Arc::clone(&config);
                        tokio::spawn(async move {
                            handler::handle_connection(stream, client_addr, gate, display, config).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error, continuing");
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, closing listener");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::TracingSink;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn accepts_and_dispatches_a_client_in_auto_mode() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();
        let upstream_task = tokio::spawn(async move {
            let (mut sock, _) = upstream.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = sock.read(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"GET / HTTP/1.1"));
            sock.write_all(b"HTTP/1.1 200 OK\r\n\r\nok").await.unwrap();
        });

        let mut config = Config {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port: 0,
            connect_timeout_secs: 10,
            max_head_bytes: crate::parser::DEFAULT_MAX_HEAD_BYTES,
            no_banner: true,
            connect_timeout: Duration::from_secs(10),
        };
        // Bind to an ephemeral port ourselves first so we can learn it,
        // then hand that exact port to `run` to avoid a second bind race.
        let probe = TcpListener::bind((config.bind_addr, 0)).await.unwrap();
        config.port = probe.local_addr().unwrap().port();
        drop(probe);

        let config = Arc::new(config);
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(TracingSink);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let listen_addr = config.socket_addr();
        let server = tokio::spawn(run(config, gate, display, async {
            let _ = shutdown_rx.await;
        }));

        // Give the listener a moment to bind.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = TcpStream::connect(listen_addr).await.unwrap();
        let request = format!(
            "GET / HTTP/1.1\r\nHost: {}\r\n\r\n",
            upstream_addr
        );
        // Host header must carry host:port for the parser to resolve the
        // upstream target correctly.
        client.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\nok");

        upstream_task.await.unwrap();
        let _ = shutdown_tx.send(());
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_surfaces_as_bind_error() {
        let hog = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = hog.local_addr().unwrap().port();

        let config = Arc::new(Config {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port,
            connect_timeout_secs: 10,
            max_head_bytes: crate::parser::DEFAULT_MAX_HEAD_BYTES,
            no_banner: true,
            connect_timeout: Duration::from_secs(10),
        });
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(TracingSink);
        let result = run(config, gate, display, std::future::pending()).await;
        assert!(matches!(result, Err(BindError::Bind { .. })));
    }
}
