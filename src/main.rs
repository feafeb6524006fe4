use std::sync::Arc;

use gatekeeper_proxy::config::Config;
use gatekeeper_proxy::display::{DisplayEvent, DisplaySink, TracingSink};
use gatekeeper_proxy::gate::InterceptionGate;
use gatekeeper_proxy::{console, listener};
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::parse_args());
    let gate = Arc::new(InterceptionGate::new());
    let display: Arc<dyn DisplaySink> = Arc::new(TracingSink);

    if !config.no_banner {
        tracing::info!(
            addr = %config.socket_addr(),
            mode = %gate.mode(),
            "gatekeeper-proxy starting"
        );
    }

    let shutdown = Arc::new(Notify::new());

    let ctrl_c_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_shutdown.notify_waiters();
        }
    });

    let console_gate = Arc::clone(&gate);
    let console_display = Arc::clone(&display);
    let console_shutdown = Arc::clone(&shutdown);
    let console_timeout = config.connect_timeout;
    tokio::spawn(async move {
        console::run(console_gate, console_display, console_timeout, console_shutdown).await;
    });

    let listener_shutdown = Arc::clone(&shutdown);
    let listener_display = Arc::clone(&display);
    let result = listener::run(config, gate, listener_display, async move {
        listener_shutdown.notified().await;
    })
    .await;

    match result {
        Ok(()) => {
            display.emit(DisplayEvent::Shutdown);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal: could not bind listener");
            Err(e.into())
        }
    }
}
