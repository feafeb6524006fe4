//! Structured display events and the sink that renders them.
//!
//! Colour and formatting are a presentation concern, not this crate's —
//! what it owns is the *shape* of the events and a default sink that logs
//! them through `tracing` with structured fields.

use crate::gate::Mode;
use crate::record::{ClientAddr, Protocol, RequestRecord};

/// Outcome of an operator `f`/`d` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Forward,
    Drop,
}

/// A structured record describing one notable event in the proxy's
/// lifecycle, destined for the display sink.
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    Request {
        client_addr: ClientAddr,
        protocol: Protocol,
        method: String,
        host: String,
        target: String,
        selected_headers: Vec<(&'static str, String)>,
        queue_depth: usize,
    },
    ModeChanged {
        to: Mode,
        drained: Option<usize>,
    },
    Decision {
        kind: DecisionKind,
        remaining: usize,
    },
    QueueEmpty,
    Shutdown,
}

impl DisplayEvent {
    pub fn request(client_addr: ClientAddr, record: &RequestRecord, queue_depth: usize) -> Self {
        DisplayEvent::Request {
            client_addr,
            protocol: record.protocol(),
            method: record.method.clone(),
            host: record.host.clone(),
            target: record.target.clone(),
            selected_headers: record.selected_headers(),
            queue_depth,
        }
    }
}

/// Anything that can receive display events. Must be safe to call
/// concurrently from many connection-handler tasks and the console task;
/// line-atomic writes suffice (spec.md §5, "Shared resources").
pub trait DisplaySink: Send + Sync {
    fn emit(&self, event: DisplayEvent);
}

/// Default sink: renders every event as a single structured `tracing` line.
/// This is the sink `main.rs` wires in; anything fancier (colour, a TUI) is
/// an external collaborator that can implement `DisplaySink` instead.
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn emit(&self, event: DisplayEvent) {
        match event {
            DisplayEvent::Request {
                client_addr,
                protocol,
                method,
                host,
                target,
                selected_headers,
                queue_depth,
            } => {
                tracing::info!(
                    client = %client_addr,
                    %protocol,
                    %method,
                    %host,
                    %target,
                    queue_depth,
                    "request"
                );
                for (name, value) in selected_headers {
                    tracing::info!(header = name, value = %value, "  ");
                }
            }
            DisplayEvent::ModeChanged { to, drained } => match (to, drained) {
                (Mode::Manual, _) => tracing::info!("mode changed to manual"),
                (Mode::Auto, Some(0)) | (Mode::Auto, None) => {
                    tracing::info!("mode changed to auto")
                }
                (Mode::Auto, Some(n)) => {
                    tracing::info!(drained = n, "mode changed to auto, drained queue")
                }
            },
            DisplayEvent::Decision { kind, remaining } => match kind {
                DecisionKind::Forward => tracing::info!(remaining, "forwarded"),
                DecisionKind::Drop => tracing::info!(remaining, "dropped"),
            },
            DisplayEvent::QueueEmpty => tracing::info!("queue empty"),
            DisplayEvent::Shutdown => tracing::info!("shutdown"),
        }
    }
}
