//! Operator Console: single-key commands read from a cbreak-mode terminal.
//!
//! `s` toggles Auto/Manual (draining the queue on the way back to Auto),
//! `f` forwards the head of the queue, `d` drops it. Every other key is
//! ignored. Reads keys through `crossterm`'s async `EventStream` rather
//! than a blocking read loop, so a stuck stdin read can never block the
//! rest of the proxy or prevent a clean shutdown.

use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use tokio::sync::Notify;

use crate::display::{DecisionKind, DisplayEvent, DisplaySink};
use crate::gate::{InterceptionGate, Mode};

/// Puts the terminal into cbreak-equivalent raw mode on construction and
/// restores it on drop, covering every exit path (normal return, `?`
/// propagation, and unwinding during a panic).
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard { active: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = disable_raw_mode() {
                tracing::warn!(error = %e, "failed to restore terminal mode");
            }
        }
    }
}

/// Runs the operator console until `shutdown` is notified or the terminal's
/// event stream ends (e.g. stdin closed). Every Gate operation here is a
/// quick pop/push; the popped requests are then released on their own
/// spawned tasks so a slow upstream on one connection can never stall the
/// console's ability to read the next `s`/`f`/`d` keystroke.
pub async fn run(
    gate: Arc<InterceptionGate>,
    display: Arc<dyn DisplaySink>,
    connect_timeout: std::time::Duration,
    shutdown: Arc<Notify>,
) {
    let _raw_mode = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(error = %e, "could not enable raw terminal mode, console disabled");
            return;
        }
    };

    let mut events = EventStream::new();
    loop {
        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Ok(Event::Key(key))) => {
                        if is_ctrl_c(&key) {
                            shutdown.notify_waiters();
                            break;
                        }
                        handle_key(key.code, &gate, &display, connect_timeout).await;
                    }
                    Some(Ok(_)) => {} // resize, mouse, focus: ignored
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "terminal event stream error, console stopping");
                        break;
                    }
                    None => break, // stdin closed
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

async fn handle_key(
    code: KeyCode,
    gate: &Arc<InterceptionGate>,
    display: &Arc<dyn DisplaySink>,
    connect_timeout: std::time::Duration,
) {
    match code {
        KeyCode::Char('s') => toggle_mode(gate, display, connect_timeout).await,
        KeyCode::Char('f') => forward(gate, display, connect_timeout).await,
        KeyCode::Char('d') => drop_one(gate, display),
        _ => {}
    }
}

async fn toggle_mode(
    gate: &Arc<InterceptionGate>,
    display: &Arc<dyn DisplaySink>,
    connect_timeout: std::time::Duration,
) {
    match gate.mode() {
        Mode::Auto => {
            gate.set_manual();
            display.emit(DisplayEvent::ModeChanged {
                to: Mode::Manual,
                drained: None,
            });
        }
        Mode::Manual => {
            let drained = gate.set_auto();
            let count = drained.len();
            for pending in drained {
                tokio::spawn(async move {
                    pending.release(connect_timeout).await;
                });
            }
            display.emit(DisplayEvent::ModeChanged {
                to: Mode::Auto,
                drained: Some(count),
            });
        }
    }
}

async fn forward(
    gate: &Arc<InterceptionGate>,
    display: &Arc<dyn DisplaySink>,
    connect_timeout: std::time::Duration,
) {
    if gate.mode() != Mode::Manual {
        return;
    }
    match gate.forward_one() {
        (Some(pending), remaining) => {
            display.emit(DisplayEvent::Decision {
                kind: DecisionKind::Forward,
                remaining,
            });
            tokio::spawn(async move {
                pending.release(connect_timeout).await;
            });
        }
        (None, _) => display.emit(DisplayEvent::QueueEmpty),
    }
}

fn drop_one(gate: &Arc<InterceptionGate>, display: &Arc<dyn DisplaySink>) {
    if gate.mode() != Mode::Manual {
        return;
    }
    match gate.drop_one() {
        (Some(pending), remaining) => {
            display.emit(DisplayEvent::Decision {
                kind: DecisionKind::Drop,
                remaining,
            });
            drop(pending); // closes the client socket, no upstream dial
        }
        (None, _) => display.emit(DisplayEvent::QueueEmpty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::test_support::stub_pending;

    struct NullSink;
    impl DisplaySink for NullSink {
        fn emit(&self, _event: DisplayEvent) {}
    }

    #[tokio::test]
    async fn forward_on_non_manual_gate_is_a_noop() {
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(NullSink);
        forward(&gate, &display, std::time::Duration::from_secs(1)).await;
        assert_eq!(gate.queue_depth(), 0);
    }

    #[tokio::test]
    async fn drop_one_on_non_manual_gate_is_a_noop() {
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(NullSink);
        drop_one(&gate, &display);
        assert_eq!(gate.queue_depth(), 0);
    }

    #[tokio::test]
    async fn toggle_mode_from_manual_drains_queue_in_order() {
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(NullSink);
        gate.set_manual();
        let (a, _pa) = stub_pending("/a").await;
        let (b, _pb) = stub_pending("/b").await;
        gate.checked_enqueue(a).map_err(|_| ()).unwrap();
        gate.checked_enqueue(b).map_err(|_| ()).unwrap();

        toggle_mode(&gate, &display, std::time::Duration::from_millis(50)).await;
        assert_eq!(gate.mode(), Mode::Auto);
        assert_eq!(gate.queue_depth(), 0);
    }

    #[tokio::test]
    async fn toggle_mode_from_auto_enters_manual() {
        let gate = Arc::new(InterceptionGate::new());
        let display: Arc<dyn DisplaySink> = Arc::new(NullSink);
        toggle_mode(&gate, &display, std::time::Duration::from_secs(1)).await;
        assert_eq!(gate.mode(), Mode::Manual);
    }
}
