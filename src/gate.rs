//! The Interception Gate: process-wide mode + FIFO of pending requests.
//!
//! All mutating operations are mutually exclusive behind a single mutex.
//! Critical sections never perform I/O — they only move `PendingRequest`
//! ownership in and out of the queue; the caller releases (dials upstream,
//! pumps bytes) after the lock is dropped, keeping socket work out of any
//! shared-state critical section.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::pending::PendingRequest;

/// Gate mode: whether accepted requests are forwarded immediately or queued
/// for an operator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Auto => write!(f, "auto"),
            Mode::Manual => write!(f, "manual"),
        }
    }
}

struct GateState {
    mode: Mode,
    queue: VecDeque<PendingRequest>,
}

/// Process-wide gate. Created once at startup and shared by reference
/// (typically behind an `Arc`) with every Connection Handler task and the
/// Operator Console.
pub struct InterceptionGate {
    state: Mutex<GateState>,
}

impl Default for InterceptionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptionGate {
    pub fn new() -> Self {
        InterceptionGate {
            state: Mutex::new(GateState {
                mode: Mode::Auto,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Lock-free-from-the-caller's-perspective snapshot of the current mode.
    pub fn mode(&self) -> Mode {
        self.state.lock().expect("gate mutex poisoned").mode
    }

    /// Current queue depth.
    pub fn queue_depth(&self) -> usize {
        self.state.lock().expect("gate mutex poisoned").queue.len()
    }

    /// Enqueue `pr` if the gate is still `Manual`, atomically with the mode
    /// check. If the mode has flipped to `Auto` since the handler observed
    /// it, `pr` is handed back so the handler can dispatch it itself
    /// (auto behaviour) instead of leaking it into a queue that's supposed
    /// to be empty in `Auto` mode.
    pub fn checked_enqueue(&self, pr: PendingRequest) -> Result<usize, PendingRequest> {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        match state.mode {
            Mode::Manual => {
                state.queue.push_back(pr);
                Ok(state.queue.len())
            }
            Mode::Auto => Err(pr),
        }
    }

    /// Transition `Auto -> Manual`. Idempotent.
    pub fn set_manual(&self) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        state.mode = Mode::Manual;
    }

    /// Transition `Manual -> Auto`, draining the queue in FIFO order. The
    /// drained requests are returned to the caller for release *after* the
    /// lock has been dropped; the count released is `drained.len()`.
    pub fn set_auto(&self) -> Vec<PendingRequest> {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        state.mode = Mode::Auto;
        state.queue.drain(..).collect()
    }

    /// Pop the head of the queue, if any, for release by the caller.
    /// Returns `(popped, remaining_depth)`.
    pub fn forward_one(&self) -> (Option<PendingRequest>, usize) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        let popped = state.queue.pop_front();
        (popped, state.queue.len())
    }

    /// Pop the head of the queue, if any, for the caller to drop (close its
    /// client socket without dialing upstream). Returns
    /// `(popped, remaining_depth)`.
    pub fn drop_one(&self) -> (Option<PendingRequest>, usize) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        let popped = state.queue.pop_front();
        (popped, state.queue.len())
    }
}
