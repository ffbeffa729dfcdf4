//! Counting completion gate (enter/leave barrier)

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Default)]
struct GateState {
    outstanding: AtomicUsize,
    drained: Notify,
}

/// Barrier that releases once every entered unit has left
///
/// Each [`enter`](Self::enter) returns a [`GateGuard`]; dropping the guard
/// leaves. When the count returns to zero every waiter in
/// [`drained`](Self::drained) is woken once. Callers enter for the whole
/// batch before any unit can leave, so the count reaches zero exactly once.
#[derive(Clone, Default)]
pub struct CompletionGate {
    state: Arc<GateState>,
}

/// Membership of one unit in a [`CompletionGate`]; leaves on drop
#[must_use = "dropping the guard leaves the gate immediately"]
pub struct GateGuard {
    state: Arc<GateState>,
}

impl CompletionGate {
    /// Create a gate with nothing outstanding
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding unit
    pub fn enter(&self) -> GateGuard {
        self.state.outstanding.fetch_add(1, Ordering::AcqRel);
        GateGuard {
            state: self.state.clone(),
        }
    }

    /// Number of units that have entered but not left
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::Acquire)
    }

    /// Wait until no unit is outstanding
    ///
    /// Returns immediately if nothing has entered.
    pub async fn drained(&self) {
        loop {
            let notified = self.state.drained.notified();
            tokio::pin!(notified);
            // Register before checking the count so a leave between the two can't be missed
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl GateGuard {
    /// Leave the gate explicitly
    pub fn leave(self) {}
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.state.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.drained.notify_waiters();
        }
    }
}
