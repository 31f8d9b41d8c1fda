//! Gateway phase and invocation admission.
//!
//! Every dispatched request holds an [`InvocationGuard`]. Once draining
//! starts, [`GatewayLifecycle::admit`] refuses new invocations and
//! [`GatewayLifecycle::drain`] waits for the last guard to drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub fn accepts_invocations(self) -> bool {
        matches!(self, Self::Starting | Self::Serving)
    }
}

#[derive(Debug, Default)]
struct Counter {
    active: AtomicU64,
    idle: Notify,
}

/// Shared between the server task and every request handler.
#[derive(Debug)]
pub struct GatewayLifecycle {
    phase: ArcSwap<Phase>,
    invocations: Arc<Counter>,
}

impl GatewayLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: ArcSwap::from_pointee(Phase::Starting),
            invocations: Arc::new(Counter::default()),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        **self.phase.load()
    }

    pub fn serving(&self) {
        self.phase.store(Arc::new(Phase::Serving));
    }

    /// Registers one invocation, or `None` once draining has begun.
    #[must_use]
    pub fn admit(&self) -> Option<InvocationGuard> {
        if !self.phase().accepts_invocations() {
            return None;
        }
        self.invocations.active.fetch_add(1, Ordering::AcqRel);
        Some(InvocationGuard {
            counter: Arc::clone(&self.invocations),
        })
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.invocations.active.load(Ordering::Acquire)
    }

    /// Refuses further invocations without waiting for active ones.
    pub fn stop_admitting(&self) {
        self.phase.store(Arc::new(Phase::Draining));
    }

    /// Stops admitting invocations and waits up to `timeout` for the active
    /// ones to finish. Returns `false` if some were still running.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.stop_admitting();
        let idle = async {
            loop {
                let notified = self.invocations.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(timeout, idle).await.is_err() {
            return false;
        }
        self.phase.store(Arc::new(Phase::Stopped));
        true
    }
}

impl Default for GatewayLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one dispatched invocation.
#[derive(Debug)]
pub struct InvocationGuard {
    counter: Arc<Counter>,
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        if self.counter.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}
