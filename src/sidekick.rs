//! Bridge to the host sidekick.
//!
//! The host publishes the project status once it has fetched it and signals
//! readiness when its UI is up. Tools ask for the status through
//! `lookup_status`, which never waits longer than the given timeout; a bridge
//! that never hears from the host simply times out.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;

/// Result of asking the host for the project status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusLookup {
    Fetched(Value),
    /// Host signalled readiness without ever publishing a status
    ReadyWithoutStatus,
    TimedOut,
}

impl StatusLookup {
    pub fn into_status(self) -> Option<Value> {
        match self {
            StatusLookup::Fetched(status) => Some(status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct HostState {
    status: Option<Value>,
    ready: bool,
}

pub struct SidekickBridge {
    tx: watch::Sender<HostState>,
}

impl Default for SidekickBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SidekickBridge {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HostState::default());
        Self { tx }
    }

    /// Record a `statusfetched` payload. The latest payload wins.
    pub fn publish_status(&self, status: Value) {
        self.tx.send_modify(|state| state.status = Some(status));
        tracing::debug!("sidekick status published");
    }

    /// Record the host's `sidekick-ready` signal.
    pub fn mark_ready(&self) {
        self.tx.send_modify(|state| state.ready = true);
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().ready
    }

    /// Wait for a status, a readiness signal or `timeout`, whichever is first.
    /// A status already published resolves immediately.
    pub async fn lookup_status(&self, timeout: Duration) -> StatusLookup {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| state.status.is_some() || state.ready),
        )
        .await;

        match waited {
            Ok(Ok(state)) => match &state.status {
                Some(status) => StatusLookup::Fetched(status.clone()),
                None => StatusLookup::ReadyWithoutStatus,
            },
            // The sender lives in `self`, so the channel cannot close here
            Ok(Err(_)) => StatusLookup::TimedOut,
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "sidekick status lookup timed out");
                StatusLookup::TimedOut
            }
        }
    }
}
