//! # Status Observer
//!
//! [`StatusObserver`] ties a polling cycle to the lifetime of whatever UI
//! element displays it. It owns at most one [`PollHandle`], publishes the
//! latest [`StatusSnapshot`] on a `watch` channel, and stops its cycle when it
//! is stopped, restarted, or dropped.

use crate::{
    error::WatchError,
    poller::{PollHandle, StatusPoller, StatusSink},
    status::{TxId, TxStatus},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Where an observer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPhase {
    /// Nothing is being tracked.
    Idle,
    /// A cycle is running and the last known status is non-terminal.
    Polling,
    /// The backend reported a terminal status. `start` may be called again.
    Settled,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub identifier: Option<TxId>,
    /// `None` until a cycle is started.
    pub status: Option<TxStatus>,
    pub phase: ObserverPhase,
    /// Incremented on every published change, so repeated identical statuses
    /// are still observable.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    fn idle() -> Self {
        Self {
            identifier: None,
            status: None,
            phase: ObserverPhase::Idle,
            revision: 0,
            updated_at: Utc::now(),
        }
    }
}

type SharedState = Arc<watch::Sender<StatusSnapshot>>;

fn publish(state: &SharedState, change: impl FnOnce(&mut StatusSnapshot)) {
    state.send_modify(|snapshot| {
        change(snapshot);
        snapshot.revision += 1;
        snapshot.updated_at = Utc::now();
    });
}

fn clear(snapshot: &mut StatusSnapshot) {
    snapshot.identifier = None;
    snapshot.status = None;
    snapshot.phase = ObserverPhase::Idle;
}

/// Feeds poller callbacks into the observer's snapshot.
struct ObserverSink {
    state: SharedState,
}

impl StatusSink for ObserverSink {
    fn on_update(&mut self, status: TxStatus) {
        publish(&self.state, |snapshot| {
            snapshot.status = Some(status);
            if status.is_terminal() {
                snapshot.phase = ObserverPhase::Settled;
            }
        });
    }

    fn on_final(&mut self, status: TxStatus) {
        // on_update already published the terminal status; only correct drift.
        self.state.send_if_modified(|snapshot| {
            if snapshot.phase == ObserverPhase::Settled && snapshot.status == Some(status) {
                return false;
            }
            snapshot.status = Some(status);
            snapshot.phase = ObserverPhase::Settled;
            snapshot.revision += 1;
            snapshot.updated_at = Utc::now();
            true
        });
    }

    fn on_abandoned(&mut self, _consecutive_failures: u32) {
        publish(&self.state, |snapshot| snapshot.phase = ObserverPhase::Idle);
    }
}

/// Tracks the status of one transaction at a time on behalf of a UI element.
#[derive(Debug)]
pub struct StatusObserver {
    poller: StatusPoller,
    active: Option<PollHandle>,
    state: SharedState,
}

impl StatusObserver {
    pub fn new(poller: StatusPoller) -> Self {
        let (state, _) = watch::channel(StatusSnapshot::idle());
        Self {
            poller,
            active: None,
            state: Arc::new(state),
        }
    }

    /// Starts tracking `identifier`, replacing any cycle already running.
    ///
    /// A blank identifier is rejected before anything else happens, so the
    /// current cycle keeps running in that case. Without a Tokio runtime the
    /// observer ends up idle.
    pub fn start(&mut self, identifier: &str) -> Result<(), WatchError> {
        let id = TxId::new(identifier)?;

        if let Some(previous) = self.active.take() {
            tracing::debug!(previous = %previous.id(), next = %id, "Replacing active status poll");
            previous.stop();
        }

        publish(&self.state, |snapshot| {
            snapshot.identifier = Some(id.clone());
            snapshot.status = Some(TxStatus::Pending);
            snapshot.phase = ObserverPhase::Polling;
        });

        let sink = ObserverSink {
            state: self.state.clone(),
        };
        match self.poller.start_with_sink(id, sink) {
            Ok(handle) => {
                self.active = Some(handle);
                Ok(())
            }
            Err(e) => {
                publish(&self.state, clear);
                Err(e)
            }
        }
    }

    /// Stops the active cycle, if any.
    ///
    /// A running cycle returns the observer to idle. A settled or abandoned
    /// cycle only releases its handle; the last snapshot stays on display.
    pub fn stop(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        handle.stop();
        let was_polling = self.state.borrow().phase == ObserverPhase::Polling;
        if was_polling {
            publish(&self.state, clear);
        }
    }

    pub fn status(&self) -> Option<TxStatus> {
        self.state.borrow().status
    }

    pub fn phase(&self) -> ObserverPhase {
        self.state.borrow().phase
    }

    pub fn identifier(&self) -> Option<TxId> {
        self.state.borrow().identifier.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.borrow().clone()
    }

    /// True while a cycle owned by this observer is still querying.
    pub fn is_polling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| !handle.is_stopped())
    }

    /// A receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.state.subscribe()
    }

    /// The snapshot as a stream, starting with the current value.
    pub fn updates(&self) -> WatchStream<StatusSnapshot> {
        WatchStream::new(self.subscribe())
    }
}

impl Drop for StatusObserver {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            tracing::debug!(tx = %handle.id(), "Observer dropped, stopping status poll");
            handle.stop();
        }
    }
}
