//! # Status Poller
//!
//! A [`StatusPoller`] repeatedly asks a [`StatusLookup`] for the status of one
//! transaction until the backend reports a terminal status or the returned
//! [`PollHandle`] is stopped.
//!
//! ## Guarantees
//!
//! - At most one query per handle is in flight. The next tick is only awaited
//!   once the previous query has resolved, failed, or hit the query timeout.
//! - Callbacks for a handle run in the order their queries resolved.
//! - `on_final` runs at most once, right after the `on_update` carrying the
//!   same terminal status.
//! - Once [`PollHandle::stop`] returns, no callback will run again. A result
//!   that arrives late is dropped.
//! - Failed queries never reach the sink. They are logged and retried on the
//!   next tick, optionally up to `max_consecutive_failures`.

use crate::{
    config::PollerConfig,
    error::{LookupError, WatchError},
    lookup::StatusLookup,
    status::{TxId, TxStatus},
};
use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// Receives the results of one polling cycle.
///
/// All methods are called from the poller's background task while it holds the
/// handle's delivery lock, so they should return quickly and must not call
/// back into the same [`PollHandle`].
pub trait StatusSink: Send + 'static {
    /// Called for every successful query, terminal or not.
    fn on_update(&mut self, status: TxStatus);

    /// Called once with the terminal status that ended the cycle.
    fn on_final(&mut self, status: TxStatus);

    /// Called once if the cycle gives up after too many failed queries in a row.
    fn on_abandoned(&mut self, _consecutive_failures: u32) {}
}

/// Adapts a pair of closures to a [`StatusSink`].
pub struct Callbacks<U, F> {
    on_update: U,
    on_final: Option<F>,
}

impl<U, F> Callbacks<U, F>
where
    U: FnMut(TxStatus) + Send + 'static,
    F: FnOnce(TxStatus) + Send + 'static,
{
    pub fn new(on_update: U, on_final: F) -> Self {
        Self {
            on_update,
            on_final: Some(on_final),
        }
    }
}

impl<U, F> StatusSink for Callbacks<U, F>
where
    U: FnMut(TxStatus) + Send + 'static,
    F: FnOnce(TxStatus) + Send + 'static,
{
    fn on_update(&mut self, status: TxStatus) {
        (self.on_update)(status);
    }

    fn on_final(&mut self, status: TxStatus) {
        if let Some(on_final) = self.on_final.take() {
            on_final(status);
        }
    }
}

/// The state shared between a [`PollHandle`] and its background task.
///
/// The sink is present exactly as long as the cycle is live. Taking it out is
/// what stops delivery, and it only ever happens once.
struct Delivery {
    sink: Option<Box<dyn StatusSink>>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("live", &self.sink.is_some())
            .finish()
    }
}

type SharedDelivery = Arc<Mutex<Delivery>>;

fn lock(delivery: &SharedDelivery) -> MutexGuard<'_, Delivery> {
    // A panicking sink must not wedge stop() or Drop.
    delivery.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Starts polling cycles against a shared [`StatusLookup`].
#[derive(Clone)]
pub struct StatusPoller {
    lookup: Arc<dyn StatusLookup>,
    config: Arc<PollerConfig>,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StatusPoller {
    /// Creates a poller, rejecting configurations with a zero interval or timeout.
    pub fn new(lookup: Arc<dyn StatusLookup>, config: PollerConfig) -> Result<Self, WatchError> {
        config.validate()?;
        Ok(Self {
            lookup,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts polling `id`, reporting through a pair of callbacks.
    ///
    /// Fails immediately with [`WatchError::EmptyIdentifier`] if `id` is blank,
    /// or with [`WatchError::NoRuntime`] outside a Tokio runtime.
    pub fn start<U, F>(&self, id: &str, on_update: U, on_final: F) -> Result<PollHandle, WatchError>
    where
        U: FnMut(TxStatus) + Send + 'static,
        F: FnOnce(TxStatus) + Send + 'static,
    {
        let id = TxId::new(id)?;
        self.start_with_sink(id, Callbacks::new(on_update, on_final))
    }

    /// Starts polling an already validated identifier, reporting to `sink`.
    ///
    /// The cycle runs on the current Tokio runtime; without one the sink is
    /// dropped unused and [`WatchError::NoRuntime`] is returned.
    pub fn start_with_sink<S: StatusSink>(&self, id: TxId, sink: S) -> Result<PollHandle, WatchError> {
        let runtime = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let delivery: SharedDelivery = Arc::new(Mutex::new(Delivery {
            sink: Some(Box::new(sink)),
        }));

        tracing::info!(tx = %id, interval = ?self.config.interval(), "Starting status polling");

        let task = PollTask {
            id: id.clone(),
            lookup: self.lookup.clone(),
            config: self.config.clone(),
            delivery: delivery.clone(),
        };
        let join = runtime.spawn(task.run());

        Ok(PollHandle {
            id,
            delivery,
            task: join,
        })
    }
}

/// A live polling cycle for one transaction.
///
/// Dropping the handle stops the cycle.
#[derive(Debug)]
pub struct PollHandle {
    id: TxId,
    delivery: SharedDelivery,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn id(&self) -> &TxId {
        &self.id
    }

    /// True once the cycle was stopped, settled, or abandoned.
    pub fn is_stopped(&self) -> bool {
        lock(&self.delivery).sink.is_none()
    }

    /// Stops the cycle. No callback runs after this returns.
    ///
    /// Calling it again, or on a cycle that already settled, does nothing.
    pub fn stop(&self) {
        let released = lock(&self.delivery).sink.take();
        self.task.abort();
        if released.is_some() {
            tracing::debug!(tx = %self.id, "Status polling stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask {
    id: TxId,
    lookup: Arc<dyn StatusLookup>,
    config: Arc<PollerConfig>,
    delivery: SharedDelivery,
}

impl PollTask {
    async fn run(self) {
        let period = self.config.interval();
        let first = if self.config.immediate_first_query {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut failures: u32 = 0;
        loop {
            ticker.tick().await;

            match self.query().await {
                Ok(status) => {
                    failures = 0;
                    if self.deliver(status).is_break() {
                        return;
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(tx = %self.id, failures, "Status query failed, retrying on next tick: {}", e);
                    if let Some(max) = self.config.max_consecutive_failures {
                        if failures >= max {
                            self.abandon(failures);
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn query(&self) -> Result<TxStatus, LookupError> {
        let limit: Duration = self.config.query_timeout();
        tracing::debug!(tx = %self.id, "Querying transaction status");
        match time::timeout(limit, self.lookup.lookup_status(&self.id)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(limit)),
        }
    }

    fn deliver(&self, status: TxStatus) -> ControlFlow<()> {
        let mut delivery = lock(&self.delivery);
        let Some(sink) = delivery.sink.as_mut() else {
            tracing::debug!(tx = %self.id, %status, "Discarding status that arrived after stop");
            return ControlFlow::Break(());
        };

        sink.on_update(status);
        if !status.is_terminal() {
            return ControlFlow::Continue(());
        }

        sink.on_final(status);
        delivery.sink = None;
        tracing::info!(tx = %self.id, %status, "Transaction settled, polling finished");
        ControlFlow::Break(())
    }

    fn abandon(&self, failures: u32) {
        let mut delivery = lock(&self.delivery);
        if let Some(mut sink) = delivery.sink.take() {
            tracing::warn!(tx = %self.id, failures, "Giving up on status polling");
            sink.on_abandoned(failures);
        }
    }
}
