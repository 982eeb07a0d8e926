#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};
use teocoin_tx_watcher::{LookupError, PollerConfig, StatusLookup, StatusPoller, TxId, TxStatus};
use tokio::sync::Notify;

pub const INTERVAL: Duration = Duration::from_secs(3);

/// One scripted answer of a [`ScriptedLookup`].
#[derive(Clone)]
pub enum Step {
    Status(TxStatus),
    Fail,
    /// Never resolves; only a query timeout or cancellation ends it.
    Hang,
    /// Resolves with the status once the gate is notified.
    Gated(Arc<Notify>, TxStatus),
}

/// An in-memory backend that answers from a script and records every query.
pub struct ScriptedLookup {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    queried: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    /// Answers with `steps` in order, then with `fallback` forever.
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback,
            queried: Mutex::new(Vec::new()),
        })
    }

    pub fn always(status: TxStatus) -> Arc<Self> {
        Self::new([], Step::Status(status))
    }

    pub fn calls(&self) -> usize {
        self.queried.lock().unwrap().len()
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusLookup for ScriptedLookup {
    async fn lookup_status(&self, id: &TxId) -> Result<TxStatus, LookupError> {
        self.queried.lock().unwrap().push(id.to_string());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Status(status) => Ok(status),
            Step::Fail => Err(LookupError::Other("connection reset".to_string())),
            Step::Hang => std::future::pending().await,
            Step::Gated(gate, status) => {
                gate.notified().await;
                Ok(status)
            }
        }
    }
}

pub fn poller_config() -> PollerConfig {
    PollerConfig {
        interval_ms: INTERVAL.as_millis() as u64,
        query_timeout_ms: INTERVAL.as_millis() as u64,
        immediate_first_query: true,
        max_consecutive_failures: None,
    }
}

pub fn poller(lookup: Arc<ScriptedLookup>) -> StatusPoller {
    poller_with(lookup, poller_config())
}

pub fn poller_with(lookup: Arc<ScriptedLookup>, config: PollerConfig) -> StatusPoller {
    StatusPoller::new(lookup, config).unwrap()
}

/// Lets spawned tasks run without moving far in (paused) time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advances past the next tick and lets the poller process it.
pub async fn next_tick() {
    tokio::time::sleep(INTERVAL).await;
}
