//! Transaction-status watching for TeoCoin wallet operations.
//!
//! After a wallet transaction is submitted, the backend needs a while to see it
//! settle on chain. This crate polls the backend's status endpoint for one
//! transaction at a time and exposes the latest known status to the UI.
//!
//! # Key Components
//!
//! *   [`poller::StatusPoller`]: runs one cancellable polling cycle per
//!     transaction and reports to a [`poller::StatusSink`] until a terminal
//!     status is seen.
//! *   [`observer::StatusObserver`]: owns at most one cycle, publishes the
//!     latest [`observer::StatusSnapshot`] on a `watch` channel, and stops the
//!     cycle when restarted, stopped, or dropped.
//! *   [`lookup::StatusLookup`]: the seam to the backend, with
//!     [`lookup::HttpStatusLookup`] as the REST implementation.
pub mod config;
pub mod error;
pub mod lookup;
pub mod observer;
pub mod poller;
pub mod status;

pub use config::{load_config, BackendConfig, PollerConfig, WatcherConfig};
pub use error::{LookupError, WatchError};
pub use lookup::{HttpStatusLookup, StatusLookup};
pub use observer::{ObserverPhase, StatusObserver, StatusSnapshot};
pub use poller::{Callbacks, PollHandle, StatusPoller, StatusSink};
pub use status::{TxId, TxStatus};
