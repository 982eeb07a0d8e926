//! Tracing subscriber setup shared by services embedding the TeoCoin
//! transaction watcher.
pub mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
