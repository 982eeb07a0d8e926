//! Transaction identifiers and the closed set of statuses reported for them.

use crate::error::{LookupError, WatchError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// The status of a tracked transaction as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// Terminal statuses end a polling cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" | "success" => Ok(TxStatus::Confirmed),
            "failed" | "error" | "reverted" => Ok(TxStatus::Failed),
            _ => Err(LookupError::UnknownStatus(s.to_string())),
        }
    }
}

/// An opaque, non-empty transaction identifier (usually a transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(Arc<str>);

impl TxId {
    /// Validates and wraps `raw`. Whitespace-only input counts as empty.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, WatchError> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            return Err(WatchError::EmptyIdentifier);
        }
        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TxId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TxId {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxId::new(s)
    }
}
