//! Run status and ledger observability records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a reconciliation attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(RunOutcome::Success),
            "failed" => Some(RunOutcome::Failed),
            _ => None,
        }
    }
}

/// Singleton record of the last reconciliation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStatus {
    pub timestamp: DateTime<Utc>,
    pub status: RunOutcome,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn success() -> Self {
        Self {
            timestamp: Utc::now(),
            status: RunOutcome::Success,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: RunOutcome::Failed,
            error: Some(error.into()),
        }
    }
}

/// Counts of ledger adjustments absorbed by the zero clamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerStats {
    pub clamp_events: u64,
    pub last_clamp_at: Option<DateTime<Utc>>,
}
