//! Gateway Sync Types
//!
//! Items flowing through one discovery cycle and the cycle summary.

use serde::{Deserialize, Serialize};

/// A gateway as reported by an inventory scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub name: String,
    pub id: String,
}

impl DiscoveredItem {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
        }
    }
}

/// A deduplicated, accepted gateway ready to be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    /// Directory key, `account:region:name`
    pub key: String,
    pub id: String,
    /// Write token for this item's saves
    pub token: Option<String>,
}

/// Phase of a discovery cycle, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    Scanning,
    Deduping,
    Filtering,
    Saving,
    Done,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "idle"),
            CyclePhase::Scanning => write!(f, "scanning"),
            CyclePhase::Deduping => write!(f, "deduping"),
            CyclePhase::Filtering => write!(f, "filtering"),
            CyclePhase::Saving => write!(f, "saving"),
            CyclePhase::Done => write!(f, "done"),
        }
    }
}

/// Result of one discovery cycle across all credentials
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Credentials processed
    pub credentials: usize,
    /// Items returned by inventory scans
    pub scanned: usize,
    /// Names dropped for appearing more than once in a scan
    pub duplicates: usize,
    /// Names skipped by allow-lists
    pub filtered: usize,
    /// Items saved (or that would be saved on a dry run)
    pub saved: usize,
    /// Items abandoned after exhausting retries
    pub failed: usize,
    /// Credentials whose scan or account resolution failed
    pub scan_errors: usize,
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.scan_errors == 0
    }
}
