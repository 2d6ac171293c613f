//! Shared domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ident::MAX_SERIAL;

/// Default exclusive upper bound for a scan.
pub const DEFAULT_SCAN_MAX: u32 = MAX_SERIAL;
/// Hard exclusive upper bound for a scan; every serial below it is formattable.
pub const SCAN_LIMIT: u32 = MAX_SERIAL + 1;

/// A title known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Vendor identifier (e.g. `NPUB31419`).
    pub code: String,
    /// Human-readable title.
    pub title: String,
    /// Lowercase title used for case-insensitive search.
    pub alias: String,
    /// When the record was first stored.
    pub created_at: DateTime<Utc>,
}

impl GameRecord {
    /// Lowercase search alias derived from a title.
    pub fn alias_for(title: &str) -> String {
        title.to_lowercase()
    }
}

/// Parameters of a single scan invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRange {
    /// Identifier type prefix, e.g. `NPUB`.
    pub kind: String,
    /// First serial probed.
    pub start: u32,
    /// Exclusive upper bound.
    pub max: u32,
}

impl ScanRange {
    /// Build a range, defaulting and clamping the upper bound.
    pub fn new(kind: impl Into<String>, start: Option<u32>, max: Option<u32>) -> Self {
        Self {
            kind: kind.into().trim().to_uppercase(),
            start: start.unwrap_or(0),
            max: max.unwrap_or(DEFAULT_SCAN_MAX).min(SCAN_LIMIT),
        }
    }

    /// Number of serials the scan will probe.
    pub fn len(&self) -> u32 {
        self.max.saturating_sub(self.start)
    }

    /// Whether the range probes nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_range_defaults_and_clamps() {
        let range = ScanRange::new(" npub ", None, None);
        assert_eq!(range.kind, "NPUB");
        assert_eq!(range.start, 0);
        assert_eq!(range.max, DEFAULT_SCAN_MAX);

        let clamped = ScanRange::new("NPUB", Some(10), Some(250_000));
        assert_eq!(clamped.max, SCAN_LIMIT);
        assert_eq!(clamped.len(), SCAN_LIMIT - 10);
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = ScanRange::new("NPUB", Some(500), Some(100));
        assert!(range.is_empty());
    }
}
