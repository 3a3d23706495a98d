//! Run summaries.

use serde::{Deserialize, Serialize};

/// What one year's reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearReport {
    pub year: u16,
    pub pages: u32,
    /// New cases placed in care or other
    pub added: usize,
    /// Cases deleted after a terminal disposition
    pub removed: usize,
    /// Failed cases reclassified into care or other
    pub promoted: usize,
    /// Cases newly placed in the failed bucket
    pub quarantined: usize,
    /// Known cases found with nothing to change
    pub unchanged: usize,
    /// Known cases found on no listing page
    pub missing: Vec<String>,
    /// Listing pages skipped after retries
    pub skipped_pages: Vec<u32>,
}

impl YearReport {
    pub fn new(year: u16) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    /// Whether the run changed any bucket.
    pub fn has_changes(&self) -> bool {
        self.added + self.removed + self.promoted + self.quarantined > 0
    }
}

/// Summary of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub years: Vec<YearReport>,
}

impl RunReport {
    pub fn year(&self, year: u16) -> Option<&YearReport> {
        self.years.iter().find(|r| r.year == year)
    }

    pub fn added(&self) -> usize {
        self.years.iter().map(|r| r.added).sum()
    }

    pub fn removed(&self) -> usize {
        self.years.iter().map(|r| r.removed).sum()
    }

    pub fn promoted(&self) -> usize {
        self.years.iter().map(|r| r.promoted).sum()
    }

    pub fn quarantined(&self) -> usize {
        self.years.iter().map(|r| r.quarantined).sum()
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.years.iter().flat_map(|r| r.missing.iter().map(String::as_str))
    }

    pub fn has_changes(&self) -> bool {
        self.years.iter().any(YearReport::has_changes)
    }
}
