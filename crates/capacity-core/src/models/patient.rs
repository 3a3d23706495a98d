//! Patient record models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Status carried by every record resident in the store.
pub const PENDING_STATUS: &str = "Pending";

/// Raw age recorded when the detail view could not be read.
pub const UNKNOWN_AGE: &str = "unknown";

/// Age stage taxonomy used by the capacity counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeStage {
    Infant,
    Juvenile,
    Adult,
}

impl AgeStage {
    pub const ALL: [AgeStage; 3] = [AgeStage::Infant, AgeStage::Juvenile, AgeStage::Adult];

    /// Display label, also used as the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeStage::Infant => "Infant",
            AgeStage::Juvenile => "Juvenile",
            AgeStage::Adult => "Adult",
        }
    }

    /// Counter key segment.
    pub fn slug(&self) -> &'static str {
        match self {
            AgeStage::Infant => "infant",
            AgeStage::Juvenile => "juvenile",
            AgeStage::Adult => "adult",
        }
    }

    /// Parse a stored label. Not a normalizer: only the exact labels are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Infant" => Some(AgeStage::Infant),
            "Juvenile" => Some(AgeStage::Juvenile),
            "Adult" => Some(AgeStage::Adult),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three mutually exclusive classification collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// Species and age both matched; counted by the ledger.
    InCare,
    /// Species unmatched; never counted.
    Other,
    /// Species matched but age unmatched, or detail extraction failed.
    Failed,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::InCare, Bucket::Other, Bucket::Failed];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Bucket::InCare => "patients_in_care",
            Bucket::Other => "other_patients",
            Bucket::Failed => "failed_patients",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Why a record sits in `failed_patients`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    /// Detail view read fine but the age text is outside the taxonomy.
    AgeUnmatched,
    /// Detail view loaded but had no age unit selected.
    DetailUnavailable,
    /// Detail view could not be loaded or parsed.
    DetailFetchFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::AgeUnmatched => "age_unmatched",
            FailureReason::DetailUnavailable => "detail_unavailable",
            FailureReason::DetailFetchFailed => "detail_fetch_failed",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "age_unmatched" => Some(FailureReason::AgeUnmatched),
            "detail_unavailable" => Some(FailureReason::DetailUnavailable),
            "detail_fetch_failed" => Some(FailureReason::DetailFetchFailed),
            _ => None,
        }
    }
}

/// A tracked external case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// External case number, e.g. "25-001"
    pub case_id: String,
    /// Last known page in the external listing
    pub page_number: u32,
    /// Species text as scraped
    pub species_raw: String,
    /// Matched taxonomy species
    pub species: Option<String>,
    /// Age text as scraped
    pub age_raw: String,
    /// Matched age stage
    pub age_stage: Option<AgeStage>,
    pub status: String,
    pub intake_date: NaiveDate,
    pub last_checked: DateTime<Utc>,
    /// Quarantine reason (failed bucket only)
    pub reason: Option<FailureReason>,
}

impl PatientRecord {
    /// Create a pending record checked now.
    pub fn new(
        case_id: impl Into<String>,
        page_number: u32,
        species_raw: impl Into<String>,
        age_raw: impl Into<String>,
        intake_date: NaiveDate,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            page_number,
            species_raw: species_raw.into(),
            species: None,
            age_raw: age_raw.into(),
            age_stage: None,
            status: PENDING_STATUS.to_string(),
            intake_date,
            last_checked: Utc::now(),
            reason: None,
        }
    }

    /// Counter key for an in-care record.
    pub fn counter_key(&self) -> Option<(&str, AgeStage)> {
        Some((self.species.as_deref()?, self.age_stage?))
    }

    /// Touch the last_checked timestamp.
    pub fn touch(&mut self) {
        self.last_checked = Utc::now();
    }
}

/// Year encoded by a case id's two-digit prefix ("25-001" -> 2025).
pub fn case_year(case_id: &str) -> Option<u16> {
    let (prefix, rest) = case_id.trim().split_once('-')?;
    if prefix.len() != 2 || rest.is_empty() {
        return None;
    }
    prefix.parse::<u16>().ok().map(|yy| 2000 + yy)
}

/// Case id prefix for a year (2025 -> "25-").
pub fn year_prefix(year: u16) -> String {
    format!("{:02}-", year % 100)
}
