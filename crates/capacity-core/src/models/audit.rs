//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::PatientRecord;

/// Maximum number of entries kept in the audit log.
pub const AUDIT_LOG_CAPACITY: usize = 100;

/// Reconciliation action being logged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Add,
    Remove,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Add => "add",
            AuditAction::Remove => "remove",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "add" => Some(AuditAction::Add),
            "remove" => Some(AuditAction::Remove),
            _ => None,
        }
    }
}

/// An immutable audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub entry_id: String,
    pub case_id: String,
    pub page_number: u32,
    /// Matched species, or the raw text when unmatched
    pub species: String,
    /// Matched age stage, or the raw text when unmatched
    pub age_stage: String,
    pub action: AuditAction,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry stamped now.
    pub fn new(
        case_id: impl Into<String>,
        page_number: u32,
        species: impl Into<String>,
        age_stage: impl Into<String>,
        action: AuditAction,
        success: bool,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.into(),
            page_number,
            species: species.into(),
            age_stage: age_stage.into(),
            action,
            success,
            timestamp: Utc::now(),
        }
    }

    /// Entry describing a record, preferring matched values over raw text.
    pub fn for_record(record: &PatientRecord, action: AuditAction, success: bool) -> Self {
        let species = record
            .species
            .clone()
            .unwrap_or_else(|| record.species_raw.clone());
        let age = record
            .age_stage
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| record.age_raw.clone());
        Self::new(
            record.case_id.clone(),
            record.page_number,
            species,
            age,
            action,
            success,
        )
    }

    /// Override the timestamp (imports and tests).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
