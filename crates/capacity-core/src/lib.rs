//! Capacity Core Library
//!
//! Reconciles wildlife patient records scraped from an external
//! case-management system with a local SQLite store, and keeps per
//! species/age capacity counts in step with every change.
//!
//! # Architecture
//!
//! ```text
//!        External listing (paginated)        Detail view (age unit)
//!                      │                              │
//!                      └──────────► Engine ◄──────────┘
//!                                     │
//!                         Normalizer: species / age
//!                                     │
//!          ┌──────────────────────────┼──────────────────────────┐
//!          ▼                          ▼                          ▼
//!   patients_in_care           other_patients             failed_patients
//!          │                                                     │
//!          ├──► Capacity ledger (+1 / -1)          retried on later runs
//!          └──► Audit log (bounded, newest 100)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite store for buckets, counters, audit log and run status
//! - [`models`]: Domain types (PatientRecord, AuditEntry, CapacityCounter, ...)
//! - [`resolver`]: Species/age normalizer and disposition classification
//! - [`ledger`]: Capacity counters with a zero clamp
//! - [`audit`]: Bounded audit log
//! - [`source`]: External source contract and retry policy
//! - [`engine`]: Reconciliation runs
//! - [`report`]: Dashboard availability

pub mod audit;
pub mod db;
pub mod engine;
pub mod ledger;
pub mod models;
pub mod report;
pub mod resolver;
pub mod source;

// Re-export commonly used types
pub use audit::AuditLog;
pub use db::{Database, DbError, DbResult};
pub use engine::{EngineError, EngineResult, Reconciler, RunReport, YearReport};
pub use ledger::CapacityLedger;
pub use models::{
    AgeStage, AuditAction, AuditEntry, Bucket, CapacityCounter, FailureReason, LedgerStats,
    PatientRecord, RunOutcome, RunStatus, SpeciesCapacity,
};
pub use resolver::{Disposition, Normalizer, Placement, Resolver};
pub use source::{Credentials, ExternalSource, RetryPolicy, Row, ScriptedSource, SourceError};
