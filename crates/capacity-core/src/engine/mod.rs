//! Reconciliation engine.
//!
//! A run signs in once, then walks each year partition:
//!
//! ```text
//! known records ──► re-check in care / other ──► terminal? ──► retire, ledger -1
//!                                                  │
//!                                                  └─► touch, update page
//! failed records ─► re-check ─► terminal? ─► retire
//!                          └─► re-read age ─► promote (ledger +1) | stay failed
//! listing pages (from highest known page) ─► new pending rows ─► admit
//! ```
//!
//! Known cases that appear on no page are reported as missing and left in
//! place. Ledger and audit writes are side effects of each transition.

mod pages;
mod report;

pub use report::*;

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::db::{Database, DbError};
use crate::ledger::CapacityLedger;
use crate::models::{
    case_year, AuditAction, AuditEntry, Bucket, FailureReason, PatientRecord, RunStatus,
    UNKNOWN_AGE,
};
use crate::resolver::{Disposition, Placement, Resolver};
use crate::source::{Credentials, ExternalSource, Row, SourceError};

use pages::{fatal_only, PageCache};

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// What the detail view said about a case's age.
enum Detail {
    Age(String),
    Absent,
    Unavailable,
}

/// Reconciliation engine over one store.
pub struct Reconciler<'a> {
    db: &'a Database,
    resolver: &'a Resolver,
    ledger: CapacityLedger<'a>,
    audit: AuditLog<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database, resolver: &'a Resolver) -> Self {
        Self {
            db,
            resolver,
            ledger: CapacityLedger::new(db),
            audit: AuditLog::new(db),
        }
    }

    /// Override the audit log bound.
    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit = AuditLog::with_capacity(self.db, capacity);
        self
    }

    /// Sign in and reconcile each year in order.
    pub fn run<S>(
        &self,
        source: &mut S,
        credentials: &Credentials,
        years: &[u16],
    ) -> EngineResult<RunReport>
    where
        S: ExternalSource + ?Sized,
    {
        source.authenticate(credentials)?;
        info!(?years, "Signed in, starting reconciliation");

        let mut report = RunReport::default();
        for &year in years {
            report.years.push(self.run_year(source, year)?);
        }
        Ok(report)
    }

    /// [`run`](Self::run), then store the outcome as the run status.
    pub fn run_and_record<S>(
        &self,
        source: &mut S,
        credentials: &Credentials,
        years: &[u16],
    ) -> EngineResult<RunReport>
    where
        S: ExternalSource + ?Sized,
    {
        match self.run(source, credentials, years) {
            Ok(report) => {
                self.db.set_run_status(&RunStatus::success())?;
                info!(
                    added = report.added(),
                    removed = report.removed(),
                    promoted = report.promoted(),
                    quarantined = report.quarantined(),
                    "Reconciliation succeeded"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Reconciliation failed");
                if let Err(status_err) = self.db.set_run_status(&RunStatus::failed(e.to_string())) {
                    error!(error = %status_err, "Could not record run status");
                }
                Err(e)
            }
        }
    }

    /// Reconcile one year partition. The source must already be signed in.
    pub fn run_year<S>(&self, source: &mut S, year: u16) -> EngineResult<YearReport>
    where
        S: ExternalSource + ?Sized,
    {
        let mut report = YearReport::new(year);

        // 1. Known state
        let in_care = self.db.bucket_records(Bucket::InCare, Some(year))?;
        let other = self.db.bucket_records(Bucket::Other, Some(year))?;
        let failed = self.db.bucket_records(Bucket::Failed, Some(year))?;

        let start_page = in_care
            .iter()
            .chain(&other)
            .chain(&failed)
            .map(|r| r.page_number)
            .max()
            .unwrap_or(1)
            .max(1);
        let mut known: HashSet<String> = in_care
            .iter()
            .chain(&other)
            .chain(&failed)
            .map(|r| r.case_id.clone())
            .collect();

        let page_count = match fatal_only(source.page_count(year))? {
            Ok(count) => count,
            Err(e) => {
                warn!(year, error = %e, "Could not read page count, assuming one page");
                1
            }
        };
        let mut pages = PageCache::new(year, page_count);
        report.pages = pages.page_count();

        // 2. Re-check in-care and other records
        let mut tracked: BTreeMap<String, Vec<(Bucket, PatientRecord)>> = BTreeMap::new();
        for (bucket, records) in [(Bucket::InCare, in_care), (Bucket::Other, other)] {
            for record in records {
                tracked
                    .entry(record.case_id.clone())
                    .or_default()
                    .push((bucket, record));
            }
        }

        let failed_ids: HashSet<&str> = failed.iter().map(|r| r.case_id.as_str()).collect();
        for (case_id, held) in &tracked {
            let hint = held.iter().map(|(_, r)| r.page_number).max().unwrap_or(1);
            match pages.locate(source, case_id, hint)? {
                None => report.missing.push(case_id.clone()),
                Some(row) if Disposition::classify(&row.disposition_text).is_terminal() => {
                    self.retire(case_id, &row)?;
                    report.removed += 1;
                }
                Some(row) => {
                    for (bucket, record) in held {
                        self.refresh(*bucket, record, &row)?;
                    }
                    if failed_ids.contains(case_id.as_str()) {
                        warn!(case_id = %case_id, "Dropping failed copy of a classified case");
                        self.db.delete_record(Bucket::Failed, case_id)?;
                    }
                    report.unchanged += 1;
                }
            }
        }

        // 3. Re-check failed records
        for record in failed {
            if tracked.contains_key(&record.case_id) {
                continue;
            }
            match pages.locate(source, &record.case_id, record.page_number)? {
                None => report.missing.push(record.case_id.clone()),
                Some(row) if Disposition::classify(&row.disposition_text).is_terminal() => {
                    self.retire(&record.case_id, &row)?;
                    report.removed += 1;
                }
                Some(row) => {
                    if self.retry_failed(source, record, &row)? {
                        report.promoted += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
            }
        }

        // 4. Discover new pending cases
        let last_page = pages.page_count();
        for page in start_page.min(last_page)..=last_page {
            let rows = pages.rows(source, page)?.to_vec();
            for row in rows {
                if Disposition::classify(&row.disposition_text) != Disposition::Pending {
                    continue;
                }
                if case_year(&row.case_id) != Some(year) {
                    warn!(year, case_id = %row.case_id, page, "Skipping row from another year");
                    continue;
                }
                if !known.insert(row.case_id.clone()) {
                    continue;
                }
                match self.admit(source, &row)? {
                    Bucket::Failed => report.quarantined += 1,
                    _ => report.added += 1,
                }
            }
        }

        // 5. Unresolved report
        report.skipped_pages = pages.failed_pages();
        for case_id in &report.missing {
            warn!(year, case_id = %case_id, "Case not found on any listing page");
        }

        info!(
            year,
            pages = report.pages,
            added = report.added,
            removed = report.removed,
            promoted = report.promoted,
            quarantined = report.quarantined,
            unchanged = report.unchanged,
            missing = report.missing.len(),
            "Year reconciled"
        );
        Ok(report)
    }

    /// Delete a terminal case from every bucket; the counter moves at most once.
    fn retire(&self, case_id: &str, row: &Row) -> EngineResult<()> {
        let mut held = Vec::new();
        for bucket in Bucket::ALL {
            if let Some(record) = self.db.get_record(bucket, case_id)? {
                held.push((bucket, record));
            }
        }

        let removed = self.db.retire_case(case_id)?;
        if removed.contains(&Bucket::InCare) {
            if let Some((_, record)) = held.iter().find(|(b, _)| *b == Bucket::InCare) {
                if let Some((species, age_stage)) = record.counter_key() {
                    self.ledger.adjust(species, age_stage, -1)?;
                }
            }
        }

        if let Some((bucket, record)) = held.into_iter().next() {
            let mut record = record;
            record.page_number = row.page_number;
            info!(
                case_id,
                from = %bucket,
                disposition = %row.disposition_text.trim(),
                "Retired case"
            );
            self.audit
                .record(&AuditEntry::for_record(&record, AuditAction::Remove, true))?;
        }
        Ok(())
    }

    fn refresh(&self, bucket: Bucket, record: &PatientRecord, row: &Row) -> EngineResult<()> {
        self.db.touch_record(bucket, &record.case_id, &Utc::now())?;
        if row.page_number != record.page_number {
            debug!(
                case_id = %record.case_id,
                from = record.page_number,
                to = row.page_number,
                "Case moved page"
            );
            self.db
                .update_page_number(bucket, &record.case_id, row.page_number)?;
        }
        Ok(())
    }

    /// Re-read a failed case's age. Returns true if it left the failed bucket.
    fn retry_failed<S>(&self, source: &mut S, record: PatientRecord, row: &Row) -> EngineResult<bool>
    where
        S: ExternalSource + ?Sized,
    {
        let mut record = record;
        record.page_number = row.page_number;
        record.touch();

        let detail = self.read_detail(source, &record.case_id)?;
        let bucket = self.classify(&mut record, &detail);

        if bucket == Bucket::Failed {
            self.db.put_record(Bucket::Failed, &record)?;
            debug!(case_id = %record.case_id, age = %record.age_raw, "Case still unresolved");
            return Ok(false);
        }

        self.db.move_record(Bucket::Failed, bucket, &record)?;
        if let (Bucket::InCare, Some((species, age_stage))) = (bucket, record.counter_key()) {
            self.ledger.adjust(species, age_stage, 1)?;
        }
        self.audit
            .record(&AuditEntry::for_record(&record, AuditAction::Add, true))?;
        info!(case_id = %record.case_id, to = %bucket, "Promoted failed case");
        Ok(true)
    }

    /// Place a newly seen pending case. Returns the bucket it went to.
    fn admit<S>(&self, source: &mut S, row: &Row) -> EngineResult<Bucket>
    where
        S: ExternalSource + ?Sized,
    {
        let mut record = PatientRecord::new(
            row.case_id.as_str(),
            row.page_number,
            row.species_text.trim(),
            UNKNOWN_AGE,
            row.admitted,
        );
        let detail = self.read_detail(source, &row.case_id)?;
        let bucket = self.classify(&mut record, &detail);

        self.db.insert_record(bucket, &record)?;
        if let (Bucket::InCare, Some((species, age_stage))) = (bucket, record.counter_key()) {
            self.ledger.adjust(species, age_stage, 1)?;
        }

        let success = bucket != Bucket::Failed;
        self.audit
            .record(&AuditEntry::for_record(&record, AuditAction::Add, success))?;

        if success {
            info!(case_id = %record.case_id, to = %bucket, species = %record.species_raw, "Admitted case");
        } else {
            warn!(
                case_id = %record.case_id,
                reason = record.reason.map(|r| r.as_str()).unwrap_or_default(),
                "Quarantined case"
            );
        }
        Ok(bucket)
    }

    fn read_detail<S>(&self, source: &mut S, case_id: &str) -> EngineResult<Detail>
    where
        S: ExternalSource + ?Sized,
    {
        Ok(match fatal_only(source.fetch_age_stage(case_id))? {
            Ok(Some(text)) if !text.trim().is_empty() => Detail::Age(text.trim().to_string()),
            Ok(_) => Detail::Absent,
            Err(e) => {
                warn!(case_id, error = %e, "Detail view unavailable");
                Detail::Unavailable
            }
        })
    }

    /// Fill in the matched fields of a record and pick its bucket.
    fn classify(&self, record: &mut PatientRecord, detail: &Detail) -> Bucket {
        let (age_text, miss) = match detail {
            Detail::Age(text) => (Some(text.as_str()), FailureReason::AgeUnmatched),
            Detail::Absent => (None, FailureReason::DetailUnavailable),
            Detail::Unavailable => {
                record.species = self
                    .resolver
                    .normalizer()
                    .match_species(&record.species_raw)
                    .map(str::to_string);
                record.age_stage = None;
                record.age_raw = UNKNOWN_AGE.to_string();
                record.reason = Some(FailureReason::DetailFetchFailed);
                return Bucket::Failed;
            }
        };

        record.age_raw = age_text.unwrap_or(UNKNOWN_AGE).to_string();
        let placement = self.resolver.place(&record.species_raw, age_text);
        let bucket = placement.bucket();
        match placement {
            Placement::InCare { species, age_stage } => {
                record.species = Some(species);
                record.age_stage = Some(age_stage);
                record.reason = None;
            }
            Placement::Other { age_stage } => {
                record.species = None;
                record.age_stage = age_stage;
                record.reason = None;
            }
            Placement::Failed { species } => {
                record.species = Some(species);
                record.age_stage = None;
                record.reason = Some(miss);
            }
        }
        bucket
    }
}
