//! Reconciliation engine integration tests.

use capacity_core::db::Database;
use capacity_core::engine::{EngineError, Reconciler};
use capacity_core::models::{
    AgeStage, AuditAction, Bucket, FailureReason, PatientRecord, RunOutcome,
};
use capacity_core::resolver::Resolver;
use capacity_core::source::{Credentials, ScriptedSource, SourceError};
use chrono::NaiveDate;

fn creds() -> Credentials {
    Credentials::new("rehab@example.org", "secret")
}

fn intake() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
}

fn in_care(case_id: &str, species: &str, age_stage: AgeStage, page: u32) -> PatientRecord {
    let mut record = PatientRecord::new(case_id, page, species, age_stage.as_str(), intake());
    record.species = Some(species.to_string());
    record.age_stage = Some(age_stage);
    record
}

#[test]
fn test_failed_fox_promoted_to_in_care() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut failed = PatientRecord::new("25-100", 1, "Red Fox", "Kit", intake());
    failed.species = Some("Fox".into());
    failed.reason = Some(FailureReason::AgeUnmatched);
    db.insert_record(Bucket::Failed, &failed).unwrap();

    let mut source = ScriptedSource::new()
        .with_page(2025, &[("25-100", "Red Fox", "Pending")])
        .with_age("25-100", "Juvenile");

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(report.promoted(), 1);

    assert_eq!(db.buckets_containing("25-100").unwrap(), vec![Bucket::InCare]);
    assert_eq!(db.number_in_care("Fox", AgeStage::Juvenile).unwrap(), 1);

    let promoted = db.get_record(Bucket::InCare, "25-100").unwrap().unwrap();
    assert_eq!(promoted.age_raw, "Juvenile");
    assert_eq!(promoted.reason, None);

    let audit = db.list_audit(10, 0).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AuditAction::Add);
    assert!(audit[0].success);
}

#[test]
fn test_released_deer_decrements_counter() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    db.insert_record(Bucket::InCare, &in_care("25-200", "Deer", AgeStage::Adult, 1))
        .unwrap();
    db.adjust_counter("Deer", AgeStage::Adult, 1).unwrap();

    let mut source = ScriptedSource::new().with_page(2025, &[("25-200", "Mule Deer", "Released")]);

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(report.removed(), 1);
    assert!(db.buckets_containing("25-200").unwrap().is_empty());
    assert_eq!(db.number_in_care("Deer", AgeStage::Adult).unwrap(), 0);

    let audit = db.list_audit(10, 0).unwrap();
    assert_eq!(audit[0].action, AuditAction::Remove);
    assert_eq!(audit[0].species, "Deer");
}

#[test]
fn test_terminal_with_zero_counter_clamps() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    db.insert_record(Bucket::InCare, &in_care("25-201", "Deer", AgeStage::Adult, 1))
        .unwrap();

    let mut source = ScriptedSource::new().with_page(2025, &[("25-201", "Deer", "Died")]);
    engine.run(&mut source, &creds(), &[2025]).unwrap();

    assert_eq!(db.number_in_care("Deer", AgeStage::Adult).unwrap(), 0);
    assert_eq!(db.ledger_stats().unwrap().clamp_events, 1);
}

#[test]
fn test_second_run_changes_only_last_checked() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new()
        .with_page(
            2025,
            &[
                ("25-001", "Raccoon", "Pending"),
                ("25-002", "Great Horned Owl", "Pending"),
            ],
        )
        .with_page(2025, &[("25-003", "Beaver", "Pending")])
        .with_age("25-001", "Infant")
        .with_age("25-002", "Adult")
        .with_age("25-003", "Yearling");

    engine.run(&mut source, &creds(), &[2025]).unwrap();

    let snapshot = |db: &Database| {
        let mut records = Vec::new();
        for bucket in Bucket::ALL {
            for mut r in db.list_bucket(bucket).unwrap() {
                r.last_checked = chrono::DateTime::<chrono::Utc>::MIN_UTC;
                records.push((bucket, r));
            }
        }
        (records, db.list_counters().unwrap(), db.audit_len().unwrap())
    };
    let before = snapshot(&db);

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert!(!report.has_changes());
    assert_eq!(report.year(2025).unwrap().unchanged, 3);
    assert_eq!(snapshot(&db), before);
}

#[test]
fn test_case_in_two_buckets_decrements_once() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let record = in_care("25-300", "Skunk", AgeStage::Juvenile, 1);
    db.put_record(Bucket::InCare, &record).unwrap();
    db.put_record(Bucket::Other, &record).unwrap();
    db.adjust_counter("Skunk", AgeStage::Juvenile, 2).unwrap();

    let mut source = ScriptedSource::new().with_page(2025, &[("25-300", "Skunk", "Euthanized")]);
    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();

    assert_eq!(report.removed(), 1);
    assert!(db.buckets_containing("25-300").unwrap().is_empty());
    assert_eq!(db.number_in_care("Skunk", AgeStage::Juvenile).unwrap(), 1);
    assert_eq!(db.audit_len().unwrap(), 1);
}

#[test]
fn test_detail_failure_is_isolated() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new()
        .with_page(
            2025,
            &[
                ("25-401", "Porcupine", "Pending"),
                ("25-402", "Porcupine", "Pending"),
            ],
        )
        .with_age("25-401", "Adult")
        .with_age("25-402", "Adult");
    source.break_detail("25-401");

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(report.quarantined(), 1);
    assert_eq!(report.added(), 1);

    let failed = db.get_record(Bucket::Failed, "25-401").unwrap().unwrap();
    assert_eq!(failed.reason, Some(FailureReason::DetailFetchFailed));
    assert_eq!(failed.age_raw, "unknown");
    assert_eq!(db.number_in_care("Porcupine", AgeStage::Adult).unwrap(), 1);

    let entry = db
        .list_audit(10, 0)
        .unwrap()
        .into_iter()
        .find(|e| e.case_id == "25-401")
        .unwrap();
    assert!(!entry.success);

    // Next run retries and promotes once the detail view loads
    source.set_age("25-401", Some("Adult"));
    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(report.promoted(), 1);
    assert_eq!(db.number_in_care("Porcupine", AgeStage::Adult).unwrap(), 2);
}

#[test]
fn test_missing_cases_are_reported_not_deleted() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    db.insert_record(Bucket::InCare, &in_care("25-500", "Fox", AgeStage::Adult, 1))
        .unwrap();

    let mut source = ScriptedSource::new().with_page(2025, &[("25-501", "Fox", "Released")]);
    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();

    assert_eq!(report.missing().collect::<Vec<_>>(), vec!["25-500"]);
    assert_eq!(db.buckets_containing("25-500").unwrap(), vec![Bucket::InCare]);
}

#[test]
fn test_skipped_page_leaves_cases_unresolved() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    db.insert_record(Bucket::InCare, &in_care("25-600", "Badger", AgeStage::Adult, 2))
        .unwrap();

    let mut source = ScriptedSource::new()
        .with_page(2025, &[("25-601", "Badger", "Pending")])
        .with_page(2025, &[("25-600", "Badger", "Released")])
        .with_age("25-601", "Adult");
    source.break_page(2025, 2);

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    let year = report.year(2025).unwrap();
    assert_eq!(year.skipped_pages, vec![2]);
    assert_eq!(year.missing, vec!["25-600".to_string()]);
    assert_eq!(db.buckets_containing("25-600").unwrap(), vec![Bucket::InCare]);
}

#[test]
fn test_each_page_fetched_once_per_run() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    for (id, page) in [("25-701", 1), ("25-702", 2), ("25-703", 3)] {
        db.insert_record(Bucket::Other, &PatientRecord::new(id, page, "Heron", "Adult", intake()))
            .unwrap();
    }

    let mut source = ScriptedSource::new()
        .with_page(2025, &[("25-703", "Heron", "Pending")])
        .with_page(2025, &[("25-701", "Heron", "Pending")])
        .with_page(2025, &[("25-702", "Heron", "Pending"), ("25-704", "Heron", "Pending")])
        .with_age("25-704", "Adult");

    engine.run(&mut source, &creds(), &[2025]).unwrap();

    let mut fetched = source.page_fetches().to_vec();
    fetched.sort();
    fetched.dedup();
    assert_eq!(fetched.len(), source.page_fetches().len());
    assert_eq!(source.detail_fetches(), &["25-704".to_string()]);
    assert_eq!(db.buckets_containing("25-704").unwrap(), vec![Bucket::Other]);
}

#[test]
fn test_failed_login_records_failed_status() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new().with_credentials(Credentials::new("rehab@example.org", "other"));

    let result = engine.run_and_record(&mut source, &creds(), &[2025]);
    assert!(matches!(
        result,
        Err(EngineError::Source(SourceError::Authentication(_)))
    ));

    let status = db.get_run_status().unwrap().unwrap();
    assert_eq!(status.status, RunOutcome::Failed);
    assert!(status.error.unwrap().contains("Authentication"));
}

#[test]
fn test_session_loss_aborts_run() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new()
        .with_page(2025, &[("25-801", "Fox", "Pending")])
        .with_page(2025, &[("25-802", "Fox", "Pending")])
        .with_age("25-801", "Adult")
        .with_age("25-802", "Adult");
    source.lose_session_at(2025, 2);

    let result = engine.run_and_record(&mut source, &creds(), &[2025]);
    assert!(matches!(result, Err(EngineError::Source(SourceError::Session(_)))));
    assert_eq!(
        db.get_run_status().unwrap().unwrap().status,
        RunOutcome::Failed
    );
}

#[test]
fn test_successful_run_records_status() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new().with_page(2024, &[("24-001", "Bat", "Released")]);
    let report = engine
        .run_and_record(&mut source, &creds(), &[2024, 2025])
        .unwrap();

    assert_eq!(report.years.len(), 2);
    let status = db.get_run_status().unwrap().unwrap();
    assert_eq!(status.status, RunOutcome::Success);
    assert_eq!(status.error, None);
}

#[test]
fn test_audit_log_stays_bounded_through_runs() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver).with_audit_capacity(5);

    let ids: Vec<String> = (1..=8).map(|n| format!("25-{:03}", n)).collect();
    let rows: Vec<(&str, &str, &str)> = ids.iter().map(|id| (id.as_str(), "Chipmunk", "Pending")).collect();
    let mut source = ScriptedSource::new().with_page(2025, &rows);
    for id in &ids {
        source.set_age(id, Some("Adult"));
    }

    engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(db.audit_len().unwrap(), 5);
    assert_eq!(db.number_in_care("Chipmunk", AgeStage::Adult).unwrap(), 8);
}

#[test]
fn test_discovery_starts_at_highest_known_page() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    db.insert_record(Bucket::InCare, &in_care("25-902", "Coyote", AgeStage::Adult, 2))
        .unwrap();

    let mut source = ScriptedSource::new()
        .with_page(2025, &[("25-901", "Coyote", "Pending")])
        .with_page(2025, &[("25-902", "Coyote", "Pending"), ("25-903", "Coyote", "Pending")])
        .with_age("25-901", "Adult")
        .with_age("25-903", "Adult");

    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(report.added(), 1);
    assert!(db.buckets_containing("25-901").unwrap().is_empty());
    assert_eq!(db.buckets_containing("25-903").unwrap(), vec![Bucket::InCare]);
}

#[test]
fn test_rows_from_other_years_are_not_admitted() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let mut source = ScriptedSource::new()
        .with_page(
            2025,
            &[("24-900", "Red Fox", "Pending"), ("25-001", "Red Fox", "Pending")],
        )
        .with_age("24-900", "Adult")
        .with_age("25-001", "Adult");

    let first = engine.run_and_record(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(first.added(), 1);

    let second = engine.run_and_record(&mut source, &creds(), &[2025]).unwrap();
    assert_eq!(second.added(), 0);
    assert_eq!(second.year(2025).unwrap().unchanged, 1);

    assert!(db.buckets_containing("24-900").unwrap().is_empty());
    assert_eq!(db.buckets_containing("25-001").unwrap(), vec![Bucket::InCare]);
    assert_eq!(db.number_in_care("Fox", AgeStage::Adult).unwrap(), 1);
    assert_eq!(source.detail_fetches().to_vec(), vec!["25-001".to_string()]);
    assert_eq!(
        db.get_run_status().unwrap().unwrap().status,
        RunOutcome::Success
    );
}

#[test]
fn test_failed_copy_of_classified_case_is_dropped() {
    let db = Database::open_in_memory().unwrap();
    let resolver = Resolver::default();
    let engine = Reconciler::new(&db, &resolver);

    let record = in_care("25-310", "Porcupine", AgeStage::Infant, 1);
    db.put_record(Bucket::InCare, &record).unwrap();
    db.put_record(Bucket::Failed, &record).unwrap();
    db.adjust_counter("Porcupine", AgeStage::Infant, 1).unwrap();

    let mut source =
        ScriptedSource::new().with_page(2025, &[("25-310", "Porcupine", "Pending")]);
    let report = engine.run(&mut source, &creds(), &[2025]).unwrap();

    assert_eq!(report.year(2025).unwrap().unchanged, 1);
    assert_eq!(report.promoted(), 0);
    assert_eq!(db.buckets_containing("25-310").unwrap(), vec![Bucket::InCare]);
    assert_eq!(db.number_in_care("Porcupine", AgeStage::Infant).unwrap(), 1);
    assert!(source.detail_fetches().is_empty());
}
