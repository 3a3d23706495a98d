//! Patient bucket database operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    date_from_sql, date_to_sql, timestamp_from_sql, timestamp_to_sql, Database, DbError,
    DbResult,
};
use crate::models::{year_prefix, AgeStage, Bucket, FailureReason, PatientRecord};

const COLUMNS: &str = "case_id, page_number, species_raw, species, age_raw, age_stage, \
                       status, intake_date, last_checked, reason";

impl Database {
    /// Insert a case that is not yet resident in any bucket.
    ///
    /// Fails with `Constraint` if the case id already lives in a bucket.
    pub fn insert_record(&self, bucket: Bucket, record: &PatientRecord) -> DbResult<()> {
        let tx = self.write_transaction()?;
        if let Some(existing) = find_bucket(&tx, &record.case_id)? {
            return Err(DbError::Constraint(format!(
                "Case {} already resident in {}",
                record.case_id, existing
            )));
        }
        write_record(&tx, bucket, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace a record in one bucket, without checking the others.
    pub fn put_record(&self, bucket: Bucket, record: &PatientRecord) -> DbResult<()> {
        write_record(&self.conn, bucket, record)
    }

    /// Move a case between buckets in one transaction.
    ///
    /// `record` is written to `to` as given, and the case id is removed from
    /// `from`.
    pub fn move_record(&self, from: Bucket, to: Bucket, record: &PatientRecord) -> DbResult<()> {
        let tx = self.write_transaction()?;
        let removed = delete_from(&tx, from, &record.case_id)?;
        if !removed {
            return Err(DbError::NotFound(format!(
                "Case {} not in {}",
                record.case_id, from
            )));
        }
        write_record(&tx, to, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Get a record from a bucket.
    pub fn get_record(&self, bucket: Bucket, case_id: &str) -> DbResult<Option<PatientRecord>> {
        let sql = format!("SELECT {} FROM {} WHERE case_id = ?", COLUMNS, bucket.table());
        self.conn
            .query_row(&sql, [case_id], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Delete a record from a bucket.
    pub fn delete_record(&self, bucket: Bucket, case_id: &str) -> DbResult<bool> {
        delete_from(&self.conn, bucket, case_id)
    }

    /// Case ids in a bucket, optionally restricted to one year.
    pub fn bucket_ids(&self, bucket: Bucket, year: Option<u16>) -> DbResult<BTreeSet<String>> {
        let pattern = year_pattern(year);
        let sql = format!(
            "SELECT case_id FROM {} WHERE case_id LIKE ? ORDER BY case_id",
            bucket.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([pattern], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<BTreeSet<_>, _>>().map_err(Into::into)
    }

    /// Full records in a bucket, optionally restricted to one year.
    pub fn bucket_records(&self, bucket: Bucket, year: Option<u16>) -> DbResult<Vec<PatientRecord>> {
        let pattern = year_pattern(year);
        let sql = format!(
            "SELECT {} FROM {} WHERE case_id LIKE ? ORDER BY case_id",
            COLUMNS,
            bucket.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([pattern], PatientRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// All records in a bucket ordered by intake date (dashboard listing).
    pub fn list_bucket(&self, bucket: Bucket) -> DbResult<Vec<PatientRecord>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY intake_date, case_id",
            COLUMNS,
            bucket.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Number of records in a bucket.
    pub fn bucket_len(&self, bucket: Bucket) -> DbResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", bucket.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Every bucket currently holding the case id.
    pub fn buckets_containing(&self, case_id: &str) -> DbResult<Vec<Bucket>> {
        let mut found = Vec::new();
        for bucket in Bucket::ALL {
            if in_bucket(&self.conn, bucket, case_id)? {
                found.push(bucket);
            }
        }
        Ok(found)
    }

    /// Delete a case from every bucket in one transaction.
    ///
    /// Returns the buckets that held it.
    pub fn retire_case(&self, case_id: &str) -> DbResult<Vec<Bucket>> {
        let tx = self.write_transaction()?;
        let mut removed = Vec::new();
        for bucket in Bucket::ALL {
            if delete_from(&tx, bucket, case_id)? {
                removed.push(bucket);
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Record that a case was checked.
    pub fn touch_record(
        &self,
        bucket: Bucket,
        case_id: &str,
        checked_at: &DateTime<Utc>,
    ) -> DbResult<bool> {
        let sql = format!("UPDATE {} SET last_checked = ? WHERE case_id = ?", bucket.table());
        let rows_affected = self
            .conn
            .execute(&sql, params![timestamp_to_sql(checked_at), case_id])?;
        Ok(rows_affected > 0)
    }

    /// Remember where a case was last seen in the listing.
    pub fn update_page_number(&self, bucket: Bucket, case_id: &str, page: u32) -> DbResult<bool> {
        let sql = format!("UPDATE {} SET page_number = ? WHERE case_id = ?", bucket.table());
        let rows_affected = self.conn.execute(&sql, params![page, case_id])?;
        Ok(rows_affected > 0)
    }
}

fn year_pattern(year: Option<u16>) -> String {
    match year {
        Some(year) => format!("{}%", year_prefix(year)),
        None => "%".to_string(),
    }
}

fn write_record(conn: &Connection, bucket: Bucket, record: &PatientRecord) -> DbResult<()> {
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        bucket.table(),
        COLUMNS
    );
    conn.execute(
        &sql,
        params![
            record.case_id,
            record.page_number,
            record.species_raw,
            record.species,
            record.age_raw,
            record.age_stage.map(|a| a.as_str()),
            record.status,
            date_to_sql(&record.intake_date),
            timestamp_to_sql(&record.last_checked),
            record.reason.map(|r| r.as_str()),
        ],
    )?;
    Ok(())
}

fn delete_from(conn: &Connection, bucket: Bucket, case_id: &str) -> DbResult<bool> {
    let sql = format!("DELETE FROM {} WHERE case_id = ?", bucket.table());
    let rows_affected = conn.execute(&sql, [case_id])?;
    Ok(rows_affected > 0)
}

fn in_bucket(conn: &Connection, bucket: Bucket, case_id: &str) -> DbResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE case_id = ?", bucket.table());
    let hit: Option<i64> = conn.query_row(&sql, [case_id], |row| row.get(0)).optional()?;
    Ok(hit.is_some())
}

fn find_bucket(conn: &Connection, case_id: &str) -> DbResult<Option<Bucket>> {
    for bucket in Bucket::ALL {
        if in_bucket(conn, bucket, case_id)? {
            return Ok(Some(bucket));
        }
    }
    Ok(None)
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    case_id: String,
    page_number: u32,
    species_raw: String,
    species: Option<String>,
    age_raw: String,
    age_stage: Option<String>,
    status: String,
    intake_date: String,
    last_checked: String,
    reason: Option<String>,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            case_id: row.get(0)?,
            page_number: row.get(1)?,
            species_raw: row.get(2)?,
            species: row.get(3)?,
            age_raw: row.get(4)?,
            age_stage: row.get(5)?,
            status: row.get(6)?,
            intake_date: row.get(7)?,
            last_checked: row.get(8)?,
            reason: row.get(9)?,
        })
    }
}

impl TryFrom<PatientRow> for PatientRecord {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let age_stage = row
            .age_stage
            .as_deref()
            .map(|label| {
                AgeStage::from_label(label)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown age stage: {}", label)))
            })
            .transpose()?;
        let reason = row
            .reason
            .as_deref()
            .map(|tag| {
                FailureReason::from_tag(tag)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown failure reason: {}", tag)))
            })
            .transpose()?;

        Ok(PatientRecord {
            case_id: row.case_id,
            page_number: row.page_number,
            species_raw: row.species_raw,
            species: row.species,
            age_raw: row.age_raw,
            age_stage,
            status: row.status,
            intake_date: date_from_sql(&row.intake_date)?,
            last_checked: timestamp_from_sql(&row.last_checked)?,
            reason,
        })
    }
}
