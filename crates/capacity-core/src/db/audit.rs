//! Audit log database operations.

use rusqlite::{params, Row};

use super::{timestamp_from_sql, timestamp_to_sql, Database, DbError, DbResult};
use crate::models::{AuditAction, AuditEntry};

impl Database {
    /// Append an entry, evicting the oldest entries while the log is full.
    ///
    /// Eviction and insert share one transaction. Oldest means smallest
    /// timestamp, with insertion order breaking ties.
    pub fn append_audit(&self, entry: &AuditEntry, max_size: usize) -> DbResult<usize> {
        if max_size == 0 {
            return Err(DbError::Constraint("Audit log capacity must be positive".into()));
        }

        let tx = self.write_transaction()?;
        let mut evicted = 0;
        loop {
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
            if (count as usize) < max_size {
                break;
            }
            tx.execute(
                r#"
                DELETE FROM audit_log WHERE seq = (
                    SELECT seq FROM audit_log ORDER BY timestamp ASC, seq ASC LIMIT 1
                )
                "#,
                [],
            )?;
            evicted += 1;
        }

        tx.execute(
            r#"
            INSERT INTO audit_log
                (entry_id, case_id, page_number, species, age_stage, action, success, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.entry_id,
                entry.case_id,
                entry.page_number,
                entry.species,
                entry.age_stage,
                entry.action.as_str(),
                entry.success,
                timestamp_to_sql(&entry.timestamp),
            ],
        )?;
        tx.commit()?;
        Ok(evicted)
    }

    /// Entries newest first.
    pub fn list_audit(&self, limit: usize, offset: usize) -> DbResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT entry_id, case_id, page_number, species, age_stage, action, success, timestamp
            FROM audit_log
            ORDER BY timestamp DESC, seq DESC
            LIMIT ? OFFSET ?
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], AuditRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    pub fn audit_len(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

struct AuditRow {
    entry_id: String,
    case_id: String,
    page_number: u32,
    species: String,
    age_stage: String,
    action: String,
    success: bool,
    timestamp: String,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get(0)?,
            case_id: row.get(1)?,
            page_number: row.get(2)?,
            species: row.get(3)?,
            age_stage: row.get(4)?,
            action: row.get(5)?,
            success: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::from_str(&row.action)
            .ok_or_else(|| DbError::Constraint(format!("Unknown audit action: {}", row.action)))?;

        Ok(AuditEntry {
            entry_id: row.entry_id,
            case_id: row.case_id,
            page_number: row.page_number,
            species: row.species,
            age_stage: row.age_stage,
            action,
            success: row.success,
            timestamp: timestamp_from_sql(&row.timestamp)?,
        })
    }
}
