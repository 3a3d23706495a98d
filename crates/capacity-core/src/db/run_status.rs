//! Run status singleton.

use rusqlite::{params, OptionalExtension};

use super::{timestamp_from_sql, timestamp_to_sql, Database, DbError, DbResult};
use crate::models::{RunOutcome, RunStatus};

impl Database {
    /// Overwrite the last-run record.
    pub fn set_run_status(&self, status: &RunStatus) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO run_status (id, timestamp, status, error) VALUES (1, ?, ?, ?)",
            params![
                timestamp_to_sql(&status.timestamp),
                status.status.as_str(),
                status.error,
            ],
        )?;
        Ok(())
    }

    /// The last-run record, if any run has been recorded.
    pub fn get_run_status(&self) -> DbResult<Option<RunStatus>> {
        let row: Option<(String, String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT timestamp, status, error FROM run_status WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((timestamp, status, error)) = row else {
            return Ok(None);
        };

        let status = RunOutcome::from_str(&status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown run outcome: {}", status)))?;

        Ok(Some(RunStatus {
            timestamp: timestamp_from_sql(&timestamp)?,
            status,
            error,
        }))
    }
}
