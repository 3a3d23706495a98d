//! Bounded audit log of reconciliation actions.

use tracing::debug;

use crate::db::{Database, DbResult};
use crate::models::{AuditEntry, AUDIT_LOG_CAPACITY};

/// Audit log manager.
///
/// Writes are not atomic with the state change they describe: a crash
/// between the two can leave a transition without its entry.
pub struct AuditLog<'a> {
    db: &'a Database,
    capacity: usize,
}

impl<'a> AuditLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_capacity(db, AUDIT_LOG_CAPACITY)
    }

    pub fn with_capacity(db: &'a Database, capacity: usize) -> Self {
        Self { db, capacity }
    }

    /// Append an entry, evicting the oldest when the log is full.
    pub fn record(&self, entry: &AuditEntry) -> DbResult<()> {
        let evicted = self.db.append_audit(entry, self.capacity)?;
        if evicted > 0 {
            debug!(evicted, case_id = %entry.case_id, "Audit log evicted oldest entries");
        }
        Ok(())
    }

    /// Entries newest first.
    pub fn list(&self, limit: usize, offset: usize) -> DbResult<Vec<AuditEntry>> {
        self.db.list_audit(limit, offset)
    }

    pub fn count(&self) -> DbResult<usize> {
        self.db.audit_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
