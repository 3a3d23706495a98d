//! Capacity ledger: in-care counts per species and age stage.
//!
//! Counts are maintained incrementally by the reconciliation engine, one
//! adjustment per state transition. They are never recomputed from the
//! buckets.

use tracing::warn;

use crate::db::{Database, DbResult, ResetSummary};
use crate::models::{AgeStage, CapacityCounter, LedgerStats, SpeciesCapacity};
use crate::resolver::Normalizer;

/// Ledger manager.
pub struct CapacityLedger<'a> {
    db: &'a Database,
}

impl<'a> CapacityLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Apply `delta` to a counter and return the new value.
    ///
    /// A result below zero is stored as zero and counted in [`LedgerStats`].
    pub fn adjust(&self, species: &str, age_stage: AgeStage, delta: i64) -> DbResult<u32> {
        let adj = self.db.adjust_counter(species, age_stage, delta)?;
        if adj.clamped {
            warn!(
                species,
                age_stage = %age_stage,
                previous = adj.previous,
                delta,
                "Counter adjustment clamped at zero"
            );
        }
        Ok(adj.value)
    }

    pub fn get(&self, species: &str, age_stage: AgeStage) -> DbResult<u32> {
        self.db.number_in_care(species, age_stage)
    }

    pub fn counters(&self) -> DbResult<Vec<CapacityCounter>> {
        self.db.list_counters()
    }

    pub fn species(&self) -> DbResult<Vec<SpeciesCapacity>> {
        self.db.list_species()
    }

    /// Create counter rows for every species the normalizer knows.
    pub fn seed_taxonomy(&self, normalizer: &Normalizer) -> DbResult<usize> {
        self.db.seed_species(normalizer.species_names())
    }

    pub fn set_capacity(
        &self,
        species: &str,
        age_stage: AgeStage,
        capacity: Option<u32>,
    ) -> DbResult<()> {
        self.db.set_capacity(species, age_stage, capacity)
    }

    pub fn set_shared_capacity(&self, species: &str, shared: Option<u32>) -> DbResult<()> {
        self.db.set_shared_capacity(species, shared)
    }

    /// Zero all counts and clear the in-care, other and audit collections.
    pub fn reset_capacity(&self) -> DbResult<ResetSummary> {
        let summary = self.db.reset_capacity()?;
        warn!(
            counters = summary.counters_zeroed,
            in_care = summary.in_care_cleared,
            other = summary.other_cleared,
            audit = summary.audit_cleared,
            "Capacity reset"
        );
        Ok(summary)
    }

    pub fn stats(&self) -> DbResult<LedgerStats> {
        self.db.ledger_stats()
    }
}
