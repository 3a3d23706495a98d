//! Capacity counter database operations.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{timestamp_from_sql, timestamp_to_sql, Database, DbError, DbResult};
use crate::models::{slugify, AgeStage, CapacityCounter, LedgerStats, SpeciesCapacity};

/// Result of one counter adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdjustment {
    pub previous: u32,
    pub value: u32,
    /// The raw result was negative and was raised to zero
    pub clamped: bool,
}

/// Rows removed or zeroed by a capacity reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub counters_zeroed: usize,
    pub in_care_cleared: usize,
    pub other_cleared: usize,
    pub audit_cleared: usize,
}

impl Database {
    /// Add `delta` to a counter, clamping the result at zero.
    ///
    /// The read and write happen under one immediate transaction, so
    /// adjustments from other connections to the same key serialize.
    pub fn adjust_counter(
        &self,
        species: &str,
        age_stage: AgeStage,
        delta: i64,
    ) -> DbResult<CounterAdjustment> {
        let tx = self.write_transaction()?;
        let species_slug = ensure_species(&tx, species)?;
        ensure_counter(&tx, &species_slug, age_stage)?;

        let current: i64 = tx.query_row(
            "SELECT number_in_care FROM capacity_counters WHERE species_slug = ? AND age_slug = ?",
            params![species_slug, age_stage.slug()],
            |row| row.get(0),
        )?;
        let raw = current.checked_add(delta).ok_or_else(|| {
            DbError::Constraint(format!("Counter overflow adding {} to {}", delta, current))
        })?;
        let value = raw.max(0);
        count_to_u32(value)?;

        tx.execute(
            r#"
            UPDATE capacity_counters
            SET number_in_care = ?3, updated_at = datetime('now')
            WHERE species_slug = ?1 AND age_slug = ?2
            "#,
            params![species_slug, age_stage.slug(), value],
        )?;

        let clamped = raw < 0;
        if clamped {
            tx.execute(
                "UPDATE ledger_stats SET clamp_events = clamp_events + 1, last_clamp_at = ? WHERE id = 1",
                [timestamp_to_sql(&Utc::now())],
            )?;
        }
        tx.commit()?;

        Ok(CounterAdjustment {
            previous: count_to_u32(current)?,
            value: count_to_u32(value)?,
            clamped,
        })
    }

    /// Get one counter.
    pub fn get_counter(&self, species: &str, age_stage: AgeStage) -> DbResult<Option<CapacityCounter>> {
        self.conn
            .query_row(
                r#"
                SELECT c.species_slug, c.age_slug, s.name, c.age_stage, c.capacity, c.number_in_care
                FROM capacity_counters c
                JOIN species s ON s.species_slug = c.species_slug
                WHERE c.species_slug = ? AND c.age_slug = ?
                "#,
                params![slugify(species), age_stage.slug()],
                CounterRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Current in-care count for a key; zero when the counter does not exist.
    pub fn number_in_care(&self, species: &str, age_stage: AgeStage) -> DbResult<u32> {
        Ok(self
            .get_counter(species, age_stage)?
            .map(|c| c.number_in_care)
            .unwrap_or(0))
    }

    /// All counters ordered by species name then age stage.
    pub fn list_counters(&self) -> DbResult<Vec<CapacityCounter>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.species_slug, c.age_slug, s.name, c.age_stage, c.capacity, c.number_in_care
            FROM capacity_counters c
            JOIN species s ON s.species_slug = c.species_slug
            ORDER BY s.name, c.age_slug
            "#,
        )?;

        let rows = stmt.query_map([], CounterRow::from_row)?;

        let mut counters = Vec::new();
        for row in rows {
            counters.push(row?.try_into()?);
        }
        Ok(counters)
    }

    /// All species rows ordered by name.
    pub fn list_species(&self) -> DbResult<Vec<SpeciesCapacity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT species_slug, name, shared_capacity FROM species ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(SpeciesCapacity {
                species_slug: row.get(0)?,
                name: row.get(1)?,
                shared_capacity: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Create species rows and their age counters. Existing rows are untouched.
    ///
    /// Returns the number of species newly created.
    pub fn seed_species<'s>(&self, names: impl IntoIterator<Item = &'s str>) -> DbResult<usize> {
        let tx = self.write_transaction()?;
        let mut created = 0;
        for name in names {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO species (species_slug, name, shared_capacity) VALUES (?, ?, 0)",
                params![slugify(name), name],
            )?;
            created += inserted;
            for stage in AgeStage::ALL {
                tx.execute(
                    r#"
                    INSERT OR IGNORE INTO capacity_counters
                        (species_slug, age_slug, age_stage, capacity, number_in_care)
                    VALUES (?, ?, ?, 0, 0)
                    "#,
                    params![slugify(name), stage.slug(), stage.as_str()],
                )?;
            }
        }
        tx.commit()?;
        Ok(created)
    }

    /// Set (or unset) the capacity of one age row.
    pub fn set_capacity(
        &self,
        species: &str,
        age_stage: AgeStage,
        capacity: Option<u32>,
    ) -> DbResult<()> {
        let tx = self.write_transaction()?;
        let species_slug = ensure_species(&tx, species)?;
        ensure_counter(&tx, &species_slug, age_stage)?;
        tx.execute(
            "UPDATE capacity_counters SET capacity = ?3, updated_at = datetime('now')
             WHERE species_slug = ?1 AND age_slug = ?2",
            params![species_slug, age_stage.slug(), capacity],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Set (or unset) the pool shared by a species' age rows without own capacity.
    pub fn set_shared_capacity(&self, species: &str, shared: Option<u32>) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            "UPDATE species SET shared_capacity = ? WHERE species_slug = ?",
            params![shared, slugify(species)],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("Species: {}", species)));
        }
        Ok(())
    }

    /// Zero every counter and clear the in-care, other and audit collections.
    ///
    /// `failed_patients` is kept so quarantined cases are retried.
    pub fn reset_capacity(&self) -> DbResult<ResetSummary> {
        let tx = self.write_transaction()?;
        let summary = ResetSummary {
            counters_zeroed: tx.execute(
                "UPDATE capacity_counters SET number_in_care = 0, updated_at = datetime('now')",
                [],
            )?,
            in_care_cleared: tx.execute("DELETE FROM patients_in_care", [])?,
            other_cleared: tx.execute("DELETE FROM other_patients", [])?,
            audit_cleared: tx.execute("DELETE FROM audit_log", [])?,
        };
        tx.commit()?;
        Ok(summary)
    }

    /// Clamp observability counters.
    pub fn ledger_stats(&self) -> DbResult<LedgerStats> {
        let (clamp_events, last_clamp_at): (i64, Option<String>) = self.conn.query_row(
            "SELECT clamp_events, last_clamp_at FROM ledger_stats WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(LedgerStats {
            clamp_events: clamp_events as u64,
            last_clamp_at: last_clamp_at.as_deref().map(timestamp_from_sql).transpose()?,
        })
    }
}

/// Create the species row if needed and return its slug.
fn ensure_species(conn: &Connection, name: &str) -> DbResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(DbError::Constraint(format!("Species name has no slug: {:?}", name)));
    }
    conn.execute(
        "INSERT OR IGNORE INTO species (species_slug, name) VALUES (?, ?)",
        params![slug, name],
    )?;
    Ok(slug)
}

fn ensure_counter(conn: &Connection, species_slug: &str, age_stage: AgeStage) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO capacity_counters (species_slug, age_slug, age_stage, number_in_care)
        VALUES (?, ?, ?, 0)
        "#,
        params![species_slug, age_stage.slug(), age_stage.as_str()],
    )?;
    Ok(())
}

fn count_to_u32(count: i64) -> DbResult<u32> {
    u32::try_from(count)
        .map_err(|_| DbError::Constraint(format!("Counter value out of range: {}", count)))
}

/// Intermediate row struct for database mapping.
struct CounterRow {
    species_slug: String,
    age_slug: String,
    species: String,
    age_stage: String,
    capacity: Option<u32>,
    number_in_care: u32,
}

impl CounterRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            species_slug: row.get(0)?,
            age_slug: row.get(1)?,
            species: row.get(2)?,
            age_stage: row.get(3)?,
            capacity: row.get(4)?,
            number_in_care: row.get(5)?,
        })
    }
}

impl TryFrom<CounterRow> for CapacityCounter {
    type Error = DbError;

    fn try_from(row: CounterRow) -> Result<Self, Self::Error> {
        let age_stage = AgeStage::from_label(&row.age_stage)
            .ok_or_else(|| DbError::Constraint(format!("Unknown age stage: {}", row.age_stage)))?;

        Ok(CapacityCounter {
            species_slug: row.species_slug,
            age_slug: row.age_slug,
            species: row.species,
            age_stage,
            capacity: row.capacity,
            number_in_care: row.number_in_care,
        })
    }
}
