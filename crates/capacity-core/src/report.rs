//! Capacity availability for the dashboard.
//!
//! An age row either has its own capacity or, when that is unset, draws
//! from its species' shared pool. Every row drawing from the pool sees the
//! same availability: the pool minus the sum of their counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::{AgeStage, CapacityCounter, SpeciesCapacity};

/// One dashboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRow {
    pub species: String,
    pub age_stage: AgeStage,
    pub number_in_care: u32,
    /// Effective capacity; `None` when neither row nor species sets one
    pub capacity: Option<u32>,
    pub available: Option<u32>,
    /// Capacity comes from the species pool
    pub shared: bool,
}

/// Availability for every counter, in counter order.
///
/// Rows with zero capacity and nobody in care are left out.
pub fn availability(species: &[SpeciesCapacity], counters: &[CapacityCounter]) -> Vec<AvailabilityRow> {
    let pools: HashMap<&str, u32> = species
        .iter()
        .filter_map(|s| Some((s.species_slug.as_str(), s.shared_capacity?)))
        .collect();

    let mut pool_usage: HashMap<&str, u32> = HashMap::new();
    for c in counters {
        if c.capacity.is_none() && pools.contains_key(c.species_slug.as_str()) {
            *pool_usage.entry(c.species_slug.as_str()).or_default() += c.number_in_care;
        }
    }

    counters
        .iter()
        .map(|c| {
            let slug = c.species_slug.as_str();
            let (capacity, used, shared) = match (c.capacity, pools.get(slug)) {
                (Some(own), _) => (Some(own), c.number_in_care, false),
                (None, Some(&pool)) => (Some(pool), pool_usage.get(slug).copied().unwrap_or(0), true),
                (None, None) => (None, c.number_in_care, false),
            };
            AvailabilityRow {
                species: c.species.clone(),
                age_stage: c.age_stage,
                number_in_care: c.number_in_care,
                capacity,
                available: capacity.map(|cap| cap.saturating_sub(used)),
                shared,
            }
        })
        .filter(|row| !(row.capacity == Some(0) && row.number_in_care == 0))
        .collect()
}

/// Availability read from the store.
pub fn capacity_report(db: &Database) -> DbResult<Vec<AvailabilityRow>> {
    Ok(availability(&db.list_species()?, &db.list_counters()?))
}
