//! Capacity counter models.

use serde::{Deserialize, Serialize};

use super::patient::AgeStage;

/// Per-(species, age stage) counter row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityCounter {
    pub species_slug: String,
    pub age_slug: String,
    /// Species display name
    pub species: String,
    pub age_stage: AgeStage,
    /// Own capacity; `None` means the row draws from the species' shared pool
    pub capacity: Option<u32>,
    pub number_in_care: u32,
}

/// Species row carrying the optional shared pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesCapacity {
    pub species_slug: String,
    pub name: String,
    pub shared_capacity: Option<u32>,
}

/// Counter key slug: lower-case, runs of other characters collapse to `-`.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out
}
