//! Resolution of scraped rows into bucket placements.
//!
//! Pipeline: Row text → Normalization → Placement (in care / other / failed)

mod disposition;
mod normalizer;

pub use disposition::*;
pub use normalizer::*;

use serde::{Deserialize, Serialize};

use crate::models::{AgeStage, Bucket};

/// Routing decision for a pending case.
///
/// A normalization miss is not an error: it only decides the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Species and age matched; counted under this key
    InCare { species: String, age_stage: AgeStage },
    /// Species unmatched; age kept if it matched
    Other { age_stage: Option<AgeStage> },
    /// Species matched, age did not
    Failed { species: String },
}

impl Placement {
    pub fn bucket(&self) -> Bucket {
        match self {
            Placement::InCare { .. } => Bucket::InCare,
            Placement::Other { .. } => Bucket::Other,
            Placement::Failed { .. } => Bucket::Failed,
        }
    }
}

/// Resolver that turns species/age text into a placement.
pub struct Resolver {
    normalizer: Normalizer,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Normalizer::new())
    }
}

impl Resolver {
    /// Create a resolver over a normalizer.
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Classify a case from its species text and (possibly missing) age text.
    pub fn place(&self, species_raw: &str, age_raw: Option<&str>) -> Placement {
        let species = self.normalizer.match_species(species_raw);
        let age_stage = age_raw.and_then(|a| self.normalizer.match_age(a));

        match (species, age_stage) {
            (Some(species), Some(age_stage)) => Placement::InCare {
                species: species.to_string(),
                age_stage,
            },
            (Some(species), None) => Placement::Failed {
                species: species.to_string(),
            },
            (None, age_stage) => Placement::Other { age_stage },
        }
    }

    /// Get the normalizer for direct access.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}
