//! Species and age-stage normalizer.
//!
//! Handles:
//! - Species matching against the capacity taxonomy (rightmost word wins)
//! - Age stage canonicalization (neonate→Infant, sub-adult→Adult)

use std::collections::{HashMap, HashSet};

use crate::models::AgeStage;

/// Species tracked on the capacity dashboard, in match priority order.
pub const DEFAULT_SPECIES: &[&str] = &[
    "Amphibian",
    "Coyote",
    "Deer",
    "Beaver",
    "Bat",
    "Rat Mouse",
    "Squirrel",
    "Chipmunk",
    "Eastern Cottontail",
    "Weasel",
    "Marten",
    "Reptile",
    "Fox",
    "Badger",
    "Fisher",
    "Skunk",
    "Raccoon",
    "Porcupine",
    "Muskrat MtBeavor Marmot",
    "River Otter",
    "Opossum",
];

/// A taxonomy entry and the words that identify it.
#[derive(Debug, Clone)]
struct SpeciesEntry {
    name: String,
    words: HashSet<String>,
}

/// Normalizer for scraped species and age text.
pub struct Normalizer {
    /// Taxonomy entries in priority order
    species: Vec<SpeciesEntry>,
    /// Age text (lowercase) → stage
    age_map: HashMap<String, AgeStage>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a normalizer with the default taxonomy.
    pub fn new() -> Self {
        let mut normalizer = Self {
            species: Vec::new(),
            age_map: Self::default_ages(),
        };
        for name in DEFAULT_SPECIES {
            normalizer.add_species(name);
        }
        normalizer
    }

    /// Match free text to a taxonomy species.
    ///
    /// Words are scanned from the end of the string toward the start; the
    /// first word belonging to any entry decides the match. Trailing words are
    /// usually the common name ("Eastern Gray Squirrel"), leading ones are
    /// qualifiers.
    pub fn match_species(&self, raw: &str) -> Option<&str> {
        let words = tokenize(raw);
        words.iter().rev().find_map(|word| {
            self.species
                .iter()
                .find(|entry| entry.words.contains(word))
                .map(|entry| entry.name.as_str())
        })
    }

    /// Map age text to a stage. Exact match only, case-insensitive.
    pub fn match_age(&self, raw: &str) -> Option<AgeStage> {
        self.age_map.get(&raw.trim().to_lowercase()).copied()
    }

    /// Taxonomy species names in priority order.
    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(|entry| entry.name.as_str())
    }

    /// Append a taxonomy entry (lowest priority).
    pub fn add_species(&mut self, name: &str) {
        let words = tokenize(name).into_iter().collect();
        self.species.push(SpeciesEntry {
            name: name.to_string(),
            words,
        });
    }

    /// Add a custom age mapping.
    pub fn add_age(&mut self, text: &str, stage: AgeStage) {
        self.age_map.insert(text.trim().to_lowercase(), stage);
    }

    /// Default age mappings.
    fn default_ages() -> HashMap<String, AgeStage> {
        let mut map = HashMap::new();

        map.insert("neonate".into(), AgeStage::Infant);
        map.insert("infant".into(), AgeStage::Infant);

        map.insert("juvenile".into(), AgeStage::Juvenile);

        map.insert("sub-adult".into(), AgeStage::Adult);
        map.insert("subadult".into(), AgeStage::Adult);
        map.insert("adult".into(), AgeStage::Adult);

        map
    }
}

/// Lowercase words with surrounding punctuation trimmed.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}
