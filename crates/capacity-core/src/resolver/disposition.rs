//! Disposition classification for external listing rows.

use serde::{Deserialize, Serialize};

/// Substrings marking a case as resolved externally.
const TERMINAL_MARKERS: &[&str] = &[
    "died",
    "euthanized",
    "released",
    "dead",
    "transferred",
    "void",
];

/// How the external system currently sees a case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Disposition {
    /// Still in care
    Pending,
    /// Died, euthanized, released, transferred or voided
    Terminal,
    /// Anything else; treated as non-terminal
    Unrecognized,
}

impl Disposition {
    /// Classify disposition text.
    pub fn classify(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower == "pending" {
            Disposition::Pending
        } else if TERMINAL_MARKERS.iter().any(|m| lower.contains(m)) {
            Disposition::Terminal
        } else {
            Disposition::Unrecognized
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Disposition::Terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending() {
        assert_eq!(Disposition::classify("Pending"), Disposition::Pending);
        assert_eq!(Disposition::classify("  pending "), Disposition::Pending);
    }

    #[test]
    fn test_terminal_substrings() {
        for text in [
            "Released",
            "Died +24hr",
            "Euthanized in 24hr",
            "Dead on arrival",
            "Transferred",
            "VOID",
        ] {
            assert!(Disposition::classify(text).is_terminal(), "{}", text);
        }
    }

    #[test]
    fn test_unrecognized_is_not_terminal() {
        let d = Disposition::classify("Pending transfer review");
        assert_eq!(d, Disposition::Unrecognized);
        assert!(!d.is_terminal());
        assert!(!Disposition::classify("").is_terminal());
    }
}
