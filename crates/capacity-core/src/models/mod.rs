//! Domain models for capacity reconciliation.

mod audit;
mod capacity;
mod patient;
mod run;

pub use audit::*;
pub use capacity::*;
pub use patient::*;
pub use run::*;
