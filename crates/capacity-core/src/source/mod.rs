//! Contract for the external case-management system.
//!
//! The engine only sees synchronous request/response calls: authenticate,
//! count the listing pages of a year, load one page, read the age unit of
//! one case. Implementations own their retry behaviour through
//! [`RetryPolicy`].

mod retry;
mod scripted;

pub use retry::*;
pub use scripted::*;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network hiccup or slow page; worth retrying.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A page or field could not be read, after any retries.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote session expired or was never established.
    #[error("Session lost: {0}")]
    Session(String),
}

impl SourceError {
    /// Errors that end the whole run rather than one case or page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Authentication(_) | SourceError::Session(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One row of the external listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Row {
    pub case_id: String,
    pub species_text: String,
    pub disposition_text: String,
    pub admitted: NaiveDate,
    /// Listing page the row was read from
    pub page_number: u32,
}

impl Row {
    pub fn new(
        case_id: impl Into<String>,
        species_text: impl Into<String>,
        disposition_text: impl Into<String>,
        admitted: NaiveDate,
        page_number: u32,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            species_text: species_text.into(),
            disposition_text: disposition_text.into(),
            admitted,
            page_number,
        }
    }
}

/// Sign-in credentials for the external system.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A paginated listing of cases plus a per-case detail view.
pub trait ExternalSource {
    /// Establish a session. Called once at the start of every run.
    fn authenticate(&mut self, credentials: &Credentials) -> SourceResult<()>;

    /// Number of listing pages for a year. At least 1.
    fn page_count(&mut self, year: u16) -> SourceResult<u32>;

    /// Rows on one listing page (1-based).
    fn fetch_page(&mut self, year: u16, page: u32) -> SourceResult<Vec<Row>>;

    /// Age unit text from the case's detail view.
    ///
    /// `Ok(None)` when the view loaded but the field was empty.
    fn fetch_age_stage(&mut self, case_id: &str) -> SourceResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(SourceError::Authentication("bad password".into()).is_fatal());
        assert!(SourceError::Session("expired".into()).is_fatal());
        assert!(!SourceError::Extraction("no table".into()).is_fatal());
        assert!(!SourceError::Transient("timeout".into()).is_fatal());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("rehab@example.org", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("rehab@example.org"));
        assert!(!shown.contains("hunter2"));
    }
}
