//! In-memory source driven by a script of pages and detail views.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use super::{Credentials, ExternalSource, RetryPolicy, Row, SourceError, SourceResult};

/// Scripted external source for tests and dry runs.
///
/// Listing pages are given per year as (case id, species, disposition)
/// triples; page numbers follow from the order pages are added. Failures
/// can be injected per page, per case, or at sign-in.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    expected: Option<Credentials>,
    login_error: Option<String>,
    signed_in: bool,
    pages: BTreeMap<u16, Vec<Vec<Row>>>,
    ages: HashMap<String, Option<String>>,
    broken_details: HashSet<String>,
    broken_pages: HashSet<(u16, u32)>,
    flaky_pages: HashMap<(u16, u32), u32>,
    session_loss: Option<(u16, u32)>,
    retry: RetryPolicy,
    page_log: Vec<(u16, u32)>,
    detail_log: Vec<String>,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            expected: None,
            login_error: None,
            signed_in: false,
            pages: BTreeMap::new(),
            ages: HashMap::new(),
            broken_details: HashSet::new(),
            broken_pages: HashSet::new(),
            flaky_pages: HashMap::new(),
            session_loss: None,
            retry: RetryPolicy::immediate(3),
            page_log: Vec::new(),
            detail_log: Vec::new(),
        }
    }

    /// Only accept these credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.expected = Some(credentials);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Append the next listing page for a year.
    pub fn with_page(mut self, year: u16, rows: &[(&str, &str, &str)]) -> Self {
        self.push_page(year, rows);
        self
    }

    /// Age unit shown on a case's detail view.
    pub fn with_age(mut self, case_id: &str, age: &str) -> Self {
        self.set_age(case_id, Some(age));
        self
    }

    pub fn push_page(&mut self, year: u16, rows: &[(&str, &str, &str)]) {
        let pages = self.pages.entry(year).or_default();
        let page_number = pages.len() as u32 + 1;
        let admitted = NaiveDate::from_ymd_opt(year as i32, 1, 1).unwrap_or_default();
        pages.push(
            rows.iter()
                .map(|(case_id, species, disposition)| {
                    Row::new(*case_id, *species, *disposition, admitted, page_number)
                })
                .collect(),
        );
    }

    /// Replace every page of a year.
    pub fn set_pages(&mut self, year: u16, pages: &[&[(&str, &str, &str)]]) {
        self.pages.remove(&year);
        for rows in pages {
            self.push_page(year, rows);
        }
    }

    /// Change a case's disposition wherever it appears. Returns false if absent.
    pub fn set_disposition(&mut self, case_id: &str, disposition: &str) -> bool {
        let mut found = false;
        for row in self.pages.values_mut().flatten().flatten() {
            if row.case_id == case_id {
                row.disposition_text = disposition.to_string();
                found = true;
            }
        }
        found
    }

    /// `None` models a detail view with no age unit selected.
    pub fn set_age(&mut self, case_id: &str, age: Option<&str>) {
        self.ages
            .insert(case_id.to_string(), age.map(str::to_string));
        self.broken_details.remove(case_id);
    }

    /// Make a case's detail view fail on every attempt.
    pub fn break_detail(&mut self, case_id: &str) {
        self.broken_details.insert(case_id.to_string());
    }

    /// Make a listing page fail on every attempt.
    pub fn break_page(&mut self, year: u16, page: u32) {
        self.broken_pages.insert((year, page));
    }

    /// Fail a listing page transiently `failures` times before it loads.
    pub fn flaky_page(&mut self, year: u16, page: u32, failures: u32) {
        self.flaky_pages.insert((year, page), failures);
    }

    pub fn reject_login(&mut self, message: &str) {
        self.login_error = Some(message.to_string());
    }

    /// Drop the session when this page is requested.
    pub fn lose_session_at(&mut self, year: u16, page: u32) {
        self.session_loss = Some((year, page));
    }

    /// Listing pages requested, in order.
    pub fn page_fetches(&self) -> &[(u16, u32)] {
        &self.page_log
    }

    /// Detail views requested, in order.
    pub fn detail_fetches(&self) -> &[String] {
        &self.detail_log
    }

    pub fn clear_log(&mut self) {
        self.page_log.clear();
        self.detail_log.clear();
    }

    fn require_session(&self) -> SourceResult<()> {
        if self.signed_in {
            Ok(())
        } else {
            Err(SourceError::Session("not signed in".into()))
        }
    }

    fn load_page(&mut self, year: u16, page: u32) -> SourceResult<Vec<Row>> {
        if self.session_loss == Some((year, page)) {
            self.signed_in = false;
            return Err(SourceError::Session(format!("signed out loading page {}", page)));
        }
        if let Some(remaining) = self.flaky_pages.get_mut(&(year, page)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SourceError::Transient(format!("page {} timed out", page)));
            }
        }
        if self.broken_pages.contains(&(year, page)) {
            return Err(SourceError::Transient(format!("page {} timed out", page)));
        }

        let rows = self
            .pages
            .get(&year)
            .and_then(|pages| pages.get(page.saturating_sub(1) as usize))
            .cloned()
            .unwrap_or_default();
        Ok(rows)
    }

    fn load_detail(&self, case_id: &str) -> SourceResult<Option<String>> {
        if self.broken_details.contains(case_id) {
            return Err(SourceError::Transient(format!("detail view for {} timed out", case_id)));
        }
        self.ages
            .get(case_id)
            .cloned()
            .ok_or_else(|| SourceError::Extraction(format!("no detail view for {}", case_id)))
    }
}

impl ExternalSource for ScriptedSource {
    fn authenticate(&mut self, credentials: &Credentials) -> SourceResult<()> {
        if let Some(message) = &self.login_error {
            return Err(SourceError::Authentication(message.clone()));
        }
        if let Some(expected) = &self.expected {
            if expected != credentials {
                return Err(SourceError::Authentication("invalid email or password".into()));
            }
        }
        self.signed_in = true;
        Ok(())
    }

    fn page_count(&mut self, year: u16) -> SourceResult<u32> {
        self.require_session()?;
        let count = self.pages.get(&year).map(|p| p.len()).unwrap_or(0);
        Ok((count as u32).max(1))
    }

    fn fetch_page(&mut self, year: u16, page: u32) -> SourceResult<Vec<Row>> {
        self.require_session()?;
        self.page_log.push((year, page));
        let retry = self.retry.clone();
        retry.run(&format!("listing page {} of {}", page, year), || {
            self.load_page(year, page)
        })
    }

    fn fetch_age_stage(&mut self, case_id: &str) -> SourceResult<Option<String>> {
        self.require_session()?;
        self.detail_log.push(case_id.to_string());
        let retry = self.retry.clone();
        retry.run(&format!("detail view of {}", case_id), || self.load_detail(case_id))
    }
}
