//! Per-year cache of listing pages.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::source::{ExternalSource, Row, SourceError, SourceResult};

/// Listing pages of one year, each fetched at most once.
///
/// A page that fails after the source's retries is remembered as failed
/// and treated as empty.
pub(crate) struct PageCache {
    year: u16,
    page_count: u32,
    pages: BTreeMap<u32, Option<Vec<Row>>>,
}

impl PageCache {
    pub fn new(year: u16, page_count: u32) -> Self {
        Self {
            year,
            page_count: page_count.max(1),
            pages: BTreeMap::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Pages that could not be loaded.
    pub fn failed_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|(_, rows)| rows.is_none())
            .map(|(page, _)| *page)
            .collect()
    }

    /// Rows of a page, loading it on first use.
    ///
    /// Only fatal source errors are returned.
    pub fn rows<S>(&mut self, source: &mut S, page: u32) -> SourceResult<&[Row]>
    where
        S: ExternalSource + ?Sized,
    {
        if !self.pages.contains_key(&page) {
            let loaded = match source.fetch_page(self.year, page) {
                Ok(rows) => {
                    debug!(year = self.year, page, rows = rows.len(), "Fetched listing page");
                    Some(rows)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(year = self.year, page, error = %e, "Skipping listing page");
                    None
                }
            };
            self.pages.insert(page, loaded);
        }

        Ok(self
            .pages
            .get(&page)
            .and_then(|rows| rows.as_deref())
            .unwrap_or(&[]))
    }

    /// Find a case, trying `hint` first and then the other pages from the
    /// last page down.
    pub fn locate<S>(&mut self, source: &mut S, case_id: &str, hint: u32) -> SourceResult<Option<Row>>
    where
        S: ExternalSource + ?Sized,
    {
        let mut order = Vec::with_capacity(self.page_count as usize);
        if (1..=self.page_count).contains(&hint) {
            order.push(hint);
        }
        order.extend((1..=self.page_count).rev().filter(|&p| p != hint));

        for page in order {
            if let Some(row) = self.rows(source, page)?.iter().find(|r| r.case_id == case_id) {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("year", &self.year)
            .field("page_count", &self.page_count)
            .field("loaded", &self.pages.len())
            .finish()
    }
}

/// Lift fatal source errors out; per-item failures stay in the inner result.
pub(crate) fn fatal_only<T>(result: SourceResult<T>) -> Result<SourceResult<T>, SourceError> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Credentials, ScriptedSource};

    fn signed_in(source: ScriptedSource) -> ScriptedSource {
        let mut source = source;
        source.authenticate(&Credentials::new("a", "b")).unwrap();
        source
    }

    #[test]
    fn test_locate_uses_hint_then_descends() {
        let mut source = signed_in(
            ScriptedSource::new()
                .with_page(2025, &[("25-001", "Fox", "Pending")])
                .with_page(2025, &[("25-002", "Fox", "Pending")])
                .with_page(2025, &[("25-003", "Fox", "Pending")]),
        );
        let mut cache = PageCache::new(2025, 3);

        let row = cache.locate(&mut source, "25-001", 2).unwrap().unwrap();
        assert_eq!(row.page_number, 1);
        assert_eq!(source.page_fetches(), &[(2025, 2), (2025, 3), (2025, 1)]);

        // cached pages are not fetched again
        cache.locate(&mut source, "25-003", 1).unwrap().unwrap();
        assert_eq!(source.page_fetches().len(), 3);
    }

    #[test]
    fn test_out_of_range_hint_is_ignored() {
        let mut source = signed_in(
            ScriptedSource::new().with_page(2025, &[("25-001", "Fox", "Pending")]),
        );
        let mut cache = PageCache::new(2025, 1);

        let row = cache.locate(&mut source, "25-001", 9).unwrap();
        assert!(row.is_some());
        assert_eq!(source.page_fetches(), &[(2025, 1)]);
    }

    #[test]
    fn test_failed_page_is_skipped() {
        let mut source = signed_in(
            ScriptedSource::new()
                .with_page(2025, &[("25-001", "Fox", "Pending")])
                .with_page(2025, &[("25-002", "Fox", "Pending")]),
        );
        source.break_page(2025, 2);
        let mut cache = PageCache::new(2025, 2);

        assert!(cache.locate(&mut source, "25-002", 2).unwrap().is_none());
        assert_eq!(cache.failed_pages(), vec![2]);
    }

    #[test]
    fn test_session_loss_is_fatal() {
        let mut source = signed_in(
            ScriptedSource::new().with_page(2025, &[("25-001", "Fox", "Pending")]),
        );
        source.lose_session_at(2025, 1);
        let mut cache = PageCache::new(2025, 1);

        let result = cache.rows(&mut source, 1);
        assert!(matches!(result, Err(SourceError::Session(_))));
    }
}
