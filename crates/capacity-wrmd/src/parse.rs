//! Extraction of listing rows, pagination and the age unit from WRMD pages.

use capacity_core::source::{Row, SourceError};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::html::{self, Element};

/// Listing cell positions.
const CASE_CELL: usize = 1;
const SPECIES_CELL: usize = 2;
const DISPOSITION_CELL: usize = 4;
const ADMITTED_CELL: usize = 8;

/// Form field holding the age unit on the Initial Care exam.
pub const AGE_UNIT_FIELD: &str = "exams[age_unit]";

/// Tab that hosts the exam form on the patient view.
pub const INITIAL_CARE_TAB: &str = "Initial Care";

/// Page parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Listing table not found")]
    MissingTable,

    #[error("Field not found: {0}")]
    MissingField(String),
}

impl From<ParseError> for SourceError {
    fn from(err: ParseError) -> Self {
        SourceError::Extraction(err.to_string())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A listing row plus the link to its patient view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub row: Row,
    pub detail_href: Option<String>,
}

/// Rows of a `lists` page.
///
/// Rows without a case number or with an unparseable admitted date are
/// skipped with a warning.
pub fn parse_list_page(page_html: &str, page: u32) -> ParseResult<Vec<ListingRow>> {
    let table = html::find_element(page_html, "table", |t| t.has_class("table"))
        .ok_or(ParseError::MissingTable)?;
    let body = html::next_element(table.inner, "tbody", 0)
        .map(|b| b.inner)
        .unwrap_or(table.inner);

    let mut rows = Vec::new();
    for tr in html::elements(body, "tr") {
        let cells = html::elements(tr.inner, "td");
        if cells.len() <= ADMITTED_CELL {
            warn!(page, cells = cells.len(), "Listing row has fewer cells than expected");
        }

        let text = |i: usize| cells.get(i).map(Element::text).unwrap_or_default();
        let case_id = text(CASE_CELL);
        if case_id.is_empty() {
            continue;
        }

        let admitted_text = text(ADMITTED_CELL);
        let Some(admitted) = parse_admitted(&admitted_text) else {
            warn!(page, case_id = %case_id, date = %admitted_text, "Skipping row with invalid admitted date");
            continue;
        };

        let detail_href = cells
            .get(SPECIES_CELL)
            .and_then(|cell| html::next_element(cell.inner, "a", 0))
            .and_then(|a| a.attr("href"));

        rows.push(ListingRow {
            row: Row::new(case_id, text(SPECIES_CELL), text(DISPOSITION_CELL), admitted, page),
            detail_href,
        });
    }
    Ok(rows)
}

/// `MM/DD/YYYY`
pub fn parse_admitted(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%m/%d/%Y").ok()
}

/// Highest page number linked from `ul.pagination`; 1 without pagination.
pub fn parse_page_count(page_html: &str) -> u32 {
    html::find_element(page_html, "ul", |ul| ul.has_class("pagination"))
        .map(|ul| {
            html::elements(ul.inner, "a")
                .iter()
                .filter_map(|a| a.text().parse::<u32>().ok())
                .max()
                .unwrap_or(1)
        })
        .unwrap_or(1)
        .max(1)
}

/// Selected age unit on a patient's exam form.
///
/// `Ok(None)` when the select exists with nothing (or a blank option)
/// selected. `MissingField` when the page has no such select.
pub fn parse_age_unit(page_html: &str) -> ParseResult<Option<String>> {
    let select = html::find_element(page_html, "select", |s| {
        s.attr("name").as_deref() == Some(AGE_UNIT_FIELD)
    })
    .ok_or_else(|| ParseError::MissingField(AGE_UNIT_FIELD.to_string()))?;

    let selected = html::elements(select.inner, "option")
        .into_iter()
        .find(|opt| html::has_attr(opt.open, "selected"));

    Ok(selected
        .map(|opt| opt.text())
        .filter(|label| !label.is_empty()))
}

/// Href of the first link whose text contains `label`.
pub fn find_link(page_html: &str, label: &str) -> Option<String> {
    html::find_element(page_html, "a", |a| a.text().contains(label)).and_then(|a| a.attr("href"))
}

/// Hidden CSRF token of the sign-in form, if the page has one.
pub fn csrf_token(page_html: &str) -> Option<String> {
    html::find_element(page_html, "input", |i| i.attr("name").as_deref() == Some("_token"))
        .and_then(|i| i.attr("value"))
}

/// Whether the page is the sign-in form (a redirect after session loss).
pub fn is_signin_page(page_html: &str) -> bool {
    html::find_element(page_html, "input", |i| {
        i.attr("type").as_deref() == Some("password") || i.attr("name").as_deref() == Some("password")
    })
    .is_some()
}
