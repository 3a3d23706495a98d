//! Signed-in WRMD session over blocking HTTP.

use std::collections::HashMap;

use capacity_core::source::{
    Credentials, ExternalSource, RetryPolicy, Row, SourceError, SourceResult,
};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::config::WrmdConfig;
use crate::parse::{self, ListingRow, ParseError, INITIAL_CARE_TAB};

const SIGNIN_PATH: &str = "signin";

/// [`ExternalSource`] backed by the WRMD web application.
///
/// Detail links are learned from listing pages, so a case's age can only
/// be read after a page containing it was fetched in this session.
pub struct WrmdSession {
    client: Client,
    base: Url,
    retry: RetryPolicy,
    signed_in: bool,
    detail_links: HashMap<String, String>,
    /// Page 1 of a year, kept from `page_count` so it is not loaded twice.
    first_page: Option<(u16, Vec<ListingRow>)>,
}

impl WrmdSession {
    pub fn new(config: &WrmdConfig, retry: RetryPolicy) -> SourceResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| SourceError::Extraction(format!("invalid base url: {}", e)))?;
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Extraction(e.to_string()))?;

        Ok(Self {
            client,
            base,
            retry,
            signed_in: false,
            detail_links: HashMap::new(),
            first_page: None,
        })
    }

    fn url(&self, path: &str) -> SourceResult<Url> {
        self.base
            .join(path)
            .map_err(|e| SourceError::Extraction(format!("invalid url {}: {}", path, e)))
    }

    fn list_url(&self, year: u16, page: u32) -> SourceResult<Url> {
        self.url(&format!("lists?change_year_to={}&page={}", year, page))
    }

    /// GET a page of an established session.
    fn get(&self, url: &Url) -> SourceResult<String> {
        if !self.signed_in {
            return Err(SourceError::Session("not signed in".into()));
        }
        self.retry.run(url.as_str(), || {
            let resp = self.client.get(url.clone()).send().map_err(map_reqwest)?;
            let landed = resp.url().clone();
            let body = read_body(resp)?;
            if landed.path().trim_end_matches('/').ends_with(SIGNIN_PATH)
                || parse::is_signin_page(&body)
            {
                return Err(SourceError::Session(format!(
                    "redirected to sign-in from {}",
                    url
                )));
            }
            Ok(body)
        })
    }

    fn load_listing(&mut self, year: u16, page: u32) -> SourceResult<(Vec<ListingRow>, String)> {
        let url = self.list_url(year, page)?;
        let body = self.get(&url)?;
        let rows = parse::parse_list_page(&body, page)?;
        for listed in &rows {
            if let Some(href) = &listed.detail_href {
                self.detail_links
                    .insert(listed.row.case_id.clone(), href.clone());
            }
        }
        Ok((rows, body))
    }
}

impl ExternalSource for WrmdSession {
    fn authenticate(&mut self, credentials: &Credentials) -> SourceResult<()> {
        let signin = self.url(SIGNIN_PATH)?;
        let form_page = self.retry.run("sign-in page", || {
            let resp = self.client.get(signin.clone()).send().map_err(map_reqwest)?;
            read_body(resp)
        })?;

        let mut form = vec![
            ("email", credentials.email.clone()),
            ("password", credentials.password.clone()),
        ];
        if let Some(token) = parse::csrf_token(&form_page) {
            form.push(("_token", token));
        }

        let resp = self
            .client
            .post(signin.clone())
            .form(&form)
            .send()
            .map_err(|e| SourceError::Authentication(e.to_string()))?;
        let landed = resp.url().clone();
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| SourceError::Authentication(e.to_string()))?;

        if !status.is_success() && !status.is_redirection() {
            return Err(SourceError::Authentication(format!("sign-in returned {}", status)));
        }
        if landed.path().trim_end_matches('/').ends_with(SIGNIN_PATH) || parse::is_signin_page(&body) {
            return Err(SourceError::Authentication(format!(
                "credentials rejected for {}",
                credentials.email
            )));
        }

        self.signed_in = true;
        self.first_page = None;
        info!(email = %credentials.email, "Signed in to WRMD");
        Ok(())
    }

    fn page_count(&mut self, year: u16) -> SourceResult<u32> {
        let (rows, body) = self.load_listing(year, 1)?;
        self.first_page = Some((year, rows));
        let count = parse::parse_page_count(&body);
        debug!(year, count, "Listing page count");
        Ok(count)
    }

    fn fetch_page(&mut self, year: u16, page: u32) -> SourceResult<Vec<Row>> {
        let cached = match self.first_page.take() {
            Some((y, rows)) if y == year && page == 1 => Some(rows),
            other => {
                self.first_page = other;
                None
            }
        };
        let rows = match cached {
            Some(rows) => rows,
            None => self.load_listing(year, page)?.0,
        };
        Ok(rows.into_iter().map(|listed| listed.row).collect())
    }

    fn fetch_age_stage(&mut self, case_id: &str) -> SourceResult<Option<String>> {
        let href = self.detail_links.get(case_id).cloned().ok_or_else(|| {
            SourceError::Extraction(format!("no detail link seen for case {}", case_id))
        })?;
        let view = self.url(&href)?;
        let body = self.get(&view)?;

        match parse::parse_age_unit(&body) {
            Err(ParseError::MissingField(_)) => {
                let tab = parse::find_link(&body, INITIAL_CARE_TAB)
                    .filter(|href| !href.starts_with('#'))
                    .ok_or_else(|| {
                        SourceError::Extraction(format!(
                            "case {}: no age field and no {} link",
                            case_id, INITIAL_CARE_TAB
                        ))
                    })?;
                let tab_url = view
                    .join(&tab)
                    .map_err(|e| SourceError::Extraction(e.to_string()))?;
                let exam = self.get(&tab_url)?;
                Ok(parse::parse_age_unit(&exam)?)
            }
            other => Ok(other?),
        }
    }
}

fn read_body(resp: reqwest::blocking::Response) -> SourceResult<String> {
    let status = resp.status();
    if let Some(err) = status_error(status) {
        return Err(err);
    }
    resp.text().map_err(map_reqwest)
}

fn status_error(status: StatusCode) -> Option<SourceError> {
    if status.is_success() || status.is_redirection() {
        return None;
    }
    let msg = format!("HTTP {}", status);
    Some(match status.as_u16() {
        401 | 419 => SourceError::Session(msg),
        429 => SourceError::Transient(msg),
        s if s >= 500 => SourceError::Transient(msg),
        _ => SourceError::Extraction(msg),
    })
}

fn map_reqwest(err: reqwest::Error) -> SourceError {
    if err.is_timeout() || err.is_connect() {
        SourceError::Transient(err.to_string())
    } else if let Some(status) = err.status() {
        status_error(status).unwrap_or_else(|| SourceError::Extraction(err.to_string()))
    } else {
        SourceError::Transient(err.to_string())
    }
}
