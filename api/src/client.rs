use crate::disambiguate::{DEFAULT_CUTOFF_YEAR, select};
use crate::federation::resolve_federation;
use crate::search::parse_search_response;
use crate::{CandidateMatch, Federation, RatingLookup};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const FIDE_RATINGS: &str = "https://ratings.fide.com";
const SEARCH_PATH: &str = "/incl_search_l.php";
const INDEX_PATH: &str = "/index.phtml";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (zonal-ratings roster lookup)";

/// FIDE ratings client backed by the public search fragment used by the
/// ratings site itself.
#[derive(Debug, Clone)]
pub struct FideApi {
    client: Client,
    base_url: String,
    timeout: Duration,
    cutoff_year: u16,
}

impl Default for FideApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent(BROWSER_USER_AGENT)
                .default_headers(ajax_headers(FIDE_RATINGS))
                .build()
                .unwrap_or_default(),
            base_url: FIDE_RATINGS.to_owned(),
            timeout: Duration::from_secs(10),
            cutoff_year: DEFAULT_CUTOFF_YEAR,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl FideApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        self.client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(ajax_headers(&base_url))
            .build()
            .unwrap_or_default();
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cutoff_year(mut self, cutoff_year: u16) -> Self {
        self.cutoff_year = cutoff_year;
        self
    }

    pub fn cutoff_year(&self) -> u16 {
        self.cutoff_year
    }

    /// Look up one roster entry and return the best match, if any.
    ///
    /// Never fails: an unknown country, a transport error, a non-success
    /// response and an empty result all come back as `None`, logged against
    /// the player so an operator can trace it.
    pub async fn fetch_one(
        &self,
        surname: &str,
        first_name: &str,
        country: &str,
    ) -> Option<CandidateMatch> {
        let Some(federation) = resolve_federation(country) else {
            debug!("{surname}, {first_name}: no federation for country {country:?}, not querying");
            return None;
        };

        let query = search_query(surname, first_name);
        let candidates = match self.search(&query, Some(federation)).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("{surname}, {first_name} ({country}): lookup failed: {e}");
                return None;
            }
        };

        if candidates.is_empty() {
            debug!("{surname}, {first_name} ({country}): no {federation} listing found");
            return None;
        }

        select(candidates, self.cutoff_year)
    }

    /// Run one search and return every candidate listed under `federation`
    /// (or every candidate when `None`), in the order FIDE lists them.
    pub async fn search(
        &self,
        query: &str,
        federation: Option<Federation>,
    ) -> ApiResult<Vec<CandidateMatch>> {
        let url = self.search_url(query)?;
        let html = self.get_text(url).await?;
        Ok(parse_search_response(&html, federation))
    }

    fn search_url(&self, query: &str) -> ApiResult<Url> {
        let endpoint = format!("{}{SEARCH_PATH}", self.base_url);
        Url::parse_with_params(&endpoint, &[("search", query), ("simple", "1")])
            .map_err(|e| ApiError::Other(format!("invalid search url {endpoint}: {e}")))
    }

    async fn get_text(&self, url: Url) -> ApiResult<String> {
        let url_string = url.to_string();
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url_string.clone()))?;

        match response.error_for_status() {
            Ok(res) => res
                .text()
                .await
                .map_err(|e| ApiError::Parsing(e, url_string)),
            Err(e) => Err(ApiError::Api(e, url_string)),
        }
    }
}

impl RatingLookup for FideApi {
    async fn fetch_one(
        &self,
        surname: &str,
        first_name: &str,
        country: &str,
    ) -> Option<CandidateMatch> {
        FideApi::fetch_one(self, surname, first_name, country).await
    }
}

/// FIDE's search box expects "Surname, First name".
pub fn search_query(surname: &str, first_name: &str) -> String {
    format!("{}, {}", surname.trim(), first_name.trim())
}

/// The search fragment is normally requested by the ratings page over XHR;
/// it answers more reliably when the request looks the same.
fn ajax_headers(base_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(referer) = HeaderValue::from_str(&format!("{base_url}{INDEX_PATH}")) {
        headers.insert(REFERER, referer);
    }
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers
}
