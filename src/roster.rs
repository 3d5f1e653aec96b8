use anyhow::{Context, bail};
use fide_api::CandidateMatch;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SURNAME: &[&str] = &["Surname"];
const FIRST_NAME: &[&str] = &["First Name", "FirstName"];
const COUNTRY: &[&str] = &["Country"];
const DIVISION: &[&str] = &["Division"];

/// One participant: the spreadsheet columns as entered, plus what the rating
/// lookup found for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRecord {
    /// `(column, value)` in header order.
    pub fields: Vec<(String, String)>,
    pub enrichment: Enrichment,
}

/// Exported as `FIDETitle`, `FIDERating`, `FIDEId` and `FIDEName`; all empty
/// when no match was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub federation_title: String,
    pub standard_rating: String,
    pub federation_id: String,
    pub display_name: String,
}

impl From<&CandidateMatch> for Enrichment {
    fn from(m: &CandidateMatch) -> Self {
        Self {
            federation_title: m.title.clone(),
            standard_rating: m.standard_rating.clone(),
            federation_id: m.id.clone(),
            display_name: m.name.clone(),
        }
    }
}

impl RosterRecord {
    /// Value of the first column matching one of `names`, exact name first,
    /// then ignoring case. Missing columns read as empty.
    pub fn get_any(&self, names: &[&str]) -> &str {
        let exact = names
            .iter()
            .find_map(|name| self.fields.iter().find(|(col, _)| col == name));
        exact
            .or_else(|| {
                names.iter().find_map(|name| {
                    self.fields
                        .iter()
                        .find(|(col, _)| col.eq_ignore_ascii_case(name))
                })
            })
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    pub fn surname(&self) -> &str {
        self.get_any(SURNAME)
    }

    pub fn first_name(&self) -> &str {
        self.get_any(FIRST_NAME)
    }

    pub fn country(&self) -> &str {
        self.get_any(COUNTRY)
    }

    pub fn division(&self) -> &str {
        self.get_any(DIVISION)
    }

    pub fn has_name(&self) -> bool {
        !self.surname().is_empty() && !self.first_name().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub header: Vec<String>,
    pub records: Vec<RosterRecord>,
}

/// Where this run's roster came from. A stale fallback is reported in the
/// summary, not just logged, since it changes how far the output can be
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RosterSource {
    Live { url: String },
    Local { path: PathBuf },
    StaleFallback { url: String, path: PathBuf, reason: String },
}

impl RosterSource {
    pub fn is_stale(&self) -> bool {
        matches!(self, RosterSource::StaleFallback { .. })
    }
}

/// Parse the spreadsheet export: the first line is a banner and is dropped,
/// the second is the header. Short rows are padded with empty cells.
pub fn parse_roster(text: &str) -> anyhow::Result<Roster> {
    let text = text.trim_start_matches('\u{feff}');
    let Some((_banner, body)) = text.split_once('\n') else {
        bail!("roster has no header line");
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .context("could not read roster header")?
        .iter()
        .map(str::to_owned)
        .collect();
    if header.iter().all(String::is_empty) {
        bail!("roster header is empty");
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("malformed roster row {}", line + 3))?;
        let fields = header
            .iter()
            .enumerate()
            .map(|(i, col)| (col.clone(), row.get(i).unwrap_or_default().to_owned()))
            .collect();
        records.push(RosterRecord { fields, enrichment: Enrichment::default() });
    }

    Ok(Roster { header, records })
}

pub fn read_roster_file(path: &Path) -> anyhow::Result<Roster> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read roster {}", path.display()))?;
    parse_roster(&text).with_context(|| format!("could not parse roster {}", path.display()))
}

/// Load the roster, preferring the live spreadsheet export when a URL is
/// configured.
///
/// Fallback chain:
/// 1) `url`: the published CSV export of the entry sheet.
/// 2) `path`: the local copy, possibly out of date.
pub async fn load_roster(
    url: Option<&str>,
    path: &Path,
    timeout: Duration,
) -> anyhow::Result<(Roster, RosterSource)> {
    let Some(url) = url else {
        let roster = read_roster_file(path)?;
        return Ok((roster, RosterSource::Local { path: path.to_owned() }));
    };

    match fetch_live_roster(url, timeout).await {
        Ok(roster) => {
            info!("Loaded live roster from {url}");
            Ok((roster, RosterSource::Live { url: url.to_owned() }))
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!("Live roster unavailable ({reason}), using local copy {}", path.display());
            let roster = read_roster_file(path)?;
            Ok((
                roster,
                RosterSource::StaleFallback { url: url.to_owned(), path: path.to_owned(), reason },
            ))
        }
    }
}

async fn fetch_live_roster(url: &str, timeout: Duration) -> anyhow::Result<Roster> {
    let text = reqwest::Client::new()
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error"))?
        .text()
        .await
        .with_context(|| format!("could not read body from {url}"))?;
    parse_roster(&text)
}
