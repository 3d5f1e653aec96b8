/// Parser for the FIDE ratings search fragment.
/// Endpoint: https://ratings.fide.com/incl_search_l.php?search={query}&simple=1
///
/// The fragment is an undocumented HTML table and its markup has drifted over
/// time, so the federation is pulled out with a cascade of selectors and a
/// row is only dropped when no federation can be found at all.
use crate::{CandidateMatch, Federation};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static LABELED_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td[data-label]").unwrap());
static NAME_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.found_name").unwrap());
static FLAG_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".flag-wrapper").unwrap());
static IMG_ALT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[alt]").unwrap());

static FED_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Z]{2,3})\b").unwrap());
// Last resort when neither marker is present: the flag image is served as
// /svg/{CODE}.svg.
static FLAG_SVG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/svg/([A-Z]{2,3})\.svg"#).unwrap());

const LABEL_ID: &str = "fideid";
const LABEL_NAME: &str = "name";
const LABEL_TITLE: &str = "title";
const LABEL_FED: &str = "fed";
const LABEL_RATING: &str = "rtg";
const LABEL_BIRTH_YEAR: &str = "b-year";

/// Extract candidate players from a search response, keeping only rows whose
/// federation equals `target` when one is given. Source order is preserved.
///
/// A response without a table body is "no results", not an error.
pub fn parse_search_response(html: &str, target: Option<Federation>) -> Vec<CandidateMatch> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&ROWS)
        .filter_map(|row| parse_row(row, target))
        .collect()
}

fn parse_row(row: ElementRef<'_>, target: Option<Federation>) -> Option<CandidateMatch> {
    let cells: Vec<(String, ElementRef)> = row
        .select(&LABELED_CELL)
        .filter_map(|cell| {
            let label = cell.value().attr("data-label")?.trim().to_owned();
            Some((label, cell))
        })
        .collect();

    let federation = extract_federation(row, &cells)?;
    if let Some(target) = target
        && federation != target.code()
    {
        return None;
    }

    let cell = |label: &str| {
        cells
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, cell)| element_text(*cell))
            .unwrap_or_default()
    };

    let name = row
        .select(&NAME_LINK)
        .next()
        .map(element_text)
        .unwrap_or_else(|| cell(LABEL_NAME));

    Some(CandidateMatch {
        id: digits_only(&cell(LABEL_ID)),
        name,
        title: dedupe_title(&cell(LABEL_TITLE)),
        // A row can list standard, rapid and blitz under the same label;
        // the first one is the standard rating.
        standard_rating: cell(LABEL_RATING),
        federation,
        birth_year: digits_only(&cell(LABEL_BIRTH_YEAR)),
    })
}

/// Flag-wrapper cell first, then the `Fed`-labeled cell. Inside a cell the
/// visible code wins over the flag image's alt text. Both lookups stay
/// inside the cell they matched.
fn extract_federation<'a>(
    row: ElementRef<'a>,
    cells: &[(String, ElementRef<'a>)],
) -> Option<String> {
    let fed_cells = row.select(&FLAG_WRAPPER).chain(
        cells
            .iter()
            .filter(|(label, _)| label.eq_ignore_ascii_case(LABEL_FED))
            .map(|(_, cell)| *cell),
    );

    for cell in fed_cells {
        let visible = FED_TOKEN
            .captures(&element_text(cell))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned());
        let alt = || {
            cell.select(&IMG_ALT)
                .filter_map(|img| img.value().attr("alt"))
                .map(str::trim)
                .find(|alt| FED_TOKEN.is_match(alt))
                .map(str::to_owned)
        };
        if let Some(code) = visible.or_else(alt) {
            return Some(code);
        }
    }

    FLAG_SVG
        .captures(&row.html())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Collapse repeated title tokens: "CM CM" → "CM", "WCM CM WCM" → "WCM CM".
pub fn dedupe_title(title: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for token in title.split_whitespace() {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen.join(" ")
}

fn digits_only(s: &str) -> String {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        s.to_owned()
    } else {
        String::new()
    }
}

/// Decoded text content with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
