pub mod client;
pub mod disambiguate;
pub mod federation;
pub mod search;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

pub use client::{ApiError, ApiResult, FideApi};
pub use disambiguate::{DEFAULT_CUTOFF_YEAR, select};
pub use federation::{resolve_federation, resolve_flag};
pub use search::{dedupe_title, parse_search_response};

// ---------------------------------------------------------------------------
// Domain types, independent of the FIDE search markup
// ---------------------------------------------------------------------------

/// National federations this roster is drawn from. Anything else resolves to
/// "no federation" and is never queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Federation {
    Aus,
    Nzl,
    Gum,
    Nru,
    Fij,
    Ncl,
    Van,
    Tga,
    Png,
}

impl Federation {
    pub const ALL: [Federation; 9] = [
        Federation::Aus,
        Federation::Nzl,
        Federation::Gum,
        Federation::Nru,
        Federation::Fij,
        Federation::Ncl,
        Federation::Van,
        Federation::Tga,
        Federation::Png,
    ];

    /// Three-letter FIDE code as printed in the ratings database.
    pub fn code(&self) -> &'static str {
        match self {
            Federation::Aus => "AUS",
            Federation::Nzl => "NZL",
            Federation::Gum => "GUM",
            Federation::Nru => "NRU",
            Federation::Fij => "FIJ",
            Federation::Ncl => "NCL",
            Federation::Van => "VAN",
            Federation::Tga => "TGA",
            Federation::Png => "PNG",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }
}

impl fmt::Display for Federation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of a FIDE search response: a possible identity for a queried player.
///
/// Field names on the wire match the cache files written by earlier versions
/// of the roster tool, so old caches keep loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMatch {
    #[serde(rename = "fideId", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "stdRating", default)]
    pub standard_rating: String,
    #[serde(rename = "fedCode")]
    pub federation: String,
    #[serde(rename = "birthYear", default)]
    pub birth_year: String,
}

impl CandidateMatch {
    /// Birth year as a number; `None` when the source left it blank.
    pub fn birth_year(&self) -> Option<u16> {
        self.birth_year.parse().ok()
    }
}

/// Anything that can answer "who is this player on the rating list?".
///
/// `FideApi` is the live implementation; the batch driver only sees this seam.
pub trait RatingLookup {
    fn fetch_one(
        &self,
        surname: &str,
        first_name: &str,
        country: &str,
    ) -> impl Future<Output = Option<CandidateMatch>>;
}
