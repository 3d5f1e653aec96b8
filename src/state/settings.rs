use crate::state::enrich::EnrichOptions;
use anyhow::{Context, bail};
use fide_api::DEFAULT_CUTOFF_YEAR;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub roster_path: PathBuf,
    pub roster_url: Option<String>,
    pub output_path: PathBuf,
    pub cache_enabled: bool,
    pub cache_path: PathBuf,
    pub concurrency: usize,
    pub batch_delay: Duration,
    pub cutoff_year: u16,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            roster_path: PathBuf::from("www/data.csv"),
            roster_url: None,
            output_path: PathBuf::from("www/participants.json"),
            cache_enabled: false,
            cache_path: PathBuf::from("fide-cache.json"),
            concurrency: 5,
            batch_delay: Duration::from_millis(200),
            cutoff_year: DEFAULT_CUTOFF_YEAR,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key → value source; unset or blank keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(path) = get("ZONAL_ROSTER") {
            settings.roster_path = PathBuf::from(path);
        }
        settings.roster_url = get("ZONAL_ROSTER_URL");
        if let Some(path) = get("ZONAL_OUTPUT") {
            settings.output_path = PathBuf::from(path);
        }
        if let Some(flag) = get("ZONAL_CACHE").or_else(|| get("ENABLED_CACHE")) {
            settings.cache_enabled = parse_flag(&flag).context("ZONAL_CACHE")?;
        }
        if let Some(path) = get("ZONAL_CACHE_FILE") {
            settings.cache_path = PathBuf::from(path);
        }
        if let Some(n) = get("ZONAL_CONCURRENCY") {
            settings.concurrency = parse_number(&n).context("ZONAL_CONCURRENCY")?;
            if settings.concurrency == 0 {
                bail!("ZONAL_CONCURRENCY must be at least 1");
            }
        }
        if let Some(ms) = get("ZONAL_BATCH_DELAY_MS") {
            settings.batch_delay =
                Duration::from_millis(parse_number(&ms).context("ZONAL_BATCH_DELAY_MS")?);
        }
        if let Some(year) = get("ZONAL_CUTOFF_YEAR") {
            settings.cutoff_year = parse_number(&year).context("ZONAL_CUTOFF_YEAR")?;
        }
        if let Some(secs) = get("ZONAL_TIMEOUT_SECS") {
            settings.request_timeout =
                Duration::from_secs(parse_number(&secs).context("ZONAL_TIMEOUT_SECS")?);
        }

        Ok(settings)
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions { concurrency: self.concurrency, batch_delay: self.batch_delay }
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected true or false, got {other:?}"),
    }
}

fn parse_number<T>(value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("expected a number, got {value:?}"))
}
