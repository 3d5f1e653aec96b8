mod export;
mod roster;
mod state;

use crate::roster::load_roster;
use crate::state::cache::open_cache;
use crate::state::enrich::enrich;
use crate::state::settings::Settings;
use chrono::Local;
use fide_api::{FideApi, resolve_federation};
use log::{info, warn};

enum Command {
    Run,
    Lookup { surname: String, first_name: String, country: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(command) = handle_cli_args() else {
        return Ok(());
    };

    better_panic::install();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env()?;
    let api = FideApi::new()
        .with_timeout(settings.request_timeout)
        .with_cutoff_year(settings.cutoff_year);

    match command {
        Command::Run => run(&settings, &api).await,
        Command::Lookup { surname, first_name, country } => {
            lookup(&api, &surname, &first_name, &country).await
        }
    }
}

async fn run(settings: &Settings, api: &FideApi) -> anyhow::Result<()> {
    let (mut roster, source) = load_roster(
        settings.roster_url.as_deref(),
        &settings.roster_path,
        settings.request_timeout,
    )
    .await?;
    info!("Loaded {} participants", roster.records.len());

    let mut cache = open_cache(settings.cache_enabled, &settings.cache_path);
    let stats = enrich(&mut roster.records, api, cache.as_mut(), &settings.enrich_options()).await;
    if settings.cache_enabled {
        info!("Cache holds {} entries", cache.len());
    }

    let document = export::build_export(&roster, &source, &stats, Local::now());
    export::write_export(&settings.output_path, &document)?;

    println!("Found FIDE ratings for {} of {} players", stats.found, stats.processed - stats.skipped);
    println!(
        "  processed {}, from cache {}, looked up {}, skipped {}",
        stats.processed, stats.cache_hits, stats.queried, stats.skipped
    );
    println!("  divisions: {}", document.divisions.len());
    if source.is_stale() {
        warn!("Roster came from the local copy, not the live sheet");
        println!("  WARNING: live roster unavailable, used local copy {}", settings.roster_path.display());
    }
    println!("Wrote {}", settings.output_path.display());
    Ok(())
}

/// Single-player lookup for checking why someone did or didn't match.
async fn lookup(api: &FideApi, surname: &str, first_name: &str, country: &str) -> anyhow::Result<()> {
    let Some(federation) = resolve_federation(country) else {
        println!("No federation for country {country:?}; this player would not be looked up.");
        return Ok(());
    };
    println!("{surname}, {first_name} ({country} → {federation})");

    let query = fide_api::client::search_query(surname, first_name);
    match api.search(&query, Some(federation)).await {
        Ok(candidates) => {
            println!("{} candidate(s) listed under {federation}:", candidates.len());
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Err(e) => println!("Search failed: {e}"),
    }

    match api.fetch_one(surname, first_name, country).await {
        Some(found) => println!("Selected:\n{}", serde_json::to_string_pretty(&found)?),
        None => println!("No FIDE match"),
    }
    Ok(())
}

fn handle_cli_args() -> Option<Command> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(first) = args.first() else {
        return Some(Command::Run);
    };

    match first.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            None
        }
        "-V" | "--version" => {
            println!("zonal-ratings {}", env!("CARGO_PKG_VERSION"));
            None
        }
        "lookup" => match &args[1..] {
            [surname, first_name, country] => Some(Command::Lookup {
                surname: surname.clone(),
                first_name: first_name.clone(),
                country: country.clone(),
            }),
            _ => {
                eprintln!("lookup needs <surname> <first name> <country>\n\n{}", usage_text());
                std::process::exit(2);
            }
        },
        _ => {
            eprintln!("Unknown argument: {first}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "zonal-ratings - enrich a tournament roster with FIDE ratings

Usage:
  zonal-ratings
  zonal-ratings lookup <surname> <first name> <country>
  zonal-ratings --help
  zonal-ratings --version

Environment:
  ZONAL_ROSTER           Local roster CSV (default www/data.csv)
  ZONAL_ROSTER_URL       Live roster CSV export; falls back to ZONAL_ROSTER
  ZONAL_OUTPUT           Output JSON for the participants page (default www/participants.json)
  ZONAL_CACHE            Cache lookups between runs: true/false (default false)
  ZONAL_CACHE_FILE       Cache file (default fide-cache.json)
  ZONAL_CONCURRENCY      Lookups per batch (default 5)
  ZONAL_BATCH_DELAY_MS   Pause between batches in ms (default 200)
  ZONAL_CUTOFF_YEAR      Prefer players born in or after this year (default 2005)
  ZONAL_TIMEOUT_SECS     Per-request timeout (default 10)
  RUST_LOG               Log filter (default info)"
}
