use crate::roster::{Enrichment, RosterRecord};
use crate::state::cache::{CacheLookup, CacheStore, cache_key};
use fide_api::{CandidateMatch, RatingLookup, resolve_federation};
use futures_util::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

/// Log progress every this many processed records.
pub const PROGRESS_INTERVAL: usize = 10;
/// Persist the cache every this many windows, on top of the final save.
pub const FLUSH_EVERY_WINDOWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Records looked up at once. Also the cap on open requests to FIDE.
    pub concurrency: usize,
    /// Pause between windows that went to the network.
    pub batch_delay: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self { concurrency: 5, batch_delay: Duration::from_millis(200) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStats {
    pub processed: usize,
    pub found: usize,
    pub cache_hits: usize,
    pub queried: usize,
    pub skipped: usize,
}

struct Query {
    index: usize,
    key: String,
    surname: String,
    first_name: String,
    country: String,
}

/// Attach FIDE title, rating and id to every record that can be matched.
///
/// Records without both a surname and a first name are left alone. The rest
/// go through in windows of `options.concurrency`: cache first, then one
/// concurrent lookup per uncached record whose country maps to a federation,
/// and the whole window is awaited
/// before the next one starts. Windows that needed the network are followed
/// by `options.batch_delay`; fully cached windows are not.
pub async fn enrich<L, C>(
    records: &mut [RosterRecord],
    lookup: &L,
    cache: &mut C,
    options: &EnrichOptions,
) -> EnrichStats
where
    L: RatingLookup,
    C: CacheStore + ?Sized,
{
    let total = records.len();
    let mut stats = EnrichStats::default();

    let mut pending = Vec::with_capacity(total);
    for (index, record) in records.iter().enumerate() {
        if record.has_name() {
            pending.push(index);
        } else {
            debug!("row {}: no surname/first name pair, skipping lookup", index + 1);
            stats.processed += 1;
            stats.skipped += 1;
        }
    }

    let window_size = options.concurrency.max(1);
    let window_count = pending.len().div_ceil(window_size);
    info!("Processing {} players ({} per batch)", pending.len(), window_size);

    for (n, window) in pending.chunks(window_size).enumerate() {
        let before = stats.processed;
        let mut queries = Vec::new();

        for &index in window {
            let record = &mut records[index];
            let key = cache_key(record.surname(), record.first_name(), record.country());
            match cache.get(&key) {
                CacheLookup::Hit(found) => {
                    debug!("{key}: served from cache");
                    stats.cache_hits += 1;
                    stats.found += 1;
                    record.enrichment = Enrichment::from(&found);
                }
                CacheLookup::KnownMiss => {
                    debug!("{key}: known miss in cache");
                    stats.cache_hits += 1;
                }
                CacheLookup::Absent if resolve_federation(record.country()).is_none() => {
                    debug!("{key}: no federation for country {:?}, not querying", record.country());
                }
                CacheLookup::Absent => queries.push(Query {
                    index,
                    key,
                    surname: record.surname().to_owned(),
                    first_name: record.first_name().to_owned(),
                    country: record.country().to_owned(),
                }),
            }
        }

        let went_to_network = !queries.is_empty();
        let results: Vec<Option<CandidateMatch>> = join_all(
            queries
                .iter()
                .map(|q| lookup.fetch_one(&q.surname, &q.first_name, &q.country)),
        )
        .await;
        stats.queried += queries.len();

        for (query, result) in queries.into_iter().zip(results) {
            match &result {
                Some(found) => {
                    stats.found += 1;
                    records[query.index].enrichment = Enrichment::from(found);
                }
                None => debug!(
                    "{}, {} ({}): not found",
                    query.surname, query.first_name, query.country
                ),
            }
            cache.put(query.key, result);
        }

        stats.processed += window.len();
        if stats.processed / PROGRESS_INTERVAL > before / PROGRESS_INTERVAL || stats.processed == total {
            info!(
                "Progress: {}/{} ({} found, {} from cache)",
                stats.processed, total, stats.found, stats.cache_hits
            );
        }

        if (n + 1) % FLUSH_EVERY_WINDOWS == 0 {
            save(cache);
        }

        let last = n + 1 == window_count;
        if went_to_network && !last && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }
    }

    save(cache);
    stats
}

fn save<C: CacheStore + ?Sized>(cache: &mut C) {
    if let Err(e) = cache.flush() {
        warn!("Could not save cache: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{RosterRecord, parse_roster};
    use crate::state::cache::{JsonFileCache, NoCache, open_cache};
    use fide_api::FideApi;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Instant;

    /// Answers from a fixed table and records how it was called.
    #[derive(Default)]
    struct StubLookup {
        answers: HashMap<String, CandidateMatch>,
        calls: RefCell<Vec<String>>,
        in_flight: Cell<usize>,
        max_in_flight: Cell<usize>,
    }

    impl StubLookup {
        fn with(mut self, surname: &str, id: &str) -> Self {
            self.answers.insert(
                surname.to_owned(),
                CandidateMatch {
                    id: id.into(),
                    name: format!("{surname}, X"),
                    standard_rating: "1400".into(),
                    federation: "AUS".into(),
                    ..Default::default()
                },
            );
            self
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl RatingLookup for StubLookup {
        async fn fetch_one(
            &self,
            surname: &str,
            _first_name: &str,
            _country: &str,
        ) -> Option<CandidateMatch> {
            self.calls.borrow_mut().push(surname.to_owned());
            self.in_flight.set(self.in_flight.get() + 1);
            self.max_in_flight.set(self.max_in_flight.get().max(self.in_flight.get()));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.set(self.in_flight.get() - 1);
            self.answers.get(surname).cloned()
        }
    }

    fn roster(rows: &[&str]) -> Vec<RosterRecord> {
        let text = format!("banner\nSurname,First Name,Country,Division\n{}\n", rows.join("\n"));
        parse_roster(&text).unwrap().records
    }

    fn players(n: usize) -> Vec<RosterRecord> {
        let rows: Vec<String> = (0..n).map(|i| format!("P{i},Sam,Australia,Open")).collect();
        roster(&rows.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn fast(concurrency: usize) -> EnrichOptions {
        EnrichOptions { concurrency, batch_delay: Duration::ZERO }
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_limit() {
        let mut records = players(11);
        let lookup = StubLookup::default();
        let stats = enrich(&mut records, &lookup, &mut NoCache, &fast(3)).await;

        assert_eq!(lookup.call_count(), 11);
        assert_eq!(lookup.max_in_flight.get(), 3);
        assert_eq!(stats.processed, 11);
        assert_eq!(stats.queried, 11);
    }

    #[tokio::test]
    async fn zero_concurrency_is_treated_as_one() {
        let mut records = players(3);
        let lookup = StubLookup::default();
        enrich(&mut records, &lookup, &mut NoCache, &fast(0)).await;
        assert_eq!(lookup.max_in_flight.get(), 1);
        assert_eq!(lookup.call_count(), 3);
    }

    #[tokio::test]
    async fn nameless_rows_are_counted_but_not_queried() {
        let mut records = roster(&["Xia,Justin,Australia,U14", ",Lonely,Fiji,U10", "Solo,,Tonga,U10"]);
        let lookup = StubLookup::default().with("Xia", "12345678");
        let stats = enrich(&mut records, &lookup, &mut NoCache, &fast(5)).await;

        assert_eq!(*lookup.calls.borrow(), vec!["Xia".to_string()]);
        assert_eq!(
            stats,
            EnrichStats { processed: 3, found: 1, cache_hits: 0, queried: 1, skipped: 2 }
        );
        assert_eq!(records[0].enrichment.federation_id, "12345678");
        assert_eq!(records[1].enrichment, Enrichment::default());
        assert_eq!(records[2].enrichment, Enrichment::default());
    }

    #[tokio::test]
    async fn writes_enrichment_onto_each_record() {
        let mut records = roster(&["Alpha,A,Australia,U8", "Beta,B,Australia,U8", "Gamma,G,Australia,U8"]);
        let lookup = StubLookup::default().with("Alpha", "1").with("Gamma", "3");
        let stats = enrich(&mut records, &lookup, &mut NoCache, &fast(2)).await;

        assert_eq!(stats.found, 2);
        assert_eq!(records[0].enrichment.federation_id, "1");
        assert_eq!(records[0].enrichment.standard_rating, "1400");
        assert_eq!(records[0].enrichment.display_name, "Alpha, X");
        assert_eq!(records[1].enrichment.federation_id, "");
        assert_eq!(records[2].enrichment.federation_id, "3");
    }

    #[tokio::test]
    async fn second_run_with_cache_makes_no_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fide-cache.json");
        let lookup = StubLookup::default().with("P0", "100").with("P3", "103");

        let mut first = players(6);
        let mut cache = open_cache(true, &path);
        let stats = enrich(&mut first, &lookup, cache.as_mut(), &fast(4)).await;
        assert_eq!(stats.queried, 6);
        assert_eq!(stats.found, 2);
        assert!(path.exists());

        let mut second = players(6);
        let mut cache = open_cache(true, &path);
        let stats = enrich(&mut second, &lookup, cache.as_mut(), &fast(4)).await;
        assert_eq!(lookup.call_count(), 6, "no new lookups for found or known-absent keys");
        assert_eq!(stats.queried, 0);
        assert_eq!(stats.cache_hits, 6);
        assert_eq!(stats.found, 2);
        assert_eq!(second[0].enrichment.federation_id, "100");
        assert_eq!(second[3].enrichment.federation_id, "103");
    }

    #[tokio::test]
    async fn disabled_cache_queries_every_run_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fide-cache.json");
        let lookup = StubLookup::default().with("P1", "101");

        for _ in 0..2 {
            let mut records = players(3);
            let mut cache = open_cache(false, &path);
            enrich(&mut records, &lookup, cache.as_mut(), &fast(2)).await;
        }

        assert_eq!(lookup.call_count(), 6);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cache_is_only_read_from_earlier_windows() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = JsonFileCache::load(&dir.path().join("c.json"));
        // The same player twice in one window: both go to the network.
        let mut records = roster(&["Twin,A,Australia,U8", "Twin,A,Australia,U8"]);
        let lookup = StubLookup::default().with("Twin", "7");
        let stats = enrich(&mut records, &lookup, &mut cache, &fast(2)).await;
        assert_eq!(stats.queried, 2);

        // In separate windows the second is a cache hit.
        let mut records = roster(&["Triplet,A,Australia,U8", "Triplet,A,Australia,U8"]);
        let lookup = StubLookup::default().with("Triplet", "8");
        let stats = enrich(&mut records, &lookup, &mut cache, &fast(1)).await;
        assert_eq!(stats.queried, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(records[1].enrichment.federation_id, "8");
    }

    #[tokio::test]
    async fn fully_cached_windows_skip_the_pause() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fide-cache.json");
        let lookup = StubLookup::default();

        let mut records = players(4);
        let mut cache = open_cache(true, &path);
        enrich(&mut records, &lookup, cache.as_mut(), &fast(1)).await;

        let slow = EnrichOptions { concurrency: 1, batch_delay: Duration::from_millis(400) };
        let mut records = players(4);
        let mut cache = open_cache(true, &path);
        let started = Instant::now();
        let stats = enrich(&mut records, &lookup, cache.as_mut(), &slow).await;

        assert_eq!(stats.cache_hits, 4);
        assert!(started.elapsed() < Duration::from_millis(400), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn network_windows_are_paced() {
        let mut records = players(3);
        let lookup = StubLookup::default();
        let slow = EnrichOptions { concurrency: 1, batch_delay: Duration::from_millis(50) };
        let started = Instant::now();
        enrich(&mut records, &lookup, &mut NoCache, &slow).await;
        // Two pauses: none after the last window.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn xia_justin_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/incl_search_l.php")
            .match_query(mockito::Matcher::UrlEncoded("search".into(), "Xia, Justin".into()))
            .with_status(200)
            .with_body(
                r#"<table><tbody><tr>
<td data-label="FIDEID">12345678</td>
<td data-label="Name"><a class="found_name" href="/profile/12345678">Xia, Justin</a></td>
<td data-label="title"></td>
<td class="flag-wrapper" data-label="Fed"><img src="/svg/AUS.svg" alt="AUS">AUS</td>
<td data-label="Rtg">1500</td>
<td data-label="B-Year">2008</td>
</tr></tbody></table>"#,
            )
            .expect(1)
            .create_async()
            .await;

        let api = FideApi::new().with_base_url(server.url());
        let mut records = roster(&["Xia,Justin,Australia,U14 Open"]);
        let stats = enrich(&mut records, &api, &mut NoCache, &EnrichOptions::default()).await;

        mock.assert_async().await;
        assert_eq!(stats.found, 1);
        let e = &records[0].enrichment;
        assert_eq!(e.federation_id, "12345678");
        assert_eq!(e.standard_rating, "1500");
        assert_eq!(e.federation_title, "");
        assert_eq!(e.display_name, "Xia, Justin");
    }

    #[tokio::test]
    async fn blank_country_never_reaches_the_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let api = FideApi::new().with_base_url(server.url());
        let mut records = roster(&["Xia,Justin,,U14 Open"]);
        let stats = enrich(&mut records, &api, &mut NoCache, &EnrichOptions::default()).await;

        mock.assert_async().await;
        assert_eq!(
            stats,
            EnrichStats { processed: 1, found: 0, cache_hits: 0, queried: 0, skipped: 0 }
        );
        assert_eq!(records[0].enrichment, Enrichment::default());
    }

    #[tokio::test]
    async fn unresolvable_countries_are_not_counted_paced_or_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = JsonFileCache::load(&dir.path().join("c.json"));
        let mut records = roster(&["A,One,,U8", "B,Two,NA,U8", "C,Three,Atlantis,U8"]);
        let lookup = StubLookup::default();
        let slow = EnrichOptions { concurrency: 1, batch_delay: Duration::from_millis(300) };

        let started = Instant::now();
        let stats = enrich(&mut records, &lookup, &mut cache, &slow).await;

        assert!(started.elapsed() < Duration::from_millis(300), "took {:?}", started.elapsed());
        assert_eq!(lookup.call_count(), 0);
        assert_eq!(stats.queried, 0);
        assert_eq!(stats.processed, 3);
        assert_eq!(cache.len(), 0);
    }

    /// Records every flush along with how many entries had been put by then.
    #[derive(Default)]
    struct CountingCache {
        puts: usize,
        flushed_at: Vec<usize>,
    }

    impl CacheStore for CountingCache {
        fn get(&self, _key: &str) -> CacheLookup {
            CacheLookup::Absent
        }

        fn put(&mut self, _key: String, _value: Option<CandidateMatch>) {
            self.puts += 1;
        }

        fn flush(&mut self) -> anyhow::Result<()> {
            self.flushed_at.push(self.puts);
            Ok(())
        }

        fn len(&self) -> usize {
            self.puts
        }
    }

    #[tokio::test]
    async fn cache_is_flushed_every_few_windows_and_at_the_end() {
        let mut records = players(9);
        let lookup = StubLookup::default();
        let mut cache = CountingCache::default();
        enrich(&mut records, &lookup, &mut cache, &fast(1)).await;

        assert_eq!(FLUSH_EVERY_WINDOWS, 4);
        assert_eq!(cache.flushed_at, vec![4, 8, 9]);
    }
}
