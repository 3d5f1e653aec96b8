//! Lookup cache between runs.
//!
//! Keyed by the lowercased `surname,first name,country` triple. A stored
//! `null` means "asked before, FIDE had nothing", so known-absent players are
//! not queried again.

use anyhow::Context;
use fide_api::CandidateMatch;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(CandidateMatch),
    KnownMiss,
    Absent,
}

/// Storage the enrichment driver reads before a window and writes after it.
/// Choose the implementation once; call sites stay the same either way.
pub trait CacheStore {
    fn get(&self, key: &str) -> CacheLookup;
    fn put(&mut self, key: String, value: Option<CandidateMatch>);
    fn flush(&mut self) -> anyhow::Result<()>;
    fn len(&self) -> usize;
}

pub fn cache_key(surname: &str, first_name: &str, country: &str) -> String {
    format!("{},{},{}", surname.trim(), first_name.trim(), country.trim()).to_lowercase()
}

/// Open the configured cache: the JSON file when enabled, otherwise a store
/// that never touches disk.
pub fn open_cache(enabled: bool, path: &Path) -> Box<dyn CacheStore> {
    if enabled {
        Box::new(JsonFileCache::load(path))
    } else {
        info!("Cache disabled");
        Box::new(NoCache)
    }
}

/// Flat JSON object persisted to a single file.
#[derive(Debug, Default)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, Option<CandidateMatch>>,
    dirty: bool,
}

impl JsonFileCache {
    /// Restore a previous run's cache. A missing or unreadable file starts an
    /// empty cache; it never stops the run.
    pub fn load(path: &Path) -> Self {
        let mut cache = Self { path: path.to_owned(), ..Default::default() };

        if !path.exists() {
            info!("Cache enabled, no cache file at {}, starting fresh", path.display());
            return cache;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read cache {}: {e}, starting fresh", path.display());
                return cache;
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => {
                cache.entries = entries;
                info!("Cache enabled: loaded {} entries from {}", cache.entries.len(), path.display());
            }
            Err(e) => warn!("Cache {} is corrupt ({e}), starting fresh", path.display()),
        }
        cache
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, key: &str) -> CacheLookup {
        match self.entries.get(key) {
            Some(Some(m)) => CacheLookup::Hit(m.clone()),
            Some(None) => CacheLookup::KnownMiss,
            None => CacheLookup::Absent,
        }
    }

    fn put(&mut self, key: String, value: Option<CandidateMatch>) {
        self.entries.insert(key, value);
        self.dirty = true;
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("could not write cache {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache used when caching is switched off: every key is absent and nothing
/// is kept or written.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheStore for NoCache {
    fn get(&self, _key: &str) -> CacheLookup {
        CacheLookup::Absent
    }

    fn put(&mut self, _key: String, _value: Option<CandidateMatch>) {}

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        0
    }
}
