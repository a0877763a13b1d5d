//! Process-wide cache of parsed path expressions
//!
//! Parsing is pure, so a literal path string always maps to the same
//! outcome. Entries are inserted once and never replaced or evicted; once
//! the cache is full, new paths are still parsed but no longer stored. The
//! cache never holds entry indexes or any other per-run state.

use super::error::ParseError;
use super::path::parse_path;
use crate::ast::PathExpression;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of distinct paths kept by [`PathCache::global`]
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 4096;

/// Cached parse outcome; failures are cached as well
pub type CachedParse = Result<Arc<PathExpression>, ParseError>;

static GLOBAL_PATH_CACHE: Lazy<PathCache> =
    Lazy::new(|| PathCache::new(DEFAULT_PATH_CACHE_CAPACITY));

/// Insert-once, read-many map from path string to parse outcome
#[derive(Debug)]
pub struct PathCache {
    entries: DashMap<String, CachedParse>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PathCache {
    /// Create a cache holding at most `max_size` paths
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Shared process-wide instance
    pub fn global() -> &'static PathCache {
        &GLOBAL_PATH_CACHE
    }

    /// Return the cached outcome for `path`, parsing it on first use
    pub fn get_or_parse(&self, path: &str) -> CachedParse {
        if let Some(entry) = self.entries.get(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let parsed = parse_path(path).map(Arc::new);
        if let Err(err) = &parsed {
            log::debug!("path '{path}' did not parse: {err}");
        }

        if self.entries.len() < self.max_size {
            // A concurrent insert of the same key wins; both values are equal.
            return self
                .entries
                .entry(path.to_string())
                .or_insert_with(|| parsed.clone())
                .value()
                .clone();
        }
        parsed
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_CAPACITY)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached entries
    pub size: usize,
    /// Maximum allowed cache size
    pub max_size: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to parse
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache (0.0 when unused)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Check if cache is full
    pub fn is_full(&self) -> bool {
        self.size >= self.max_size
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Path cache: {}/{} entries, {} hits, {} misses ({:.1}% hit ratio)",
            self.size,
            self.max_size,
            self.hits,
            self.misses,
            self.hit_ratio() * 100.0
        )
    }
}
