//! Place resolver: runs a batch through cache, pacer and geocoder.
//!
//! Per key:  Cache hit → record  |  miss → paced lookup → classify → write back
//! Batch:    prepare (normalize, dedupe, cap) → resolve → BatchResult

use super::batch::{prepare, BatchRequest};
use super::cache::ResolutionCache;
use super::normalize::normalize;
use super::pacing::Pacer;
use super::progress::{CancelToken, Progress, ProgressSink};
use super::providers::{Geocoder, NominatimGeocoder};
use super::types::{CanonicalName, Coordinate, LookupError, PlaceStatus};
use crate::config::{ConfigError, ResolverConfig};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type ResolutionMap = BTreeMap<CanonicalName, Option<Coordinate>>;

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub cache_hits: usize,
    pub lookups: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Misses left unresolved because the resolver is offline.
    pub skipped: usize,
}

/// Output of [`PlaceResolver::resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    /// Every processed key. Failures and misses map to `None`.
    pub coordinates: ResolutionMap,
    /// Keys whose lookup failed this time; not cached, retried next batch.
    pub failed: Vec<CanonicalName>,
    pub stats: ResolveStats,
    pub cancelled: bool,
}

/// What a downstream consumer gets for one [`BatchRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub coordinates: ResolutionMap,
    pub failed: Vec<CanonicalName>,
    /// Distinct canonical names in the request.
    pub distinct: usize,
    pub truncated: bool,
    /// Names cut by the ceiling, first-seen order.
    pub omitted: Vec<CanonicalName>,
    pub stats: ResolveStats,
    pub cancelled: bool,
}

impl BatchResult {
    /// Status of a raw (un-normalized) name, for merging onto records.
    pub fn status(&self, raw: &str) -> PlaceStatus {
        match self.coordinates.get(&normalize(raw)) {
            Some(Some(coordinate)) => PlaceStatus::Resolved { coordinate: *coordinate },
            Some(None) => PlaceStatus::Unresolved,
            None => PlaceStatus::NotRequested,
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.coordinates.values().filter(|c| c.is_some()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.coordinates.values().filter(|c| c.is_none()).count()
    }
}

/// The resolver. Cheap to share behind an `Arc`; clones of the pacer and
/// cache handles keep every caller on one schedule and one cache.
pub struct PlaceResolver {
    geocoder: Box<dyn Geocoder>,
    cache: Arc<ResolutionCache>,
    pacer: Pacer,
    country_context: String,
    offline: bool,
}

impl PlaceResolver {
    pub fn new(
        geocoder: Box<dyn Geocoder>,
        cache: Arc<ResolutionCache>,
        pacer: Pacer,
        country_context: impl Into<String>,
    ) -> Self {
        Self {
            geocoder,
            cache,
            pacer,
            country_context: country_context.into(),
            offline: false,
        }
    }

    /// Build the production resolver: Nominatim, file-backed or in-memory
    /// cache per `persist_cache`, pacing from the config.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        let geocoder = NominatimGeocoder::from_config(config)?;
        let cache = if config.persist_cache {
            ResolutionCache::open(config.cache_file(), config.cache_policy(), Utc::now())
        } else {
            ResolutionCache::in_memory(config.cache_policy())
        };
        let pacer = Pacer::new(config.min_delay(), config.error_backoff());
        let mut resolver = Self::new(
            Box::new(geocoder),
            Arc::new(cache),
            pacer,
            config.country_context.clone(),
        );
        resolver.set_offline(config.offline);
        Ok(resolver)
    }

    /// Offline mode: cache only, no external calls.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn country_context(&self) -> &str {
        &self.country_context
    }

    fn query_for(&self, key: &CanonicalName) -> String {
        format!("{}, {}", key, self.country_context)
    }

    /// Resolve already-canonical keys in order.
    pub fn resolve<P: ProgressSink>(
        &self,
        keys: &[CanonicalName],
        progress: &mut P,
        cancel: &CancelToken,
    ) -> ResolveReport {
        let total = keys.len();
        let mut report = ResolveReport {
            coordinates: ResolutionMap::new(),
            failed: Vec::new(),
            stats: ResolveStats::default(),
            cancelled: false,
        };
        let mut listening = true;

        for (idx, key) in keys.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(done = idx, total, "batch cancelled");
                report.cancelled = true;
                break;
            }

            let coordinate = self.resolve_one(key, &mut report);
            report.coordinates.insert(key.clone(), coordinate);

            if listening && !progress.report(Progress { done: idx + 1, total }) {
                debug!("progress sink detached");
                listening = false;
            }
        }

        if report.stats.lookups > 0 {
            if let Err(e) = self.cache.persist() {
                warn!(error = %e, "failed to persist resolution cache");
            }
        }

        info!(
            total,
            hits = report.stats.cache_hits,
            lookups = report.stats.lookups,
            found = report.stats.found,
            not_found = report.stats.not_found,
            failed = report.stats.failed,
            "batch resolved"
        );
        report
    }

    fn resolve_one(&self, key: &CanonicalName, report: &mut ResolveReport) -> Option<Coordinate> {
        if let Some(entry) = self.cache.get(key, Utc::now()) {
            debug!(%key, negative = entry.is_negative(), "cache hit");
            report.stats.cache_hits += 1;
            return entry.coordinate;
        }

        if self.offline {
            debug!(%key, "cache miss while offline");
            report.stats.skipped += 1;
            return None;
        }

        let query = self.query_for(key);
        report.stats.lookups += 1;
        match self.pacer.call(|| self.geocoder.lookup(&query)) {
            Ok(Some(coordinate)) => {
                debug!(%key, %coordinate, "resolved");
                self.cache.put(key, Some(coordinate), Utc::now());
                report.stats.found += 1;
                Some(coordinate)
            }
            Ok(None) => {
                debug!(%key, "no match");
                self.cache.put(key, None, Utc::now());
                report.stats.not_found += 1;
                None
            }
            Err(e) => {
                self.record_failure(key, &e, report);
                None
            }
        }
    }

    fn record_failure(&self, key: &CanonicalName, err: &LookupError, report: &mut ResolveReport) {
        if err.is_transient() {
            let backoff_ms = self.pacer.error_backoff().as_millis() as u64;
            warn!(%key, error = %err, backoff_ms, "transient lookup failure");
        } else {
            warn!(%key, error = %err, "lookup failed");
        }
        report.stats.failed += 1;
        report.failed.push(key.clone());
    }

    /// Prepare and resolve one caller request.
    pub fn resolve_batch<P: ProgressSink>(
        &self,
        request: &BatchRequest,
        progress: &mut P,
        cancel: &CancelToken,
    ) -> BatchResult {
        let prepared = prepare(&request.names, request.max_lookups);
        if prepared.truncated() {
            warn!(
                distinct = prepared.distinct,
                max_lookups = request.max_lookups,
                omitted = prepared.omitted.len(),
                "batch truncated to lookup ceiling"
            );
        }

        let report = self.resolve(&prepared.keys, progress, cancel);
        BatchResult {
            truncated: prepared.truncated(),
            coordinates: report.coordinates,
            failed: report.failed,
            distinct: prepared.distinct,
            omitted: prepared.omitted,
            stats: report.stats,
            cancelled: report.cancelled,
        }
    }
}
