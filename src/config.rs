//! Resolver configuration: defaults, JSON file loading, validation.

use crate::location::cache::CachePolicy;
use crate::location::pacing::MAX_SPACING;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A configuration the resolver cannot be built from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn ttl_from_secs(field: &'static str, secs: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| invalid(field, format!("{secs} seconds is out of range")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Nominatim-compatible `/search` endpoint.
    pub endpoint: String,
    pub user_agent: String,
    /// Appended to every query as `"{name}, {country_context}"`.
    pub country_context: String,
    /// Minimum spacing between external calls. Nominatim asks for at least this.
    pub min_delay_ms: u64,
    /// Spacing after a transient failure.
    pub error_backoff_ms: u64,
    /// Per-call timeout.
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Separate window for negative entries; `None` uses `cache_ttl_secs`.
    pub negative_ttl_secs: Option<u64>,
    /// Default ceiling on distinct lookups per batch.
    pub max_lookups: usize,
    /// Backing file; `None` means `~/.geoplace/cache.json`.
    pub cache_path: Option<PathBuf>,
    pub persist_cache: bool,
    /// Serve from cache only; misses stay unresolved without a call.
    pub offline: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".into(),
            user_agent: concat!("geoplace/", env!("CARGO_PKG_VERSION"), " (place-resolver)").into(),
            country_context: "India".into(),
            min_delay_ms: 400,
            error_backoff_ms: 1000,
            timeout_secs: 10,
            cache_ttl_secs: 24 * 3600,
            negative_ttl_secs: None,
            max_lookups: 30,
            cache_path: None,
            persist_cache: true,
            offline: false,
        }
    }
}

impl ResolverConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(invalid("endpoint", format!("'{}' is not an http(s) URL", self.endpoint)));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.country_context.trim().is_empty() {
            return Err(invalid("country_context", "must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be at least 1"));
        }
        ttl_from_secs("cache_ttl_secs", self.cache_ttl_secs)?;
        if let Some(secs) = self.negative_ttl_secs {
            ttl_from_secs("negative_ttl_secs", secs)?;
        }
        let max_ms = MAX_SPACING.as_millis();
        let delays = [
            ("min_delay_ms", self.min_delay_ms),
            ("error_backoff_ms", self.error_backoff_ms),
        ];
        for (field, ms) in delays {
            if u128::from(ms) > max_ms {
                return Err(invalid(field, format!("{ms} exceeds the {max_ms} ms limit")));
            }
        }
        if self.error_backoff_ms < self.min_delay_ms {
            return Err(invalid(
                "error_backoff_ms",
                format!(
                    "{} is shorter than min_delay_ms {}",
                    self.error_backoff_ms, self.min_delay_ms
                ),
            ));
        }
        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Out-of-range TTLs saturate; `validate` rejects them first.
    pub fn cache_policy(&self) -> CachePolicy {
        let ttl = |field, secs| ttl_from_secs(field, secs).unwrap_or(chrono::Duration::MAX);
        let policy = CachePolicy::new(ttl("cache_ttl_secs", self.cache_ttl_secs));
        match self.negative_ttl_secs {
            Some(secs) => policy.with_negative_ttl(ttl("negative_ttl_secs", secs)),
            None => policy,
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(crate::location::cache::ResolutionCache::default_path)
    }
}
