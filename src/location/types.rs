//! Core types for the location subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// A place name after normalization. The only valid cache key.
///
/// Built by [`super::normalize::normalize`]; the inner string is never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    pub(crate) fn from_normalized(name: String) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the sentinel produced from missing or blank input.
    pub fn is_unknown(&self) -> bool {
        self.0 == super::normalize::UNKNOWN
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0.0 { 'N' } else { 'S' };
        let ew = if self.lon >= 0.0 { 'E' } else { 'W' };
        write!(f, "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", self.lat.abs(), ns, self.lon.abs(), ew)
    }
}

/// One cached lookup result. `coordinate == None` is a negative entry:
/// the name was looked up and the service had no match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub name: CanonicalName,
    pub coordinate: Option<Coordinate>,
    pub resolved_at: DateTime<Utc>,
}

impl ResolutionEntry {
    pub fn is_negative(&self) -> bool {
        self.coordinate.is_none()
    }
}

/// Where a raw name ended up after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaceStatus {
    /// Looked up (now or earlier) and found.
    Resolved { coordinate: Coordinate },
    /// Looked up but no coordinate: no match, or a failure this time round.
    Unresolved,
    /// Cut by the batch ceiling, blank, or never reached before cancellation.
    NotRequested,
}

/// Failure of a single external lookup.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("lookup timed out: {0}")]
    Timeout(String),
    #[error("lookup service error: {0}")]
    Service(String),
    #[error("invalid lookup response: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    /// Transient failures are worth retrying on a later, separate batch and
    /// trigger the extended backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Service(_))
    }
}
