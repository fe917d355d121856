//! Lookup providers: the `Geocoder` seam and the Nominatim client.

use super::types::{Coordinate, LookupError};
use crate::config::{ConfigError, ResolverConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// An external forward-geocoding service.
///
/// `Ok(None)` means the service answered and had no match. Errors are
/// classified by [`LookupError::is_transient`].
pub trait Geocoder: Send + Sync {
    fn lookup(&self, query: &str) -> Result<Option<Coordinate>, LookupError>;
}

// ─── Nominatim provider ─────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
struct NominatimHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimHit {
    fn coordinate(&self) -> Result<Coordinate, LookupError> {
        let lat: f64 = self
            .lat
            .parse()
            .map_err(|_| LookupError::InvalidResponse(format!("bad latitude '{}'", self.lat)))?;
        let lon: f64 = self
            .lon
            .parse()
            .map_err(|_| LookupError::InvalidResponse(format!("bad longitude '{}'", self.lon)))?;
        let coord = Coordinate::new(lat, lon);
        if !coord.is_valid() {
            return Err(LookupError::InvalidResponse(format!("out of range: {lat}, {lon}")));
        }
        Ok(coord)
    }
}

/// Single-best-match client for OpenStreetMap Nominatim `/search`.
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(&config.endpoint, &config.user_agent, config.timeout()))
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup(&self, query: &str) -> Result<Option<Coordinate>, LookupError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("q", query)
            .query("format", "json")
            .query("limit", "1")
            .call()
            .map_err(classify_error)?;

        let hits: Vec<NominatimHit> = response
            .into_json()
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        match hits.first() {
            Some(hit) => {
                debug!(query, display_name = ?hit.display_name, "nominatim match");
                hit.coordinate().map(Some)
            }
            None => Ok(None),
        }
    }
}

fn classify_error(err: ureq::Error) -> LookupError {
    match err {
        ureq::Error::Status(code, response) => {
            LookupError::Service(format!("HTTP {} {}", code, response.status_text()))
        }
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            if transport.kind() == ureq::ErrorKind::Io && message.contains("timed out") {
                LookupError::Timeout(message)
            } else {
                LookupError::Service(message)
            }
        }
    }
}
