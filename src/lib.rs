//! geoplace: place-name resolution for the EV insights dashboard.
//!
//! Turns free-text place names into coordinates through a paced, cached
//! geocoding pipeline. See [`location`] for the pipeline itself,
//! [`config`] for tunables and [`server`] for the HTTP surface.

pub mod config;
pub mod location;
pub mod server;
