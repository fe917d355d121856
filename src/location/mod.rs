//! Place-name resolution subsystem.
//!
//! Normalizes and deduplicates raw names, serves repeats from a TTL cache,
//! and paces the remaining lookups against the external geocoder.

pub mod batch;
pub mod cache;
pub mod normalize;
pub mod pacing;
pub mod progress;
pub mod providers;
pub mod resolver;
pub mod types;

pub use batch::{prepare, BatchRequest, PreparedBatch};
pub use cache::{CachePolicy, CacheStats, ResolutionCache};
pub use normalize::{alias_table, normalize, normalize_opt, AliasInfo};
pub use pacing::Pacer;
pub use progress::{CancelToken, ChannelProgress, NoProgress, Progress, ProgressSink};
pub use providers::{Geocoder, NominatimGeocoder};
pub use resolver::{BatchResult, PlaceResolver, ResolutionMap, ResolveReport, ResolveStats};
pub use types::{CanonicalName, Coordinate, LookupError, PlaceStatus, ResolutionEntry};
