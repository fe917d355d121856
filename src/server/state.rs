use crate::location::PlaceResolver;
use std::sync::Arc;

pub struct AppState {
    pub resolver: Arc<PlaceResolver>,
    /// Upper bound for `max_lookups` in any request.
    pub max_lookups: usize,
}
