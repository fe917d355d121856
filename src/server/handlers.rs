use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::location::{
    alias_table, normalize, AliasInfo, BatchRequest, BatchResult, CacheStats, CancelToken,
    NoProgress,
};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── POST /api/resolve ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub names: Vec<String>,
    pub max_lookups: Option<usize>,
}

pub(super) async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<BatchResult>, ApiError> {
    let start = Instant::now();

    let max_lookups = body
        .max_lookups
        .unwrap_or(state.max_lookups)
        .min(state.max_lookups);
    let request = BatchRequest::new(body.names, max_lookups);

    // Dropped with this future if the client goes away, stopping the batch
    // at the next key.
    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();
    let resolver = Arc::clone(&state.resolver);
    let result = tokio::task::spawn_blocking(move || {
        resolver.resolve_batch(&request, &mut NoProgress, &cancel)
    })
    .await
    .map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("resolver task failed: {e}"),
        )
    })?;
    guard.disarm();

    info!(
        keys = result.coordinates.len(),
        resolved = result.resolved_count(),
        truncated = result.truncated,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "POST /api/resolve"
    );
    Ok(Json(result))
}

// ─── GET /api/normalize ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct NormalizeQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub raw: String,
    pub canonical: String,
}

pub(super) async fn normalize_name(
    Query(params): Query<NormalizeQuery>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let raw = params
        .name
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'name' parameter"))?;
    let canonical = normalize(&raw).to_string();
    Ok(Json(NormalizeResponse { raw, canonical }))
}

// ─── GET /api/aliases ────────────────────────────────────────────

pub(super) async fn aliases() -> Json<Vec<AliasInfo>> {
    Json(alias_table())
}

// ─── GET /api/cache ──────────────────────────────────────────────

pub(super) async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.resolver.cache().stats(Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{
        CachePolicy, Coordinate, Geocoder, LookupError, Pacer, PlaceResolver, PlaceStatus,
        ResolutionCache,
    };
    use std::time::Duration;

    struct EverywhereIsPune;

    impl Geocoder for EverywhereIsPune {
        fn lookup(&self, query: &str) -> Result<Option<Coordinate>, LookupError> {
            if query.starts_with("Xyz") {
                Ok(None)
            } else {
                Ok(Some(Coordinate::new(18.52, 73.85)))
            }
        }
    }

    fn test_state(max_lookups: usize) -> Arc<AppState> {
        let resolver = PlaceResolver::new(
            Box::new(EverywhereIsPune),
            Arc::new(ResolutionCache::in_memory(CachePolicy::default())),
            Pacer::new(Duration::from_millis(1), Duration::from_millis(1)),
            "India",
        );
        Arc::new(AppState {
            resolver: Arc::new(resolver),
            max_lookups,
        })
    }

    #[tokio::test]
    async fn test_resolve_endpoint() {
        let body = ResolveBody {
            names: vec!["Delhi".into(), "NCT of Delhi".into(), "Xyzpur".into()],
            max_lookups: None,
        };
        let Json(result) = resolve(State(test_state(30)), Json(body)).await.unwrap();

        assert_eq!(result.coordinates.len(), 2);
        assert!(matches!(result.status("Delhi"), PlaceStatus::Resolved { .. }));
        assert_eq!(result.status("Xyzpur"), PlaceStatus::Unresolved);
    }

    #[tokio::test]
    async fn test_resolve_caps_requested_ceiling() {
        let body = ResolveBody {
            names: vec!["A".into(), "B".into(), "C".into()],
            max_lookups: Some(100),
        };
        let Json(result) = resolve(State(test_state(2)), Json(body)).await.unwrap();
        assert!(result.truncated);
        assert_eq!(result.coordinates.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_empty_batch() {
        let body = ResolveBody {
            names: vec![],
            max_lookups: None,
        };
        let Json(result) = resolve(State(test_state(30)), Json(body)).await.unwrap();
        assert!(result.coordinates.is_empty());
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_normalize_endpoint() {
        let query = NormalizeQuery {
            name: Some(" Telengana ".into()),
        };
        let Json(resp) = normalize_name(Query(query)).await.unwrap();
        assert_eq!(resp.canonical, "Telangana");
    }

    #[tokio::test]
    async fn test_normalize_missing_name() {
        let err = normalize_name(Query(NormalizeQuery { name: None })).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cache_stats_after_batch() {
        let state = test_state(30);
        let body = ResolveBody {
            names: vec!["Pune".into(), "Xyzpur".into()],
            max_lookups: None,
        };
        resolve(State(Arc::clone(&state)), Json(body)).await.unwrap();

        let Json(stats) = cache_stats(State(state)).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.negative, 1);
    }

    #[tokio::test]
    async fn test_aliases_endpoint() {
        let Json(table) = aliases().await;
        assert!(table.iter().any(|a| a.canonical == "Puducherry"));
    }
}
