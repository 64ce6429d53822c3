//! Request handlers for the two read-only routes

use crate::cycle::HealthReport;
use crate::playlist::PLAYLIST_CONTENT_TYPE;
use crate::server::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Generation time of the served playlist, RFC 3339
pub const GENERATED_AT_HEADER: HeaderName = HeaderName::from_static("x-playlist-generated-at");

/// Number of entries in the served playlist
pub const ENTRY_COUNT_HEADER: HeaderName = HeaderName::from_static("x-playlist-entries");

/// `GET /playlist`
pub async fn playlist(State(state): State<AppState>) -> Response {
    let Some(artifact) = state.store.get() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "60")],
            "playlist not yet available\n",
        )
            .into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PLAYLIST_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ENTRY_COUNT_HEADER, HeaderValue::from(artifact.entry_count()));
    if let Ok(value) = HeaderValue::from_str(&artifact.generated_at.to_rfc3339()) {
        headers.insert(GENERATED_AT_HEADER, value);
    }

    (StatusCode::OK, headers, artifact.text.clone()).into_response()
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(flatten)]
    report: HealthReport,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.tracker.health(state.stuck_after);
    let (status, label) = if report.healthy {
        (StatusCode::OK, "healthy")
    } else {
        tracing::warn!(
            "Health check failing: cycle {} for {}s",
            report.phase,
            report.running_for_secs.unwrap_or_default()
        );
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(HealthBody {
            status: label,
            report,
        }),
    )
        .into_response()
}

/// Any other path or method
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found\n")
}
