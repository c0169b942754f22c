//! REST API handlers for the status server

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::AppState;
use crate::analytics::TopicState;
use crate::error::{Error, ErrorCategory, TrendbotErrorTrait};
use crate::metrics;
use crate::models::TopicId;
use crate::scheduler::SourceStatus;
use crate::storage::ActivityReport;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::Scoring => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Network | ErrorCategory::Notification => StatusCode::BAD_GATEWAY,
            ErrorCategory::Scheduler => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Config | ErrorCategory::Storage | ErrorCategory::Other => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::error!(
            category = self.category().as_str(),
            status = status.as_u16(),
            error = %self,
            "API request failed"
        );
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tracked_topics: usize,
    pub sources: Vec<SourceStatus>,
}

/// One ranked topic in the summary
#[derive(Debug, Serialize)]
pub struct SummaryTopic {
    pub topic_id: TopicId,
    pub label: Option<String>,
    pub peak_score: f64,
    pub latest_score: f64,
    pub emergences: usize,
    pub state: TopicState,
}

/// Daily summary response
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub as_of: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub tracked_topics: usize,
    pub state_counts: BTreeMap<TopicState, usize>,
    pub top_topics: Vec<SummaryTopic>,
}

/// One history point of a topic
#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub volume: Option<i64>,
    pub engagement: i64,
}

/// Topic detail response
#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub topic_id: TopicId,
    pub label: Option<String>,
    pub state: TopicState,
    pub velocity: f64,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryPoint>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/summary", get(get_summary))
        .route("/api/activity", get(get_activity))
        .route("/api/topics/{id}", get(get_topic))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let tracked_topics = state.monitor.with_tracker(|t| t.len()).await;
    let status = if state.monitor.is_shutting_down() {
        "stopping"
    } else {
        "healthy"
    };

    metrics::record_api_request("/api/health", 200);
    Json(ApiResponse::success(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tracked_topics,
        sources: state.monitor.source_statuses(),
    }))
}

/// Summary of the trailing window, as of now
async fn get_summary(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.monitor.daily_summary(Utc::now()).await;
    let labels = state
        .monitor
        .labels_for(summary.top_topics.iter().map(|e| &e.topic_id));

    let top_topics = summary
        .top_topics
        .into_iter()
        .map(|entry| SummaryTopic {
            label: labels.get(&entry.topic_id).cloned(),
            topic_id: entry.topic_id,
            peak_score: entry.peak_score,
            latest_score: entry.latest_score,
            emergences: entry.emergences,
            state: entry.state,
        })
        .collect();

    metrics::record_api_request("/api/summary", 200);
    Json(ApiResponse::success(SummaryResponse {
        as_of: summary.as_of,
        window_start: summary.window_start,
        tracked_topics: summary.tracked_topics,
        state_counts: summary.state_counts,
        top_topics,
    }))
}

/// Stored per-platform activity over the summary window
async fn get_activity(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ActivityReport>>, Error> {
    match state.monitor.activity_report(Utc::now()) {
        Ok(report) => {
            metrics::record_api_request("/api/activity", 200);
            Ok(Json(ApiResponse::success(report)))
        }
        Err(e) => {
            metrics::record_api_request("/api/activity", 500);
            Err(e.into())
        }
    }
}

/// History of one tracked topic
async fn get_topic(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(topic_id) = TopicId::parse(&id) else {
        metrics::record_api_request("/api/topics", 400);
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid topic id: {id}. Expected <platform>:<name>"
            ))),
        )
            .into_response();
    };

    let detail = state
        .monitor
        .with_tracker(|tracker| {
            tracker.history(&topic_id).map(|history| TopicResponse {
                topic_id: topic_id.clone(),
                label: None,
                state: history.state(),
                velocity: history.velocity(),
                last_observed_at: history.last_observed_at(),
                history: history
                    .entries()
                    .map(|entry| HistoryPoint {
                        timestamp: entry.timestamp,
                        score: entry.score.value,
                        volume: entry.score.snapshot.volume,
                        engagement: entry.score.snapshot.total_engagement(),
                    })
                    .collect(),
            })
        })
        .await;

    match detail {
        Some(mut detail) => {
            detail.label = state.monitor.label(&topic_id);
            metrics::record_api_request("/api/topics", 200);
            (StatusCode::OK, Json(ApiResponse::success(detail))).into_response()
        }
        None => {
            metrics::record_api_request("/api/topics", 404);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("Topic not tracked: {topic_id}"))),
            )
                .into_response()
        }
    }
}

/// Prometheus scrape endpoint
async fn get_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {e}"))
                .into_response()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{CollectedTopic, MetricSnapshot, Platform};
    use crate::notifications::NotificationManager;
    use crate::scheduler::Monitor;
    use crate::storage::TrendStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt;

    async fn state_with_topic() -> AppState {
        let store = Arc::new(TrendStore::in_memory().unwrap());
        let monitor =
            Monitor::new(Config::default(), store, Arc::new(NotificationManager::new())).unwrap();

        let snapshot = MetricSnapshot::new(Platform::Twitter, "#Rust", Utc::now())
            .with_volume(500)
            .with_engagement(1200, 300);
        monitor
            .ingest("twitter", vec![CollectedTopic::new(snapshot, "#Rust")])
            .await;

        AppState {
            monitor: Arc::new(monitor),
            start_time: Instant::now(),
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("test error");
        assert!(!response.success);
        assert_eq!(response.error, "test error");
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(state_with_topic().await);
        let (status, body) = get_json(router, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["tracked_topics"], 1);
    }

    #[tokio::test]
    async fn test_summary() {
        let router = create_router(state_with_topic().await);
        let (status, body) = get_json(router, "/api/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tracked_topics"], 1);
        assert_eq!(body["data"]["state_counts"]["NEW"], 1);
    }

    #[tokio::test]
    async fn test_activity() {
        let state = state_with_topic().await;
        state
            .monitor
            .store()
            .save_trends_batch(&[crate::storage::TrendRecord::from_collected(
                &CollectedTopic::new(
                    MetricSnapshot::new(Platform::Twitter, "#Rust", Utc::now()),
                    "#Rust",
                ),
                42.0,
            )])
            .unwrap();

        let (status, body) = get_json(create_router(state), "/api/activity").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["platforms"][0]["platform"], "twitter");
        assert_eq!(body["data"]["platforms"][0]["top_trend"], "#Rust");
    }

    #[test]
    fn test_error_status_follows_category() {
        use crate::sources::SourceError;

        let response = Error::Source(SourceError::Unavailable(503)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let storage: anyhow::Result<()> = Err(rusqlite::Error::QueryReturnedNoRows.into());
        let response = Error::from(storage.unwrap_err()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::from(crate::scheduler::error::MonitorError::ShuttingDown).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_topic_found() {
        let router = create_router(state_with_topic().await);
        let (status, body) = get_json(router, "/api/topics/twitter:%23rust").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["topic_id"], "twitter:#rust");
        assert_eq!(body["data"]["label"], "#Rust");
        assert_eq!(body["data"]["state"], "NEW");
        assert_eq!(body["data"]["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_topic_missing_and_invalid() {
        let state = state_with_topic().await;

        let (status, _) = get_json(create_router(state.clone()), "/api/topics/reddit:unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(create_router(state), "/api/topics/mastodon:x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        metrics::init_metrics().unwrap();
        let router = create_router(state_with_topic().await);
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("trendbot_tracked_topics"));
    }
}
