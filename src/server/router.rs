use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::security::ADMIN_TOKEN_HEADER;
use crate::server::handlers::{chat, health, knowledge};
use crate::state::AppState;

/// Creates the application router.
///
/// - `GET /health`
/// - `POST /api/chat`, `GET /api/chat/greeting`
/// - `POST /api/kb/upsert` (also served under the legacy
///   `/functions/v1/kb-upsert` path)
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/greeting", get(chat::greeting))
        .route("/api/kb/upsert", post(knowledge::upsert))
        .route("/functions/v1/kb-upsert", post(knowledge::upsert))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let allowed_origins = configured
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    // The widget is embedded on third-party pages; no list means any origin.
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ])
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::chat::scraper::{PageScraper, ScrapeError};
    use crate::core::config::{AppConfig, AppPaths};
    use crate::event::EventProfile;
    use crate::interactions::InteractionLog;
    use crate::knowledge::{open_pool, SqliteKnowledgeStore};
    use crate::llm::{Embedder, LlmError, LlmService};
    use crate::state::Backends;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct NoScrape;

    #[async_trait]
    impl PageScraper for NoScrape {
        async fn fetch_text(&self) -> Result<String, ScrapeError> {
            Err(ScrapeError::Disabled)
        }
    }

    async fn test_state(admin_token: Option<&str>) -> Arc<AppState> {
        let dir = std::env::temp_dir().join(format!("aitalks-router-test-{}", uuid::Uuid::new_v4()));
        let paths = Arc::new(AppPaths::at(&dir));

        let mut config = AppConfig::default();
        config.admin.token = admin_token.map(str::to_string);

        let pool = open_pool(&paths.data_file("test.db")).await.unwrap();
        let knowledge = Arc::new(SqliteKnowledgeStore::with_pool(pool.clone(), 2).await.unwrap());
        let interactions = InteractionLog::with_pool(pool).await.unwrap();

        let backends = Backends {
            knowledge,
            embedder: Arc::new(UnitEmbedder),
            scraper: Arc::new(NoScrape),
            llm: LlmService::new(Vec::new()),
            interactions,
        };

        Arc::new(AppState::assemble(
            paths,
            config,
            EventProfile::embedded().unwrap(),
            backends,
        ))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_chunk_count() {
        let app = router(test_state(None).await);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["knowledge_chunks"], 0);
    }

    #[tokio::test]
    async fn ingestion_without_token_is_unauthorized_and_creates_nothing() {
        let state = test_state(Some("s3cret")).await;
        let app = router(state.clone());

        let (status, body) = send(
            app,
            post_json(
                "/api/kb/upsert",
                json!({ "title": "Jegyek", "content": "VIP 199.000 Ft", "tags": ["jegyek"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Unauthorized" }));
        assert_eq!(state.knowledge.item_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ingestion_is_unauthorized_when_no_token_is_configured() {
        let state = test_state(None).await;
        let mut request = post_json(
            "/functions/v1/kb-upsert",
            json!({ "title": "Jegyek", "content": "VIP", "tags": [] }),
        );
        request
            .headers_mut()
            .insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("anything"));

        let (status, _) = send(router(state.clone()), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.knowledge.item_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ingestion_with_token_stores_chunks() {
        let state = test_state(Some("s3cret")).await;
        let mut request = post_json(
            "/api/kb/upsert",
            json!({
                "title": "Jegyek",
                "content": "Early Bird 89.000 Ft.\n\nVIP 199.000 Ft.",
                "tags": ["jegyek"],
                "source_url": "https://aitalks.hu/jegyek"
            }),
        );
        request
            .headers_mut()
            .insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("s3cret"));

        let (status, body) = send(router(state.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["chunks_created"], 1);
        assert!(body["item_id"].as_str().is_some());
        assert_eq!(state.knowledge.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ingestion_rejects_missing_fields() {
        let state = test_state(Some("s3cret")).await;
        let mut request = post_json("/api/kb/upsert", json!({ "title": "Jegyek" }));
        request
            .headers_mut()
            .insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("s3cret"));

        let (status, body) = send(router(state), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: title, content, tags");
    }

    #[tokio::test]
    async fn chat_requires_message() {
        let app = router(test_state(None).await);

        let (status, body) = send(app, post_json("/api/chat", json!({ "message": "  " }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
    }

    #[tokio::test]
    async fn chat_reports_malformed_history_turn() {
        let app = router(test_state(None).await);

        let (status, body) = send(
            app,
            post_json(
                "/api/chat",
                json!({ "message": "Mi a program?", "history": [{ "isBot": true }] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert_ne!(error, "Message is required");
        assert!(error.contains("history"));
        assert!(error.contains("text"));
    }

    #[tokio::test]
    async fn chat_without_llm_answers_with_fallback() {
        let state = test_state(None).await;
        let app = router(state);

        let (status, body) = send(
            app,
            post_json(
                "/api/chat",
                json!({
                    "message": "Mennyibe kerül a jegy?",
                    "history": [{ "text": "Szia!", "isBot": true }],
                    "session_id": "abc"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].as_str().unwrap().contains("Ft"));
        assert_eq!(body["metadata"]["topic"], "ticket");
        assert_eq!(body["metadata"]["session_id"], "abc");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn greeting_comes_from_profile() {
        let app = router(test_state(None).await);
        let request = Request::builder()
            .uri("/api/chat/greeting")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].as_str().unwrap().contains("AI Talks"));
    }

    #[tokio::test]
    async fn cors_preflight_allows_admin_header() {
        let app = router(test_state(None).await);
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/kb/upsert")
            .header("origin", "https://partner.example")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", ADMIN_TOKEN_HEADER)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }
}
