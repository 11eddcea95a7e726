//! HTTP server for commit-ledger.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts push webhooks from GitLab, Gitee and GitHub
//! - `GET /api/stats/member` - Commit and line totals for one author
//! - `GET /api/stats/languages` - Per-language totals for one author
//! - `GET /api/stats/commits` - One author's commits, newest first
//! - `GET /health` - Returns 200 if server is running
//!
//! Every route sits behind a per-client rate limit; excess requests get 429.

use std::sync::Arc;

pub mod health;
pub mod rate_limit;
pub mod stats;
pub mod webhook;

pub use health::health_handler;
pub use rate_limit::RateLimiter;
pub use stats::{language_stats_handler, member_commits_handler, member_stats_handler};
pub use webhook::webhook_handler;

use crate::aggregate::CommitAggregator;
use crate::ingest::Ingestor;

/// Shared application state, passed to handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    ingestor: Ingestor,

    /// Shared secret for token and signature checks. Empty disables them.
    webhook_secret: String,

    rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        ingestor: Ingestor,
        webhook_secret: impl Into<String>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                ingestor,
                webhook_secret: webhook_secret.into(),
                rate_limiter,
            }),
        }
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.inner.ingestor
    }

    pub fn aggregator(&self) -> &CommitAggregator {
        self.inner.ingestor.aggregator()
    }

    pub fn webhook_secret(&self) -> &str {
        &self.inner.webhook_secret
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.rate_limiter
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let limiter = Arc::clone(app_state.rate_limiter());
    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/api/stats/member", get(member_stats_handler))
        .route("/api/stats/languages", get(language_stats_handler))
        .route("/api/stats/commits", get(member_commits_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(limiter, rate_limit::rate_limit))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::platform::signature::{compute_signature, format_signature_header};
    use crate::pool::{PoolConfig, WorkerPool};
    use crate::store::Store;
    use crate::types::{CommitRecord, FileStat};

    async fn test_app_state(secret: &str) -> (AppState, Store) {
        test_app_state_with_limit(secret, RateLimiter::new(1000, Duration::from_secs(60))).await
    }

    async fn test_app_state_with_limit(secret: &str, limiter: RateLimiter) -> (AppState, Store) {
        let store = Store::in_memory().await.unwrap();
        let pool = Arc::new(WorkerPool::new(PoolConfig::new(2, 16)));
        pool.start();
        let ingestor = Ingestor::new(pool, CommitAggregator::new(store.clone()));
        (AppState::new(ingestor, secret, Arc::new(limiter)), store)
    }

    fn gitlab_push() -> Value {
        json!({
            "object_kind": "push",
            "ref": "refs/heads/main",
            "project": {"id": 15, "name": "demo"},
            "commits": [
                {
                    "id": "b6568db1bc1dcd7f8b4d5a946b0b91f9dacd7327",
                    "message": "Update Catalan translation",
                    "timestamp": "2024-03-10T12:00:00Z",
                    "author": {"name": "Jordi", "email": "jordi@example.com"},
                    "added": ["app.py"],
                    "modified": [],
                    "removed": []
                },
                {
                    "id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
                    "message": "fixed readme",
                    "timestamp": "2024-03-11T08:00:00Z",
                    "author": {"name": "Jordi", "email": "jordi@example.com"},
                    "modified": ["README.md"]
                }
            ]
        })
    }

    fn json_request(uri: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    // ─── Health endpoint ───

    #[tokio::test]
    async fn health_returns_200() {
        let (state, _store) = test_app_state("").await;
        let response = build_router(state).oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    // ─── Rate limiting ───

    fn get_from(uri: &str, client: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("X-Forwarded-For", client)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn requests_over_the_limit_get_429() {
        let (state, _store) =
            test_app_state_with_limit("", RateLimiter::new(2, Duration::from_secs(60))).await;
        let app = build_router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_from("/health", "198.51.100.7"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(get_from("/health", "198.51.100.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
        assert_eq!(
            body_json(response).await,
            json!({"error": "too many requests, retry later"})
        );

        // The webhook shares the same allowance.
        let request = json_request(
            "/webhook",
            &[("X-Gitlab-Event", "Push Hook"), ("X-Forwarded-For", "198.51.100.7")],
            serde_json::to_vec(&gitlab_push()).unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app
            .oneshot(get_from("/health", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // ─── Webhook endpoint ───

    #[tokio::test]
    async fn gitlab_push_is_accepted_and_recorded() {
        let (state, store) = test_app_state("s3cret").await;
        let app = build_router(state.clone());

        let request = json_request(
            "/webhook",
            &[("X-Gitlab-Event", "Push Hook"), ("X-Gitlab-Token", "s3cret")],
            serde_json::to_vec(&gitlab_push()).unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "accepted", "platform": "gitlab", "event": "Push Hook", "commits": 2})
        );

        state.ingestor().pool().stop().await;
        assert_eq!(store.commit_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn github_signed_push_is_accepted() {
        let (state, store) = test_app_state("s3cret").await;
        let app = build_router(state.clone());

        let body = serde_json::to_vec(&json!({
            "ref": "refs/heads/main",
            "repository": {"id": 1296269, "name": "Hello-World"},
            "commits": [{"id": "abc123", "timestamp": "2024-01-02T03:04:05Z"}]
        }))
        .unwrap();
        let signature = format_signature_header(&compute_signature(&body, b"s3cret"));
        let request = json_request(
            "/webhook",
            &[
                ("X-GitHub-Event", "push"),
                ("X-Hub-Signature-256", signature.as_str()),
            ],
            body,
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["platform"], "github");

        state.ingestor().pool().stop().await;
        assert!(store.load_commit("abc123", Some(1296269)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let (state, store) = test_app_state("s3cret").await;
        let app = build_router(state.clone());

        let request = json_request(
            "/webhook",
            &[("X-Gitee-Event", "Push Hook"), ("X-Gitee-Token", "guess")],
            serde_json::to_vec(&gitlab_push()).unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        state.ingestor().pool().stop().await;
        assert_eq!(store.commit_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_signature_returns_401() {
        let (state, _store) = test_app_state("s3cret").await;
        let request = json_request("/webhook", &[("X-GitHub-Event", "push")], b"{}".to_vec());

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_source_returns_400() {
        let (state, _store) = test_app_state("").await;
        let request = json_request("/webhook", &[("X-Other-Event", "push")], b"{}".to_vec());

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_json_returns_400() {
        let (state, _store) = test_app_state("").await;
        let request = json_request(
            "/webhook",
            &[("X-Gitlab-Event", "Push Hook")],
            b"{not json".to_vec(),
        );

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_events_are_accepted_without_commits() {
        let (state, _store) = test_app_state("").await;
        let request = json_request(
            "/webhook",
            &[("X-Gitlab-Event", "Merge Request Hook")],
            serde_json::to_vec(&gitlab_push()).unwrap(),
        );

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["commits"], 0);
    }

    // ─── Stats endpoints ───

    async fn seeded_state() -> AppState {
        let (state, _store) = test_app_state("").await;
        let aggregator = state.aggregator();

        let mut first = CommitRecord::new("c1");
        first.project_id = Some(1);
        first.author_email = "dev@example.com".into();
        first.timestamp = "2024-03-01T09:00:00Z".into();
        first.added = vec!["main.rs".into()];
        first.file_stats = Some([("main.rs".to_string(), FileStat::new(20, 0))].into());
        aggregator.record_commit(&first).await.unwrap();

        let mut second = CommitRecord::new("c2");
        second.project_id = Some(1);
        second.author_email = "dev@example.com".into();
        second.timestamp = "2024-03-31T23:30:00Z".into();
        second.modified = vec!["main.rs".into(), "app.py".into()];
        second.file_stats = Some(
            [
                ("main.rs".to_string(), FileStat::new(5, 3)),
                ("app.py".to_string(), FileStat::new(2, 1)),
            ]
            .into(),
        );
        aggregator.record_commit(&second).await.unwrap();

        let mut other = CommitRecord::new("c3");
        other.author_email = "someone@example.com".into();
        other.timestamp = "2024-03-15T09:00:00Z".into();
        aggregator.record_commit(&other).await.unwrap();

        state
    }

    #[tokio::test]
    async fn member_stats_endpoint() {
        let app = build_router(seeded_state().await);
        let response = app
            .oneshot(get("/api/stats/member?email=dev@example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "email": "dev@example.com",
                "commit_count": 2,
                "total_added": 27,
                "total_removed": 4,
                "total_files": 3
            })
        );
    }

    #[tokio::test]
    async fn date_range_includes_end_day() {
        let state = seeded_state().await;

        let response = build_router(state.clone())
            .oneshot(get(
                "/api/stats/commits?email=dev@example.com&start_date=2024-03-31&end_date=2024-03-31",
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["commits"][0]["commit_id"], "c2");

        let response = build_router(state)
            .oneshot(get("/api/stats/member?email=dev@example.com&end_date=2024-03-30"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["commit_count"], 1);
    }

    #[tokio::test]
    async fn language_stats_endpoint() {
        let app = build_router(seeded_state().await);
        let response = app
            .oneshot(get("/api/stats/languages?email=dev@example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["email"], "dev@example.com");
        assert_eq!(
            body["languages"],
            json!([
                {"language": "rust", "total_added": 25, "total_removed": 3, "total_files": 2},
                {"language": "python", "total_added": 2, "total_removed": 1, "total_files": 1}
            ])
        );
    }

    #[tokio::test]
    async fn stats_reject_bad_queries() {
        let state = seeded_state().await;

        for uri in [
            "/api/stats/member",
            "/api/stats/languages?email=",
            "/api/stats/commits?email=dev@example.com&start_date=yesterday",
        ] {
            let response = build_router(state.clone()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
