//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static front-end from `./static` with index fallback
/// - CORS (allow any origin/method/headers); the server binds to localhost only
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: AppState) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/questions", get(http::http_get_questions))
        .route("/api/v1/state", get(http::http_get_state))
        .route("/api/v1/select", post(http::http_post_select))
        .route("/api/v1/draft", put(http::http_put_draft))
        .route("/api/v1/grade", post(http::http_post_grade))
        .route("/api/v1/glossary", get(http::http_get_glossary))
        .route("/api/v1/glossary/:section/:term", get(http::http_get_definition))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::{Glossary, GlossarySection, GlossaryTerm};
    use crate::scoring::{testing::ScriptedScorer, ScoringClient};
    use crate::session::tests::{session_in, GOOD_REPLY, Q1, Q2};

    struct Harness {
        router: Router,
        state: AppState,
        replies: tokio::sync::mpsc::UnboundedSender<Result<String, crate::error::ScoreError>>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (scorer, replies) = ScriptedScorer::new();
        let glossary = Glossary {
            sections: vec![GlossarySection {
                name: "Caching".into(),
                terms: vec![GlossaryTerm { term: "Write-through".into(), definition: "Write cache and store together.".into() }],
            }],
        };
        let (state, _tasks) = AppState::with_session(
            session_in(dir.path()),
            ScoringClient::new(scorer, Duration::from_secs(5)),
            Arc::new(glossary),
            Duration::from_secs(60),
        );
        Harness { router: build_router(state.clone()), state, replies, _dir: dir }
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_questions() {
        let h = harness();
        let (status, body) = call(&h.router, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (_, body) = call(&h.router, Method::GET, "/api/v1/questions", None).await;
        assert_eq!(body[0], json!({"question": Q1, "grade": 0, "letter": "F"}));
        assert_eq!(body[1]["question"], Q2);
    }

    #[tokio::test]
    async fn edit_grade_and_conflict() {
        let h = harness();
        let (status, _) = call(&h.router, Method::PUT, "/api/v1/draft", Some(json!({"section": "requirements", "text": "1B reads/day"}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&h.router, Method::POST, "/api/v1/grade", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["question"], Q1);

        let (status, body) = call(&h.router, Method::POST, "/api/v1/grade", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].as_str().unwrap().contains("in flight"));

        let (_, view) = call(&h.router, Method::GET, "/api/v1/state", None).await;
        assert_eq!(view["phase"], "scoring");
        assert_eq!(view["can_grade"], false);
        assert_eq!(view["draft"]["requirements"], "1B reads/day");

        h.replies.send(Ok(GOOD_REPLY.into())).unwrap();
        let mut views = h.state.orchestrator.subscribe();
        while !views.borrow_and_update().can_grade {
            views.changed().await.unwrap();
        }
        let (_, view) = call(&h.router, Method::GET, "/api/v1/state", None).await;
        assert_eq!(view["grade"], 10);
        assert_eq!(view["letter"], "C-");
        assert_eq!(view["panel"]["kind"], "analysis");
        assert_eq!(view["panel"]["total"], 10);
        assert_eq!(view["panel"]["scores"]["components"], 4);
    }

    #[tokio::test]
    async fn select_unknown_question_is_404() {
        let h = harness();
        let (status, body) = call(&h.router, Method::POST, "/api/v1/select", Some(json!({"question": "Design Uber"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "unknown question: Design Uber");

        let (status, view) = call(&h.router, Method::POST, "/api/v1/select", Some(json!({"question": Q2}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["question"], Q2);
    }

    #[tokio::test]
    async fn glossary_search_and_lookup() {
        let h = harness();
        let (_, body) = call(&h.router, Method::GET, "/api/v1/glossary?q=write", None).await;
        assert_eq!(body["sections"][0]["terms"][0]["term"], "Write-through");
        let (_, body) = call(&h.router, Method::GET, "/api/v1/glossary?q=zzz", None).await;
        assert_eq!(body["sections"][0]["terms"], json!([]));

        let (status, body) = call(&h.router, Method::GET, "/api/v1/glossary/Caching/Write-through", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["definition"], "Write cache and store together.");
        let (status, _) = call(&h.router, Method::GET, "/api/v1/glossary/Caching/LRU", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
