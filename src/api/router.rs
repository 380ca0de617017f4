//! HTTP API router.
//!
//! Returns a composable `Router` mounted under `/api/`:
//! - `POST /api/process` runs one note through the pipeline
//! - `GET /api/health` reports model reachability and code count
//!
//! Every response carries `Cache-Control: no-store`; note text and its
//! conditions are clinical data.

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router around a shared context.
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/process", post(endpoints::process::process))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::codes::ReferenceCodes;
    use crate::pipeline::evaluation::testing::CountingSource;
    use crate::pipeline::evaluation::HccEvaluator;
    use crate::pipeline::extraction::retry::testing::RecordingSleeper;
    use crate::pipeline::extraction::ConditionExtractor;
    use crate::pipeline::llm::testing::{ScriptedLlmClient, Step};
    use crate::pipeline::llm::{LlmClient, MockLlmClient};
    use crate::pipeline::workflow::{HccWorkflow, MISSING_NOTE_TEXT};

    const NOTE: &str = "Assessment/Plan:\n1. Diabetes (E11.9)\n2. Hypertension (I10)";
    const REPLY: &str = r#"[{"condition":"Diabetes","code":"E11.9"},{"condition":"Hypertension","code":"I10"}]"#;

    fn context(llm: impl LlmClient + Send + Sync + 'static) -> ApiContext {
        let extractor = ConditionExtractor::new(Box::new(llm), "medgemma:4b")
            .with_sleeper(Box::new(RecordingSleeper::default()));
        let evaluator = HccEvaluator::new(Box::new(CountingSource::new(&[])));
        let codes: ReferenceCodes = ["E11.9", "J44.9"].iter().collect();
        ApiContext::new(HccWorkflow::new(extractor, evaluator), codes)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn process_returns_pipeline_result() {
        let app = api_router(context(ScriptedLlmClient::reply(REPLY)));
        let body = serde_json::json!({ "note_text": NOTE }).to_string();

        let response = app.oneshot(post_json("/api/process", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["conditions"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["relevant_conditions"],
            serde_json::json!([{ "condition": "Diabetes", "code": "E119" }])
        );
        assert_eq!(json["errors"], serde_json::json!([]));
        assert!(json.get("input_rejected").is_none());
    }

    #[tokio::test]
    async fn process_rejects_missing_or_blank_note_text() {
        let llm = ScriptedLlmClient::reply(REPLY);
        let calls = llm.calls();
        let ctx = context(llm);

        for body in ["{}", r#"{"note_text":null}"#, r#"{"note_text":"  \n "}"#] {
            let response = api_router(ctx.clone())
                .oneshot(post_json("/api/process", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = json_body(response).await;
            assert_eq!(json["error"]["code"], "BAD_REQUEST");
            assert_eq!(json["error"]["message"], MISSING_NOTE_TEXT);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn process_rejects_malformed_json() {
        let app = api_router(context(ScriptedLlmClient::reply(REPLY)));
        let response = app
            .oneshot(post_json("/api/process", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn model_failure_is_reported_in_body() {
        let app = api_router(context(ScriptedLlmClient::always(Step::Unreachable)));
        let body = serde_json::json!({ "note_text": NOTE }).to_string();

        let response = app.oneshot(post_json("/api/process", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["conditions"], serde_json::json!([]));
        let errors = json["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_str().unwrap().starts_with("Extraction failed:"));
    }

    #[tokio::test]
    async fn health_reports_model_and_codes() {
        let app = api_router(context(ScriptedLlmClient::reply(REPLY)));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "medgemma:4b");
        assert_eq!(json["model_available"], true);
        assert_eq!(json["reference_codes"], 2);
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn health_is_degraded_when_model_missing() {
        let app = api_router(context(MockLlmClient::new("[]").with_models(Vec::new())));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["model_available"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = api_router(context(ScriptedLlmClient::reply(REPLY)));
        let response = app
            .oneshot(Request::get("/api/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
