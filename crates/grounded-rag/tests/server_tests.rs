//! HTTP API tests driven through the router without binding a socket

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use grounded_rag::{
    config::GenerationConfig, embeddings::HashingEmbedder, generation::GenerationClient,
    server::RagServer, RagConfig, RagPipeline, Result,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "grounded-rag-test-boundary";

struct EchoModel;

#[async_trait]
impl GenerationClient for EchoModel {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        let first = prompt.split("\n\n\n").next().unwrap_or_default();
        Ok(first.split("\n\n").next().unwrap_or_default().to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

fn app() -> Router {
    let pipeline = RagPipeline::new(
        RagConfig::default(),
        Arc::new(HashingEmbedder::new(1024)),
        Arc::new(EchoModel),
    )
    .unwrap();
    RagServer::new(Arc::new(pipeline)).router()
}

fn multipart(fields: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, filename, content) in fields {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match filename {
            Some(filename) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: text/plain\r\n\r\n",
                name, filename
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                name
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri("/api/ingest")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_then_query() {
    let app = app();

    let response = app
        .clone()
        .oneshot(multipart(&[
            ("collection", None, "colors"),
            ("file", Some("colors.txt"), "The sky is blue. Grass is green."),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ingested = body_json(response).await;
    assert_eq!(ingested["collection"], "colors");
    assert_eq!(ingested["kind"], "text");
    assert_eq!(ingested["units_ingested"], 2);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/query",
            json!({"question": "What color is grass?", "collection": "colors"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let answer = body_json(response).await;
    assert_eq!(answer["answer"], "Grass is green.");
    assert_eq!(answer["answerable"], true);
    assert_eq!(answer["sources"].as_array().map(Vec::len), Some(2));

    let response = app
        .clone()
        .oneshot(Request::get("/api/collections").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let collections = body_json(response).await;
    assert_eq!(collections[0]["name"], "colors");
    assert_eq!(collections[0]["units"], 2);
}

#[tokio::test]
async fn test_query_unknown_collection_is_404() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/api/query",
            json!({"question": "Anything?", "collection": "missing"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "empty_collection");
    assert_eq!(body["error"]["stage"], "retrieving");
}

#[tokio::test]
async fn test_unsupported_upload_is_400() {
    let response = app()
        .oneshot(multipart(&[("file", Some("slides.pptx"), "binary")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "unsupported_type");
}

#[tokio::test]
async fn test_missing_file_field_is_400() {
    let response = app()
        .oneshot(multipart(&[("collection", None, "colors")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_http_url_is_rejected() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/api/ingest/url",
            json!({"url": "file:///etc/passwd"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_collection() {
    let app = app();
    app.clone()
        .oneshot(multipart(&[
            ("collection", None, "notes"),
            ("file", Some("notes.txt"), "Short note."),
        ]))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::delete("/api/collections/notes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::delete("/api/collections/notes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_info_reports_components() {
    let response = app()
        .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let info = body_json(response).await;
    assert_eq!(info["name"], "grounded-rag");
    assert_eq!(info["embedder"], "hashing");
    assert_eq!(info["generator"], "echo");
    assert_eq!(info["segmentation"], "sentence");
}
