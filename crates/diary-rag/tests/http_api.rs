//! HTTP surface tests against in-process collaborators.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use diary_rag::providers::{Embedder, Generator, InMemoryIndex};
use diary_rag::server::RagServer;
use diary_rag::{Error, RagConfig, RagPipeline, Result};

const DIARY: &str = "1st Day of Snowrest 1856 - Arrival\n\
                     We reached the harbour at dawn.\n\
                     \n\
                     The rain did not stop all afternoon.";

/// Letter-frequency embedder, deterministic and unit length
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 26];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            vector[0] = 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        26
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "letters"
    }
}

struct CannedGenerator(Option<&'static str>);

#[async_trait]
impl Generator for CannedGenerator {
    async fn answer(&self, _question: &str, context: &[String]) -> Result<String> {
        match self.0 {
            Some(answer) => Ok(format!("{} ({} passages)", answer, context.len())),
            None => Err(Error::generation_unavailable("upstream 503")),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.0.is_some())
    }

    fn name(&self) -> &str {
        "canned"
    }

    fn model(&self) -> &str {
        "canned-1"
    }
}

fn server(answer: Option<&'static str>) -> RagServer {
    let pipeline = RagPipeline::new(
        Arc::new(LetterEmbedder),
        Arc::new(InMemoryIndex::new()),
        Arc::new(CannedGenerator(answer)),
        "diary",
        5,
    );
    RagServer::with_pipeline(RagConfig::default(), Arc::new(pipeline))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(server: &RagServer, request: Request<Body>) -> (StatusCode, Value) {
    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_lists_services() {
    let (status, body) = send(&server(Some("ok")), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "healthy", "services": ["vector_index", "embedding", "llm"]})
    );
}

#[tokio::test]
async fn ready_after_self_check() {
    let server = server(Some("ok"));
    let (status, _) = send(&server, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    server.initialize().await.unwrap();
    let (status, _) = send(&server, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn query_on_empty_index_is_not_found() {
    let (status, body) = send(
        &server(Some("ok")),
        post("/query", json!({"question": "When did it rain?"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "No relevant information found."}));
}

#[tokio::test]
async fn ingest_then_query() {
    let server = server(Some("It rained all afternoon."));

    let (status, body) = send(&server, post("/ingest", json!({"text": DIARY}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries_written"], 3);

    let (status, body) = send(
        &server,
        post("/api/query", json!({"question": "When did it rain?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "It rained all afternoon. (3 passages)");
    assert_eq!(body["context"].as_array().unwrap().len(), 3);

    let mut ids: Vec<&str> = body["source_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn generator_fault_is_not_found_with_error_detail() {
    let server = server(None);
    send(&server, post("/ingest", json!({"text": DIARY}))).await;

    let (status, body) = send(&server, post("/query", json!({"question": "rain?"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Error: "));
    assert!(detail.contains("upstream 503"));
}

#[tokio::test]
async fn info_reports_providers() {
    let (status, body) = send(&server(Some("ok")), get("/api/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collection"], "diary");
    assert_eq!(body["providers"]["embedding"], "letters");
    assert_eq!(body["providers"]["vector_index"], "memory");
}

#[tokio::test]
async fn info_is_only_served_under_api() {
    let server = server(Some("ok"));

    let (status, body) = send(&server, get("/info")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&server, get("/api/info")).await;
    assert_eq!(status, StatusCode::OK);
}
