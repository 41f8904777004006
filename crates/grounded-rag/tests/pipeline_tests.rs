//! End-to-end pipeline runs with a local page server and stub model

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{http::StatusCode, response::Html, routing::get, Router};
use grounded_rag::{
    config::GenerationConfig,
    embeddings::{EmbeddingProvider, HashingEmbedder},
    generation::{GenerationClient, UNANSWERABLE},
    Document, DocumentSource, Error, PipelineStage, QueryRequest, RagConfig, RagPipeline,
    Result, SourceKind,
};
use parking_lot::Mutex;

/// Hashing embedder that counts how often it is asked for vectors
struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Answers with the first context passage, or the refusal token when no
/// question word of four or more letters appears in the context
struct ExtractiveModel {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationClient for ExtractiveModel {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());

        let (context, rest) = prompt.split_once("\n\nPlease answer").unwrap_or(("", prompt));
        let question = rest.rsplit("Question: ").next().unwrap_or("");
        let context_lower = context.to_lowercase();

        let grounded = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 4)
            .any(|w| context_lower.contains(&w.to_lowercase()));

        if grounded {
            Ok(context
                .split("\n\n\n")
                .next()
                .unwrap_or_default()
                .to_string())
        } else {
            Ok(UNANSWERABLE.to_string())
        }
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<CountingEmbedder>,
    model: Arc<ExtractiveModel>,
}

fn harness() -> Harness {
    harness_with(RagConfig::default())
}

fn harness_with(config: RagConfig) -> Harness {
    let embedder = Arc::new(CountingEmbedder {
        inner: HashingEmbedder::new(1024),
        calls: AtomicUsize::new(0),
    });
    let model = Arc::new(ExtractiveModel {
        prompts: Mutex::new(Vec::new()),
    });
    let pipeline = RagPipeline::new(config, embedder.clone(), model.clone()).unwrap();
    Harness {
        pipeline,
        embedder,
        model,
    }
}

fn text_source(name: &str, text: &str) -> DocumentSource {
    DocumentSource::File(Document::new(
        SourceKind::Text,
        name,
        text.as_bytes().to_vec(),
    ))
}

async fn serve_pages() -> String {
    let app = Router::new()
        .route(
            "/ev",
            get(|| async {
                Html(
                    "<html><body><h1>EVs</h1>\
                     <p>Federal tax credits of up to 7,500 dollars are incentives for purchasing EVs.</p>\
                     <p>Charging at home is cheaper than buying gasoline.</p>\
                     </body></html>",
                )
            }),
        )
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "missing") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Html("<p>Eventually.</p>")
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_text_file_answers_from_nearest_sentence() {
    let h = harness();
    let source = text_source("colors.txt", "The sky is blue. Grass is green.");

    let response = h
        .pipeline
        .answer_from_source(&source, "What color is grass?", None)
        .await
        .unwrap();

    assert_eq!(response.sources[0].text, "Grass is green.");
    assert_eq!(response.answer, "Grass is green.");
    assert!(response.answerable);

    let prompts = h.model.prompts.lock();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Grass is green.\n\n\nThe sky is blue."));
    assert!(prompts[0].contains("What color is grass?"));
}

#[tokio::test]
async fn test_fetch_failure_stops_before_embedding() {
    let h = harness();
    let base = serve_pages().await;
    let source = DocumentSource::Url(format!("{}/gone", base));

    let err = h
        .pipeline
        .answer_from_source(&source, "Anything?", None)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(PipelineStage::Extracting));
    assert!(matches!(err.root(), Error::Fetch { status_code: 404 }));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(h.model.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_unrelated_question_is_unanswerable() {
    let h = harness();
    let base = serve_pages().await;
    let source = DocumentSource::Url(format!("{}/ev", base));

    let response = h
        .pipeline
        .answer_from_source(&source, "What is the capital of Mars?", None)
        .await
        .unwrap();

    assert_eq!(response.answer, UNANSWERABLE);
    assert!(!response.answerable);
    assert!(!response.sources.is_empty());
    assert!(h.model.prompts.lock()[0].contains("What is the capital of Mars?"));
}

#[tokio::test]
async fn test_slow_page_times_out_before_embedding() {
    let mut config = RagConfig::default();
    config.http.fetch_timeout_secs = 1;
    let h = harness_with(config);
    let base = serve_pages().await;
    let source = DocumentSource::Url(format!("{}/slow", base));

    let start = Instant::now();
    let err = h
        .pipeline
        .answer_from_source(&source, "Anything?", None)
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(err.stage(), Some(PipelineStage::Extracting));
    assert!(matches!(err.root(), Error::Http(_)));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(h.model.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_web_page_paragraphs_are_indexed() {
    let h = harness();
    let base = serve_pages().await;
    let source = DocumentSource::Url(format!("{}/ev", base));

    let ingested = h.pipeline.ingest(&source, None).await.unwrap();
    assert!(ingested.collection.starts_with("web_"));
    assert_eq!(ingested.kind, SourceKind::Web);
    assert_eq!(ingested.units_ingested, 2);

    let response = h
        .pipeline
        .ask(&QueryRequest::new(
            "What are the incentives for purchasing EVs?",
            ingested.collection,
        ))
        .await
        .unwrap();
    assert!(response.sources[0].text.contains("incentives"));
    assert!(response.answerable);
}

#[tokio::test]
async fn test_query_before_ingest_is_empty_collection() {
    let h = harness();
    let err = h
        .pipeline
        .ask(&QueryRequest::new("q", "never_ingested"))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::EmptyCollection(_)));
    assert_eq!(err.stage(), Some(PipelineStage::Retrieving));
}

#[tokio::test]
async fn test_blank_document_leaves_collection_empty() {
    let h = harness();
    let ingested = h
        .pipeline
        .ingest(&text_source("blank.txt", "   \n  "), None)
        .await
        .unwrap();
    assert_eq!(ingested.units_ingested, 0);

    let err = h
        .pipeline
        .ask(&QueryRequest::new("q", ingested.collection))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::EmptyCollection(_)));
}

#[tokio::test]
async fn test_invalid_pdf_fails_in_extraction() {
    let h = harness();
    let source = DocumentSource::File(Document::new(
        SourceKind::Pdf,
        "broken.pdf",
        b"%PDF-1.4 truncated".to_vec(),
    ));
    let err = h.pipeline.ingest(&source, None).await.unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Extracting));
    assert!(matches!(err.root(), Error::Extraction { .. }));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
}
