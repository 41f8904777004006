//! End-to-end RAG pipeline.
//!
//! A run moves linearly through
//! `Idle → Extracting → Segmenting → Indexing → Retrieving → Prompting → Generating → Done`.
//! A failure stops the run and is reported as [`Error::Pipeline`] carrying the
//! stage it happened in; nothing downstream of the failing stage is invoked.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{Credentials, RagConfig};
use crate::embeddings::{self, SharedEmbedder};
use crate::error::{Error, PipelineStage, Result};
use crate::generation::{GenerationClient, PromptBuilder, WatsonxClient};
use crate::ingestion::{
    collection_name_for_file, collection_name_for_url, validate_collection_name, Segmenter,
    TextExtractor,
};
use crate::retrieval::{EmbeddingIndex, Retriever};
use crate::types::{DocumentSource, IngestResponse, QueryRequest, QueryResponse};

/// Tracks the current stage of one run
struct Run {
    stage: PipelineStage,
}

impl Run {
    fn starting_at(stage: PipelineStage) -> Self {
        tracing::debug!("Pipeline entering {}", stage);
        Self { stage }
    }

    fn advance(&mut self) {
        self.stage = self.stage.next();
        tracing::debug!("Pipeline entering {}", self.stage);
    }

    fn fail(&self, err: Error) -> Error {
        err.at_stage(self.stage)
    }
}

/// Wires extraction, indexing, retrieval and generation together
pub struct RagPipeline {
    config: RagConfig,
    extractor: TextExtractor,
    segmenter: Segmenter,
    index: Arc<EmbeddingIndex>,
    retriever: Retriever,
    generator: Arc<dyn GenerationClient>,
}

impl RagPipeline {
    /// Build a pipeline from explicit components
    pub fn new(
        config: RagConfig,
        embedder: SharedEmbedder,
        generator: Arc<dyn GenerationClient>,
    ) -> Result<Self> {
        let extractor = TextExtractor::new(&config.http)?;
        let segmenter = Segmenter::from_config(&config.segmentation);
        let index = Arc::new(EmbeddingIndex::new(embedder));
        let retriever = Retriever::new(Arc::clone(&index), &config.retrieval);

        tracing::info!(
            "Pipeline ready (embedder: {}, generator: {}, segmentation: {:?})",
            index.embedder().name(),
            generator.name(),
            segmenter.mode()
        );

        Ok(Self {
            config,
            extractor,
            segmenter,
            index,
            retriever,
            generator,
        })
    }

    /// Build the configured embedder and a watsonx.ai client for `credentials`
    pub fn from_config(config: RagConfig, credentials: Arc<Credentials>) -> Result<Self> {
        let embedder = embeddings::from_config(&config.embeddings);
        let generator = Arc::new(WatsonxClient::new(
            credentials,
            config.watsonx.clone(),
            &config.http,
        )?);
        Self::new(config, embedder, generator)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Collection a source lands in when the caller does not name one
    pub fn default_collection(source: &DocumentSource) -> String {
        match source {
            DocumentSource::File(doc) => collection_name_for_file(doc.kind, &doc.filename),
            DocumentSource::Url(url) => collection_name_for_url(url),
        }
    }

    /// Extract, segment and index one source
    #[tracing::instrument(skip(self, source), fields(run_id = %Uuid::new_v4(), source = %source.label()))]
    pub async fn ingest(
        &self,
        source: &DocumentSource,
        collection: Option<&str>,
    ) -> Result<IngestResponse> {
        let start = Instant::now();
        let collection = match collection {
            Some(name) => {
                validate_collection_name(name)?;
                name.to_string()
            }
            None => Self::default_collection(source),
        };

        let mut run = Run::starting_at(PipelineStage::Extracting);
        let text = self
            .extractor
            .extract(source)
            .await
            .map_err(|e| run.fail(e))?;
        tracing::debug!("Extracted {} bytes of text", text.len());

        run.advance();
        let units = self.segmenter.segment(text.as_str(), source.label());
        tracing::debug!("Segmented into {} units", units.len());

        run.advance();
        let written = if self.config.retrieval.prune_stale_units {
            self.index.replace(&collection, &units).await
        } else {
            self.index.upsert(&collection, &units).await
        };
        let summary = written.map_err(|e| run.fail(e))?;

        tracing::info!(
            "Ingested {} ({} units) into {}",
            source.label(),
            units.len(),
            collection
        );

        Ok(IngestResponse {
            collection,
            source: source.label().to_string(),
            kind: source.kind(),
            units_ingested: units.len(),
            collection_size: summary.units,
            ingested_at: Utc::now(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Answer a question from an already indexed collection
    #[tracing::instrument(skip(self, request), fields(run_id = %Uuid::new_v4(), collection = %request.collection))]
    pub async fn ask(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();
        let mut run = Run::starting_at(PipelineStage::Retrieving);

        let k = request.top_k.unwrap_or(self.retriever.default_k());
        let sources = self
            .retriever
            .retrieve(&request.question, &request.collection, k)
            .await
            .map_err(|e| run.fail(e))?;

        run.advance();
        let prompt = PromptBuilder::from_results(&sources, &request.question);
        tracing::debug!("Prompt is {} chars from {} passages", prompt.len(), sources.len());

        run.advance();
        let answer = self
            .generator
            .generate(&prompt, &self.config.generation)
            .await
            .map_err(|e| run.fail(e))?;

        run.advance();
        tracing::info!("Answered in {}ms", start.elapsed().as_millis());

        Ok(QueryResponse::new(
            answer,
            request.collection.clone(),
            sources,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Full pass: ingest `source`, then answer `question` from it
    pub async fn answer_from_source(
        &self,
        source: &DocumentSource,
        question: &str,
        collection: Option<&str>,
    ) -> Result<QueryResponse> {
        let ingested = self.ingest(source, collection).await?;
        let request = QueryRequest::new(question, ingested.collection);
        self.ask(&request).await
    }
}
