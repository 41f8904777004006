//! Ingestion endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Document, DocumentSource, IngestResponse, IngestUrlRequest, SourceKind};

/// POST /api/ingest - upload one PDF or text file.
///
/// Fields: `file` (required), `collection` (optional), `kind` (optional, overrides
/// the extension).
pub async fn ingest_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut collection: Option<String> = None;
    let mut kind: Option<SourceKind> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "collection" => {
                let value = field.text().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read collection: {}", e))
                })?;
                let value = value.trim();
                if !value.is_empty() {
                    collection = Some(value.to_string());
                }
            }
            "kind" => {
                let value = field.text().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read kind: {}", e))
                })?;
                kind = Some(value.trim().parse()?);
            }
            "file" => {
                if upload.is_some() {
                    return Err(Error::InvalidRequest(
                        "Upload one file per request".to_string(),
                    ));
                }
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::InvalidRequest("File field has no filename".to_string()))?;
                let data = field.bytes().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read {}: {}", filename, e))
                })?;
                upload = Some((filename, data.to_vec()));
            }
            other => {
                tracing::debug!("Ignoring multipart field '{}'", other);
            }
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| Error::InvalidRequest("Missing 'file' field".to_string()))?;

    tracing::info!("Processing upload: {} ({} bytes)", filename, bytes.len());

    let document = match kind {
        Some(SourceKind::Web) => {
            return Err(Error::UnsupportedSourceKind(
                "web pages are ingested through /api/ingest/url".to_string(),
            ))
        }
        Some(kind) => Document::new(kind, filename, bytes),
        None => Document::from_upload(filename, bytes)?,
    };

    let source = DocumentSource::File(document);
    let response = state
        .pipeline()
        .ingest(&source, collection.as_deref())
        .await?;
    Ok(Json(response))
}

/// POST /api/ingest/url - fetch and ingest a web page
pub async fn ingest_url(
    State(state): State<AppState>,
    Json(request): Json<IngestUrlRequest>,
) -> Result<Json<IngestResponse>> {
    let url = request.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::InvalidRequest(format!(
            "Expected an http(s) URL, got '{}'",
            url
        )));
    }

    tracing::info!("Ingesting page: {}", url);

    let source = DocumentSource::Url(url.to_string());
    let response = state
        .pipeline()
        .ingest(&source, request.collection.as_deref())
        .await?;
    Ok(Json(response))
}
