//! Source documents and the units they are segmented into

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declared kind of an ingested source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PDF document
    Pdf,
    /// Plain text of unknown encoding
    Text,
    /// HTML page fetched over HTTP
    Web,
}

impl SourceKind {
    /// Detect kind from a file extension
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" => Ok(Self::Text),
            other => Err(Error::UnsupportedSourceKind(format!(".{}", other))),
        }
    }

    /// Detect kind from a filename's extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| Error::UnsupportedSourceKind(format!("'{}' has no extension", filename)))?;
        Self::from_extension(ext)
    }

    /// Short prefix used when deriving collection names
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Web => "web",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Text => "Text File",
            Self::Web => "Web Page",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "text" | "txt" => Ok(Self::Text),
            "web" | "url" | "html" => Ok(Self::Web),
            other => Err(Error::UnsupportedSourceKind(other.to_string())),
        }
    }
}

/// Raw bytes of an uploaded file plus its declared kind.
///
/// Lives for a single request and is dropped once text has been extracted.
#[derive(Debug, Clone)]
pub struct Document {
    /// Declared source kind (never `Web`; pages arrive as [`DocumentSource::Url`])
    pub kind: SourceKind,
    /// Original filename, used for logging and naming
    pub filename: String,
    /// File content
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(kind: SourceKind, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            filename: filename.into(),
            bytes,
        }
    }

    /// Build from a filename, detecting the kind from its extension
    pub fn from_upload(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let filename = filename.into();
        let kind = SourceKind::from_filename(&filename)?;
        Ok(Self::new(kind, filename, bytes))
    }
}

/// Anything the extractor can turn into text
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Uploaded file bytes
    File(Document),
    /// Web page to fetch
    Url(String),
}

impl DocumentSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::File(doc) => doc.kind,
            Self::Url(_) => SourceKind::Web,
        }
    }

    /// Human-readable label (filename or URL)
    pub fn label(&self) -> &str {
        match self {
            Self::File(doc) => &doc.filename,
            Self::Url(url) => url,
        }
    }
}

/// Extracted plain text with source artifacts removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    /// Normalize raw text: non-breaking spaces become spaces, NUL bytes are dropped
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.contains(|c: char| c == '\u{00A0}' || c == '\0') {
            Self(raw.replace('\u{00A0}', " ").replace('\0', ""))
        } else {
            Self(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One retrievable span of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Position index within the source, unique per collection
    pub id: String,
    /// Span text, trimmed
    pub text: String,
    /// `<source>#<index>`
    pub source_ref: String,
}

impl Unit {
    pub fn new(index: usize, text: impl Into<String>, source: &str) -> Self {
        Self {
            id: index.to_string(),
            text: text.into(),
            source_ref: format!("{}#{}", source, index),
        }
    }
}
