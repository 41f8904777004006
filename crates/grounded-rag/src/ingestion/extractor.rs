//! Source text extraction (PDF, plain text, web pages)

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::types::{Document, DocumentSource, NormalizedText, SourceKind};

/// Upper bound on a single pdf-extract run; some fonts make it spin
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Glyph names that leak into pdf-extract output for fonts without a ToUnicode map
static GLYPH_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("uni2010", "-"),
        ("uni2011", "-"),
        ("uni2013", "-"),
        ("uni2014", "--"),
        ("uni2018", "'"),
        ("uni2019", "'"),
        ("uni201C", "\""),
        ("uni201D", "\""),
        ("uni2022", "* "),
        ("uni2026", "..."),
        ("uni00A0", " "),
        ("uni2212", "-"),
        ("f_f_i", "ffi"),
        ("f_f_l", "ffl"),
        ("f_i", "fi"),
        ("f_l", "fl"),
        ("f_f", "ff"),
    ])
});

/// Typographic characters folded to ASCII after extraction
const TYPOGRAPHIC: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Turns any [`DocumentSource`] into [`NormalizedText`].
///
/// Holds a reusable HTTP client for web sources; file sources never touch the network.
#[derive(Clone)]
pub struct TextExtractor {
    client: reqwest::Client,
}

impl TextExtractor {
    /// Build an extractor with the configured fetch timeout and user agent
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Extract text from a source
    pub async fn extract(&self, source: &DocumentSource) -> Result<NormalizedText> {
        match source {
            DocumentSource::File(doc) => self.extract_file(doc).await,
            DocumentSource::Url(url) => self.extract_url(url).await,
        }
    }

    async fn extract_file(&self, doc: &Document) -> Result<NormalizedText> {
        match doc.kind {
            SourceKind::Pdf => {
                let bytes = doc.bytes.clone();
                let name = doc.filename.clone();
                tokio::task::spawn_blocking(move || extract_pdf(&name, &bytes))
                    .await
                    .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))?
            }
            SourceKind::Text => Ok(decode_text(&doc.bytes)),
            SourceKind::Web => Err(Error::UnsupportedSourceKind(format!(
                "'{}' is a file upload declared as a web page",
                doc.filename
            ))),
        }
    }

    async fn extract_url(&self, url: &str) -> Result<NormalizedText> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Fetching {} returned HTTP {}", url, status.as_u16());
            return Err(Error::Fetch {
                status_code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let text = paragraph_text(&body)?;
        tracing::debug!("Fetched {} ({} bytes of paragraph text)", url, text.len());
        Ok(text)
    }
}

/// Decode bytes as ISO-8859-1; every byte is a valid code point so this never fails
pub fn decode_text(bytes: &[u8]) -> NormalizedText {
    NormalizedText::new(bytes.iter().map(|&b| b as char).collect::<String>())
}

/// Join the text of every `<p>` element in document order with single spaces
pub fn paragraph_text(html: &str) -> Result<NormalizedText> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p")
        .map_err(|e| Error::internal(format!("Invalid paragraph selector: {:?}", e)))?;

    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .collect();

    Ok(NormalizedText::new(paragraphs.join(" ")))
}

/// Extract PDF text in page order.
///
/// pdf-extract runs on its own thread with a timeout; on error, panic or timeout
/// the lopdf page-by-page extractor takes over.
pub fn extract_pdf(name: &str, data: &[u8]) -> Result<NormalizedText> {
    let owned = data.to_vec();
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&owned));
    });

    let raw = match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
        Ok(Ok(text)) => {
            let _ = handle.join();
            text
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", name, e);
            extract_pdf_fallback(name, data)?
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!(
                "pdf-extract timed out after {}s on {}, trying lopdf",
                PDF_EXTRACT_TIMEOUT.as_secs(),
                name
            );
            extract_pdf_fallback(name, data)?
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("pdf-extract thread crashed on {}, trying lopdf", name);
            extract_pdf_fallback(name, data)?
        }
    };

    let cleaned = cleanup_pdf_text(&raw);
    if cleaned.trim().is_empty() {
        return Err(Error::extraction(
            name,
            "PDF has no extractable text (image-based or encrypted)",
        ));
    }

    Ok(NormalizedText::new(cleaned))
}

fn extract_pdf_fallback(name: &str, data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::extraction(name, format!("Not a valid PDF: {}", e)))?;

    let mut pages = Vec::new();
    // get_pages() is keyed by page number, so iteration is in page order
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => tracing::debug!("No text on page {} of {}: {}", page_number, name, e),
        }
    }

    Ok(pages.join("\n"))
}

/// Replace leaked glyph names and typographic characters, drop blank lines
fn cleanup_pdf_text(text: &str) -> String {
    let mut result = text.replace('\0', "");

    // Longest names first so "f_f_i" is not consumed as "f_f" + "i"
    let mut names: Vec<_> = GLYPH_NAMES.iter().collect();
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    for (glyph, replacement) in names {
        result = result.replace(&format!("/{}", glyph), replacement);
        result = result.replace(&format!("<{}>", glyph), replacement);
    }

    for (ch, replacement) in TYPOGRAPHIC {
        if result.contains(*ch) {
            result = result.replace(*ch, replacement);
        }
    }

    result
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1() {
        let text = decode_text(&[b'c', b'a', b'f', 0xE9, 0xA0, b'!']);
        assert_eq!(text.as_str(), "café !");
    }

    #[test]
    fn test_decode_never_fails_on_binary() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = decode_text(&bytes);
        // NUL is removed and NBSP folded; everything else maps one-to-one
        assert_eq!(text.as_str().chars().count(), 255);
    }

    #[test]
    fn test_paragraph_text_joins_in_order() {
        let html = r#"<html><head><title>EV</title></head><body>
            <h1>Electric vehicles</h1>
            <p>Electric vehicles use&nbsp;batteries.</p>
            <div><p>They have <b>no</b> tailpipe.</p></div>
            <span>ignored</span>
        </body></html>"#;
        let text = paragraph_text(html).unwrap();
        assert_eq!(
            text.as_str(),
            "Electric vehicles use batteries. They have no tailpipe."
        );
    }

    #[test]
    fn test_paragraph_text_without_paragraphs_is_empty() {
        let text = paragraph_text("<html><body><div>nothing</div></body></html>").unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let err = extract_pdf("broken.pdf", b"this is not a pdf").unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_cleanup_pdf_text() {
        let cleaned = cleanup_pdf_text("  \u{FB01}nal  \n\n\u{201C}quoted\u{201D}\0\n");
        assert_eq!(cleaned, "final\n\"quoted\"");
    }

    #[tokio::test]
    async fn test_web_declared_upload_is_rejected() {
        let extractor = TextExtractor::new(&HttpConfig::default()).unwrap();
        let doc = Document::new(SourceKind::Web, "page.html", b"<p>x</p>".to_vec());
        let err = extractor
            .extract(&DocumentSource::File(doc))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSourceKind(_)));
    }
}
