//! Collection name derivation.
//!
//! A derived name is `<kind prefix>_<slug>_<hash8>`:
//!
//! * the prefix is `pdf`, `txt` or `web`
//! * the slug is the lower-cased file stem (or URL host and path) with every run of
//!   characters outside `[a-z0-9]` collapsed to `_`, cut to 40 characters
//! * `hash8` is the first 8 hex digits of the SHA-256 of the normalized source key
//!   (lower-cased file name, or the URL without a trailing slash or fragment)
//!
//! The same source always maps to the same collection, so re-ingesting it updates
//! that collection in place. Sources whose slugs collide (`My Report.pdf` and
//! `my-report.pdf`) still land in different collections through the hash.
//! File names are compared case-insensitively: `Report.PDF` and `report.pdf` are the
//! same source.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::SourceKind;

const MAX_SLUG_LEN: usize = 40;

static VALID_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{1,61}[a-zA-Z0-9]$").expect("valid collection name regex")
});

/// Collection name for an uploaded file
pub fn collection_name_for_file(kind: SourceKind, filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
        .trim()
        .to_lowercase();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base.as_str(),
    };

    derive(kind, stem, &base)
}

/// Collection name for a web page
pub fn collection_name_for_url(url: &str) -> String {
    let key = normalize_url(url);
    let without_scheme = key
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(key.as_str())
        .trim_start_matches("www.")
        .to_lowercase();

    derive(SourceKind::Web, &without_scheme, &key)
}

/// Check a caller-supplied collection name
pub fn validate_collection_name(name: &str) -> Result<()> {
    if !VALID_NAME.is_match(name) || name.contains("..") {
        return Err(Error::InvalidRequest(format!(
            "Invalid collection name '{}': use 3-63 characters from [a-zA-Z0-9._-], \
             starting and ending with a letter or digit",
            name
        )));
    }
    Ok(())
}

fn derive(kind: SourceKind, readable: &str, key: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest.truncate(8);

    let slug = slugify(readable);
    if slug.is_empty() {
        format!("{}_{}", kind.prefix(), digest)
    } else {
        format!("{}_{}_{}", kind.prefix(), slug, digest)
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }

    // Only ASCII was pushed, so byte truncation is safe
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('_').to_string()
}

fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split_once('#').map(|(head, _)| head).unwrap_or(url);
    url.trim_end_matches('/').to_string()
}
