//! Conditional request evaluation (ETag, `If-None-Match`, `If-Match`).
//!
//! An ETag is the lowercase hex SHA-256 of a document's canonical JSON
//! bytes. It is never stored; every request recomputes it from the current
//! representation.
//!
//! Read evaluation order:
//!
//! ```text
//! If-None-Match == etag        -> NotModified          (checked first)
//! If-Match present and != etag -> PreconditionFailed
//! otherwise                    -> Fresh { body, etag }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Client-supplied cache validators, already trimmed.
///
/// A header that is absent, or empty after trimming, is stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    if_none_match: Option<String>,
    if_match: Option<String>,
}

impl Validators {
    pub fn new(if_none_match: Option<&str>, if_match: Option<&str>) -> Self {
        Self {
            if_none_match: normalize(if_none_match),
            if_match: normalize(if_match),
        }
    }

    /// No validators supplied.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }

    pub fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }
}

fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Result of evaluating a read against the client's validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// The client's cached copy is current. No body.
    NotModified,
    /// The client's expected version is stale. No body.
    PreconditionFailed,
    /// Return the full representation stamped with its ETag.
    Fresh { body: T, etag: String },
}

/// Decide how to answer a read of `current` given the client's validators.
pub fn evaluate_read<T: Serialize>(current: T, validators: &Validators) -> ReadOutcome<T> {
    let etag = compute_etag(&current);

    if validators.if_none_match() == Some(etag.as_str()) {
        return ReadOutcome::NotModified;
    }

    if let Some(expected) = validators.if_match() {
        if expected != etag {
            return ReadOutcome::PreconditionFailed;
        }
    }

    ReadOutcome::Fresh {
        body: current,
        etag,
    }
}

/// ETag for a freshly created representation, exactly as persisted.
pub fn stamp_on_create<T: Serialize>(representation: &T) -> String {
    compute_etag(representation)
}

/// Compute the ETag of a document.
///
/// Serialization failures degrade to an empty string (logged) rather than
/// failing the request. Use [`try_compute_etag`] to surface the error.
pub fn compute_etag<T: Serialize>(doc: &T) -> String {
    match try_compute_etag(doc) {
        Ok(etag) => etag,
        Err(e) => {
            warn!(error = %e, "failed to serialize document for etag; sending empty etag");
            String::new()
        }
    }
}

/// Compute the ETag of a document, reporting serialization failures.
pub fn try_compute_etag<T: Serialize>(doc: &T) -> Result<String, serde_json::Error> {
    let bytes = canonical_bytes(doc)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Canonical JSON encoding: compact, with every object's keys sorted.
///
/// Key order in the input (or in `serde_json::Map`'s backing store) never
/// affects the output.
pub fn canonical_bytes<T: Serialize>(doc: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(doc)?;
    serde_json::to_vec(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
