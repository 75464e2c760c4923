//! Multi-doc YAML parsing, resource keying, and Live/Proposed pairing.

use helm_preview_core::{Error, Origin, ResourceIdentity, Result};
use serde_json::Value;

mod convert;
mod pair;

pub use convert::yaml_to_json;
pub use pair::{pair_resources, PairStatus, ResourcePair};

/// A raw (pre-normalization) resource document as parsed from a manifest
/// stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResource {
    pub identity: ResourceIdentity,
    pub origin: Origin,
    pub body: Value,
    /// The original YAML text of the document.
    pub raw: String,
}

/// Split a multi-doc YAML stream on `---` lines, preserving each document's
/// raw text. Empty documents are dropped.
pub fn split_documents(yaml_text: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();
    for line in yaml_text.lines() {
        if line.trim_end() == "---" {
            if !current.trim().is_empty() {
                docs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        docs.push(current);
    }
    docs
}

/// Parse a multi-doc YAML stream into resources.
///
/// Documents that are not mappings or that lack `apiVersion`/`kind` are
/// skipped: Helm manifest streams routinely carry comment-only or empty
/// documents. Per-document YAML errors are returned alongside the parsed
/// resources so one broken document does not abort the stream.
pub fn parse_multi_doc(
    yaml_text: &str,
    origin: Origin,
    default_namespace: &str,
) -> (Vec<RawResource>, Vec<Error>) {
    let mut resources = Vec::new();
    let mut errors = Vec::new();
    for raw in split_documents(yaml_text) {
        match parse_single(&raw, origin, default_namespace) {
            Ok(Some(res)) => resources.push(res),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    (resources, errors)
}

/// Parse one YAML document. Returns `Ok(None)` for non-resource documents
/// (no `apiVersion`/`kind`), `Err` for YAML errors and malformed resources.
pub fn parse_single(
    raw: &str,
    origin: Origin,
    default_namespace: &str,
) -> Result<Option<RawResource>> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(raw)?;
    if yaml.is_null() {
        return Ok(None);
    }
    let body = yaml_to_json(yaml);
    let Some(map) = body.as_object() else {
        return Err(Error::MalformedDocument(
            "document root is not a mapping".to_string(),
        ));
    };

    let api_version = map.get("apiVersion").and_then(Value::as_str);
    let kind = map.get("kind").and_then(Value::as_str);
    let (Some(api_version), Some(kind)) = (api_version, kind) else {
        // Not a resource document at all (e.g. rendered NOTES fragments).
        return Ok(None);
    };

    let metadata = map.get("metadata").and_then(Value::as_object);
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::MalformedDocument(format!("{kind} document has no metadata.name"))
        })?;
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or(default_namespace);

    Ok(Some(RawResource {
        identity: ResourceIdentity::new(api_version, kind, namespace, name),
        origin,
        body,
        raw: raw.to_string(),
    }))
}
