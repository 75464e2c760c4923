//! Document normalizer: strips server-managed noise, canonicalizes scalar
//! representations, sorts semantically unordered lists, and captures
//! ownership-relevant metadata before any of that happens.
//!
//! Normalization is idempotent: re-normalizing a normalized document yields
//! the same document.

mod meta;
mod noise;
mod sort;

pub use meta::capture_ownership_meta;

use helm_preview_core::{
    Error, KindTable, NoiseRule, Origin, ResourceDocument, ResourceIdentity, Result,
};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Prefix of the placeholder written over masked values (Secret contents).
pub const MASK_PLACEHOLDER: &str = "***";

/// Replace a masked value with a placeholder derived from its content.
///
/// The placeholder carries a short digest so a rotated value still diffs as
/// a modification while the content itself stays hidden. Already-masked
/// values pass through unchanged, keeping normalization idempotent.
pub fn mask_value(value: &Value) -> Value {
    if let Value::String(s) = value {
        if is_masked(s) {
            return value.clone();
        }
    }
    let digest = match value {
        Value::String(s) => Sha256::digest(s.as_bytes()),
        other => Sha256::digest(other.to_string().as_bytes()),
    };
    let hex = format!("{digest:x}");
    Value::String(format!("{MASK_PLACEHOLDER} sha256:{}", &hex[..8]))
}

fn is_masked(s: &str) -> bool {
    s.strip_prefix(MASK_PLACEHOLDER)
        .and_then(|rest| rest.strip_prefix(" sha256:"))
        .is_some_and(|hex| hex.len() == 8 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Normalize one raw resource body into a canonical [`ResourceDocument`].
///
/// Unknown kinds fall back to the table's common baseline rules; that is not
/// an error. `extra_rules` come from operator configuration
/// (`--ignore-path`) and apply after the table rules.
pub fn normalize(
    identity: ResourceIdentity,
    origin: Origin,
    body: Value,
    table: &KindTable,
    extra_rules: &[NoiseRule],
) -> Result<ResourceDocument> {
    let Some(root) = body.as_object() else {
        return Err(Error::MalformedDocument(
            "document root is not a mapping".to_string(),
        ));
    };
    for field in ["apiVersion", "kind"] {
        if !root.contains_key(field) {
            return Err(Error::MalformedDocument(format!("missing {field}")));
        }
    }

    if !table.is_known(&identity.kind) {
        tracing::debug!(kind = %identity.kind, "unknown kind, using baseline rules");
    }
    let rules = table.rules_for(&identity.kind);

    let ownership = capture_ownership_meta(&body);

    let mut body = body;
    for rule in rules.noise.iter().chain(extra_rules) {
        noise::apply_rule(&mut body, rule);
    }
    let mut body = canonicalize(body);
    for rule in &rules.unordered {
        sort::sort_unordered(&mut body, rule);
    }

    Ok(ResourceDocument {
        identity,
        origin,
        body,
        ownership,
    })
}

/// Recursively canonicalize a value tree: drop null mapping values (null is
/// equivalent to absent), and normalize scalar representations so that
/// `"80"` and `80`, `"true"` and `true` compare equal.
///
/// Mapping keys are already sorted by the BTreeMap-backed `serde_json::Map`.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                out.insert(k, canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        Value::String(s) => canonical_scalar(s),
        other => other,
    }
}

fn canonical_scalar(s: String) -> Value {
    // Integer-like strings carry no representation intent: "80" means 80 and
    // "-5" means -5. Floats are left alone so image tags like "1.29" stay
    // strings.
    let digits = s.strip_prefix('-').unwrap_or(&s);
    if (1..19).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Number(i.into());
        }
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => Value::Bool(true),
        "false" | "no" => Value::Bool(false),
        _ => Value::String(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_preview_core::Origin;
    use helm_preview_manifest::parse_single;
    use indoc::indoc;
    use similar_asserts::assert_eq as sim_assert_eq;

    fn normalized(yaml: &str) -> ResourceDocument {
        let raw = parse_single(yaml, Origin::Live, "default")
            .expect("parse")
            .expect("resource");
        normalize(
            raw.identity,
            raw.origin,
            raw.body,
            &KindTable::builtin(),
            &[],
        )
        .expect("normalize")
    }

    #[test]
    fn strips_server_managed_fields() {
        let doc = normalized(indoc! {r#"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
              uid: 1234-5678
              resourceVersion: "998877"
              generation: 4
              creationTimestamp: "2024-01-01T00:00:00Z"
              annotations:
                meta.helm.sh/release-name: my-release
                deployment.kubernetes.io/revision: "3"
                keep.me/annotation: "yes"
              labels:
                helm.sh/chart: web-1.2.3
                app: web
            status:
              readyReplicas: 3
            spec:
              replicas: 3
        "#});
        let meta = doc.body.get("metadata").unwrap();
        assert!(meta.get("uid").is_none());
        assert!(meta.get("resourceVersion").is_none());
        assert!(meta.get("generation").is_none());
        assert!(meta.get("creationTimestamp").is_none());
        assert!(doc.body.get("status").is_none());
        let annotations = meta.get("annotations").unwrap().as_object().unwrap();
        assert!(!annotations.contains_key("meta.helm.sh/release-name"));
        assert!(!annotations.contains_key("deployment.kubernetes.io/revision"));
        assert!(annotations.contains_key("keep.me/annotation"));
        let labels = meta.get("labels").unwrap().as_object().unwrap();
        assert!(!labels.contains_key("helm.sh/chart"));
        assert!(labels.contains_key("app"));
    }

    #[test]
    fn ownership_metadata_survives_stripping() {
        let doc = normalized(indoc! {r#"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
              annotations:
                meta.helm.sh/release-name: my-release
              labels:
                app.kubernetes.io/managed-by: Helm
                app.kubernetes.io/instance: my-release
            spec:
              replicas: 1
        "#});
        assert_eq!(doc.ownership.release.as_deref(), Some("my-release"));
        assert_eq!(doc.ownership.managed_by.as_deref(), Some("Helm"));
    }

    #[test]
    fn masks_secret_data() {
        let doc = normalized(indoc! {"
            apiVersion: v1
            kind: Secret
            metadata:
              name: creds
            data:
              password: aHVudGVyMg==
            stringData:
              token: plaintext
        "});
        let password = doc.body["data"]["password"].as_str().unwrap();
        let token = doc.body["stringData"]["token"].as_str().unwrap();
        assert!(password.starts_with(MASK_PLACEHOLDER), "{password}");
        assert!(token.starts_with(MASK_PLACEHOLDER), "{token}");
        assert!(!password.contains("aHVudGVyMg"));
        assert!(!token.contains("plaintext"));
    }

    #[test]
    fn rotated_secret_values_mask_differently() {
        let secret = |value: &str| {
            normalized(&format!(
                "apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds\ndata:\n  password: {value}\n"
            ))
        };
        let old = secret("b2xkLXZhbHVl");
        let new = secret("bmV3LXZhbHVl");
        let same = secret("b2xkLXZhbHVl");
        assert_ne!(old.body["data"]["password"], new.body["data"]["password"]);
        assert_eq!(old.body["data"]["password"], same.body["data"]["password"]);
    }

    #[test]
    fn canonicalizes_scalars_and_drops_nulls() {
        let doc = normalized(indoc! {r#"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: cm
              namespace: default
            data:
              port: "80"
              offset: "-5"
              dash: "-"
              enabled: "true"
              tag: "1.29"
              gone: null
        "#});
        assert_eq!(doc.body["data"]["port"], Value::Number(80.into()));
        assert_eq!(doc.body["data"]["offset"], Value::Number((-5).into()));
        assert_eq!(doc.body["data"]["dash"], Value::String("-".to_string()));
        assert_eq!(doc.body["data"]["enabled"], Value::Bool(true));
        assert_eq!(doc.body["data"]["tag"], Value::String("1.29".to_string()));
        assert!(doc.body["data"].get("gone").is_none());
    }

    #[test]
    fn sorts_unordered_lists_keeps_container_order() {
        let doc = normalized(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
            spec:
              template:
                spec:
                  containers:
                    - name: zeta
                      env:
                        - name: B_VAR
                          value: b
                        - name: A_VAR
                          value: a
                    - name: alpha
                  volumes:
                    - name: z-vol
                    - name: a-vol
        "});
        let containers = doc.body["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        // container list is semantically ordered
        assert_eq!(containers[0]["name"], "zeta");
        let env = containers[0]["env"].as_array().unwrap();
        assert_eq!(env[0]["name"], "A_VAR");
        assert_eq!(env[1]["name"], "B_VAR");
        let volumes = doc.body["spec"]["template"]["spec"]["volumes"]
            .as_array()
            .unwrap();
        assert_eq!(volumes[0]["name"], "a-vol");
        assert_eq!(volumes[1]["name"], "z-vol");
    }

    #[test]
    fn normalization_is_idempotent() {
        let doc = normalized(indoc! {r#"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
              resourceVersion: "1"
            spec:
              replicas: "3"
              template:
                spec:
                  volumes:
                    - name: b
                    - name: a
        "#});
        let again = normalize(
            doc.identity.clone(),
            doc.origin,
            doc.body.clone(),
            &KindTable::builtin(),
            &[],
        )
        .expect("re-normalize");
        sim_assert_eq!(doc.body, again.body);
    }

    #[test]
    fn unknown_kind_falls_back_to_baseline() {
        let doc = normalized(indoc! {r#"
            apiVersion: example.com/v1
            kind: Widget
            metadata:
              name: w
              resourceVersion: "7"
            spec:
              size: 1
            status:
              phase: Ready
        "#});
        assert!(doc.body.get("status").is_none());
        assert!(doc.body["metadata"].get("resourceVersion").is_none());
    }
}
