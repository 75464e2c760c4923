//! Ownership-relevant metadata capture. Runs against the raw body, before
//! noise stripping, so release identity annotations are still present.

use helm_preview_core::{OwnerRef, OwnershipMeta};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn capture_ownership_meta(body: &Value) -> OwnershipMeta {
    let metadata = body.get("metadata");
    let labels = string_map(metadata.and_then(|m| m.get("labels")));
    let annotations = string_map(metadata.and_then(|m| m.get("annotations")));

    let owner_refs = metadata
        .and_then(|m| m.get("ownerReferences"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    Some(OwnerRef {
                        api_version: r.get("apiVersion")?.as_str()?.to_string(),
                        kind: r.get("kind")?.as_str()?.to_string(),
                        name: r.get("name")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let flux_managed = labels
        .keys()
        .chain(annotations.keys())
        .any(|k| k.contains("fluxcd.io"));

    let argocd_app = annotations
        .get("argocd.argoproj.io/managed-by")
        .or_else(|| labels.get("argocd.argoproj.io/instance"))
        .cloned();

    let spec = body.get("spec");
    let selector = spec
        .and_then(|s| s.get("selector"))
        .map(|sel| {
            // Workloads nest under matchLabels; Services use a flat map.
            sel.get("matchLabels")
                .map_or_else(|| string_map(Some(sel)), |ml| string_map(Some(ml)))
        })
        .unwrap_or_default();
    let template_labels = string_map(
        spec.and_then(|s| s.get("template"))
            .and_then(|t| t.get("metadata"))
            .and_then(|m| m.get("labels")),
    );

    OwnershipMeta {
        owner_refs,
        managed_by: labels.get("app.kubernetes.io/managed-by").cloned(),
        release: annotations.get("meta.helm.sh/release-name").cloned(),
        instance: labels.get("app.kubernetes.io/instance").cloned(),
        flux_managed,
        argocd_app,
        labels,
        selector,
        template_labels,
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(map) = value.and_then(Value::as_object) {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                out.insert(k.clone(), s.to_string());
            } else if v.is_number() || v.is_boolean() {
                out.insert(k.clone(), v.to_string());
            }
        }
    }
    out
}
