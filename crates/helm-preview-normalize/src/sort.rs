//! Sorting semantically unordered lists by their identity key.

use helm_preview_core::{ListKeyRule, ListSeg};
use serde_json::Value;

/// Sort every list addressed by `rule` in place, by the canonical string of
/// each element's identity key. Elements without the key keep their relative
/// order and sort first; the sort is stable, so re-sorting is a no-op.
pub fn sort_unordered(body: &mut Value, rule: &ListKeyRule) {
    descend(body, rule.segments(), &rule.key);
}

fn descend(value: &mut Value, segs: &[ListSeg], key: &str) {
    let Some((head, rest)) = segs.split_first() else {
        if let Some(arr) = value.as_array_mut() {
            arr.sort_by_key(|item| sort_key(item, key));
        }
        return;
    };
    match head {
        ListSeg::Key(k) => {
            if let Some(child) = value.as_object_mut().and_then(|m| m.get_mut(k)) {
                descend(child, rest, key);
            }
        }
        ListSeg::AnyItem => {
            if let Some(arr) = value.as_array_mut() {
                for item in arr {
                    descend(item, rest, key);
                }
            }
        }
    }
}

fn sort_key(item: &Value, key: &str) -> Option<String> {
    let v = item.as_object()?.get(key)?;
    // BTreeMap-backed maps serialize with sorted keys, so this is canonical.
    serde_json::to_string(v).ok()
}
