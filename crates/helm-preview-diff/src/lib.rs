//! Structural diff engine over normalized resource documents.
//!
//! Mappings diff by key-set difference; unordered lists match elements by
//! their registered identity key; ordered lists align via LCS; scalars
//! compare post-normalization. Changes under per-kind immutable paths are
//! reported as `RequiresReplace`. Output entry order is a stable sort by
//! field path, so identical inputs always produce identical output.

mod lcs;

use helm_preview_core::{
    ChangeEntry, EntryChange, FieldPath, KindRules, NoiseAction, ResourceChange, ResourceDiff,
    ResourceDocument, ResourceIdentity,
};
use serde_json::Value;
use std::collections::BTreeSet;

/// Bounds guarding against pathological input documents. Exceeding a bound
/// marks the diff truncated instead of failing the run.
#[derive(Debug, Clone, Copy)]
pub struct DiffLimits {
    pub max_depth: usize,
    pub max_list_len: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_list_len: 512,
        }
    }
}

/// Diff a matched pair of normalized documents. Returns `None` only when both
/// sides are absent.
pub fn diff_pair(
    identity: &ResourceIdentity,
    live: Option<&ResourceDocument>,
    proposed: Option<&ResourceDocument>,
    rules: &KindRules,
    limits: &DiffLimits,
) -> Option<ResourceDiff> {
    match (live, proposed) {
        (None, None) => None,
        (None, Some(_)) => Some(ResourceDiff::new(identity.clone(), ResourceChange::Added)),
        (Some(_), None) => Some(ResourceDiff::new(identity.clone(), ResourceChange::Removed)),
        (Some(live), Some(proposed)) => {
            let mut differ = Differ {
                rules,
                limits,
                entries: Vec::new(),
                truncated: false,
            };
            differ.walk(&FieldPath::root(), &live.body, &proposed.body);

            let mut diff = ResourceDiff::new(
                identity.clone(),
                if differ.entries.is_empty() && !differ.truncated {
                    ResourceChange::Unchanged
                } else {
                    ResourceChange::Modified
                },
            );
            differ
                .entries
                .sort_by(|a, b| a.path.cmp(&b.path).then(a.change.cmp(&b.change)));
            diff.entries = differ.entries;
            diff.truncated = differ.truncated;
            if diff.truncated {
                tracing::warn!(identity = %identity, "diff truncated by limits");
            }
            Some(diff)
        }
    }
}

struct Differ<'a> {
    rules: &'a KindRules,
    limits: &'a DiffLimits,
    entries: Vec<ChangeEntry>,
    truncated: bool,
}

impl Differ<'_> {
    fn walk(&mut self, path: &FieldPath, old: &Value, new: &Value) {
        if old == new {
            return;
        }
        if self.rules.noise_action_for(path) == Some(NoiseAction::Ignore) {
            return;
        }
        if path.depth() >= self.limits.max_depth {
            self.truncated = true;
            self.emit(path.clone(), EntryChange::Modified, None, None);
            return;
        }

        match (old, new) {
            (Value::Object(o), Value::Object(n)) => {
                let keys: BTreeSet<&String> = o.keys().chain(n.keys()).collect();
                for key in keys {
                    let child = path.key(key.clone());
                    match (o.get(key.as_str()), n.get(key.as_str())) {
                        (Some(ov), Some(nv)) => self.walk(&child, ov, nv),
                        (Some(ov), None) => self.emit(
                            child,
                            EntryChange::Removed,
                            Some(ov.clone()),
                            None,
                        ),
                        (None, Some(nv)) => {
                            self.emit(child, EntryChange::Added, None, Some(nv.clone()))
                        }
                        (None, None) => unreachable!("key came from one of the two maps"),
                    }
                }
            }
            (Value::Array(o), Value::Array(n)) => {
                if o.len() > self.limits.max_list_len || n.len() > self.limits.max_list_len {
                    self.truncated = true;
                    self.emit(path.clone(), EntryChange::Modified, None, None);
                    return;
                }
                match self.rules.unordered_key_for(path).map(str::to_string) {
                    Some(key) => self.diff_unordered(path, o, n, &key),
                    None => self.diff_ordered(path, o, n),
                }
            }
            _ if same_scalar_type(old, new) => self.emit(
                path.clone(),
                EntryChange::Modified,
                Some(old.clone()),
                Some(new.clone()),
            ),
            _ => self.emit(
                path.clone(),
                EntryChange::TypeChanged,
                Some(old.clone()),
                Some(new.clone()),
            ),
        }
    }

    /// Identity-keyed matching for unordered lists. Elements without the key
    /// (or with a duplicated key) fall back to positional handling.
    fn diff_unordered(&mut self, path: &FieldPath, old: &[Value], new: &[Value], key: &str) {
        let (old_keyed, old_rest) = partition_keyed(old, key);
        let (new_keyed, new_rest) = partition_keyed(new, key);

        let idents: BTreeSet<&String> = old_keyed.keys().chain(new_keyed.keys()).collect();
        for ident in idents {
            let child = path.matched(key, ident.clone());
            match (old_keyed.get(ident), new_keyed.get(ident)) {
                (Some(ov), Some(nv)) => self.walk(&child, ov, nv),
                (Some(ov), None) => {
                    self.emit(child, EntryChange::Removed, Some((*ov).clone()), None)
                }
                (None, Some(nv)) => {
                    self.emit(child, EntryChange::Added, None, Some((*nv).clone()))
                }
                (None, None) => unreachable!("ident came from one of the two maps"),
            }
        }

        for (i, ov) in &old_rest {
            self.emit(path.index(*i), EntryChange::Removed, Some((*ov).clone()), None);
        }
        for (j, nv) in &new_rest {
            self.emit(path.index(*j), EntryChange::Added, None, Some((*nv).clone()));
        }
    }

    /// LCS alignment for ordered lists; the gaps between matches are paired
    /// positionally and recursed into, leftovers become Added/Removed.
    fn diff_ordered(&mut self, path: &FieldPath, old: &[Value], new: &[Value]) {
        let matched = lcs::align(old, new);

        let mut oi = 0;
        let mut nj = 0;
        for &(mi, mj) in matched.iter().chain(std::iter::once(&(old.len(), new.len()))) {
            let mut gap_old = oi..mi;
            let mut gap_new = nj..mj;
            loop {
                match (gap_old.next(), gap_new.next()) {
                    (Some(i), Some(j)) => {
                        // min(i, j) is symmetric under swapping the inputs.
                        self.walk(&path.index(i.min(j)), &old[i], &new[j]);
                    }
                    (Some(i), None) => self.emit(
                        path.index(i),
                        EntryChange::Removed,
                        Some(old[i].clone()),
                        None,
                    ),
                    (None, Some(j)) => self.emit(
                        path.index(j),
                        EntryChange::Added,
                        None,
                        Some(new[j].clone()),
                    ),
                    (None, None) => break,
                }
            }
            oi = mi + 1;
            nj = mj + 1;
        }
    }

    fn emit(
        &mut self,
        path: FieldPath,
        change: EntryChange,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) {
        if self.rules.noise_action_for(&path) == Some(NoiseAction::Ignore) {
            return;
        }
        let change = if self.rules.is_immutable(&path) {
            EntryChange::RequiresReplace
        } else {
            change
        };
        self.entries
            .push(ChangeEntry::new(path, change, old_value, new_value));
    }
}

fn same_scalar_type(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Null, Value::Null)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
    )
}

fn partition_keyed<'v>(
    items: &'v [Value],
    key: &str,
) -> (
    std::collections::BTreeMap<String, &'v Value>,
    Vec<(usize, &'v Value)>,
) {
    let mut keyed = std::collections::BTreeMap::new();
    let mut rest = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match item.as_object().and_then(|o| o.get(key)).map(display_key) {
            Some(k) if !keyed.contains_key(&k) => {
                keyed.insert(k, item);
            }
            _ => rest.push((i, item)),
        }
    }
    (keyed, rest)
}

fn display_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests;
