//! Per-kind capability table: noise-field rules, immutable-field lists, and
//! unordered-list identity keys. Behavior for a new kind is added by
//! registering table entries, not by implementing a trait.

use crate::path::{FieldPath, PathElem};
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// What to do with a field matching a noise rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseAction {
    /// Remove the field from the normalized document.
    Strip,
    /// Keep the field in the document but exclude it from diffing.
    Ignore,
    /// Replace scalar values with a fixed placeholder before diffing.
    Mask,
}

#[derive(Debug, Clone)]
enum NoiseSeg {
    Literal(String),
    Glob { pattern: String, re: Regex },
}

impl NoiseSeg {
    fn matches(&self, key: &str) -> bool {
        match self {
            NoiseSeg::Literal(lit) => lit == key,
            NoiseSeg::Glob { re, .. } => re.is_match(key),
        }
    }
}

/// A dot-path pattern over mapping keys. Literal dots inside a key are
/// backslash-escaped (`metadata.annotations.meta\.helm\.sh/*`); `*` and `?`
/// glob within a single segment.
#[derive(Debug, Clone)]
pub struct NoisePath {
    pattern: String,
    segs: Vec<NoiseSeg>,
}

impl NoisePath {
    pub fn parse(pattern: &str) -> Result<Self> {
        let raw = split_escaped_dots(pattern);
        if raw.iter().any(String::is_empty) {
            return Err(Error::InvalidNoisePath {
                pattern: pattern.to_string(),
                reason: "empty segment".to_string(),
            });
        }
        let mut segs = Vec::with_capacity(raw.len());
        for seg in raw {
            if seg.contains('*') || seg.contains('?') {
                let re = glob_to_regex(&seg).map_err(|e| Error::InvalidNoisePath {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
                segs.push(NoiseSeg::Glob { pattern: seg, re });
            } else {
                segs.push(NoiseSeg::Literal(seg));
            }
        }
        Ok(Self {
            pattern: pattern.to_string(),
            segs,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a chain of mapping keys exactly against this pattern.
    pub fn matches_keys(&self, keys: &[&str]) -> bool {
        self.segs.len() == keys.len()
            && self.segs.iter().zip(keys).all(|(s, k)| s.matches(k))
    }

    /// Whether this pattern is a key-chain prefix of a concrete field path.
    /// A list index where a key segment is expected never matches.
    pub fn is_prefix_of(&self, path: &FieldPath) -> bool {
        if path.0.len() < self.segs.len() {
            return false;
        }
        self.segs.iter().zip(&path.0).all(|(seg, elem)| match elem {
            PathElem::Key(k) => seg.matches(k),
            _ => false,
        })
    }

    /// Whether the pattern segment at `level` matches `key`. `None` when the
    /// pattern is shorter than `level`.
    pub fn segment_matches(&self, level: usize, key: &str) -> Option<bool> {
        self.segs.get(level).map(|s| s.matches(key))
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }
}

fn split_escaped_dots(pattern: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                cur.push('.');
            }
            '.' => {
                out.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

fn glob_to_regex(glob: &str) -> std::result::Result<Regex, regex::Error> {
    let mut re = String::with_capacity(glob.len() + 4);
    re.push('^');
    for c in glob.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// A noise-field rule: pattern plus action.
#[derive(Debug, Clone)]
pub struct NoiseRule {
    pub path: NoisePath,
    pub action: NoiseAction,
}

impl NoiseRule {
    pub fn strip(pattern: &str) -> Result<Self> {
        Ok(Self {
            path: NoisePath::parse(pattern)?,
            action: NoiseAction::Strip,
        })
    }

    pub fn ignore(pattern: &str) -> Result<Self> {
        Ok(Self {
            path: NoisePath::parse(pattern)?,
            action: NoiseAction::Ignore,
        })
    }

    pub fn mask(pattern: &str) -> Result<Self> {
        Ok(Self {
            path: NoisePath::parse(pattern)?,
            action: NoiseAction::Mask,
        })
    }
}

/// Identity key for a semantically unordered list, addressed by a path
/// pattern where `*` stands for "each list element".
#[derive(Debug, Clone)]
pub struct ListKeyRule {
    pattern: Vec<ListSeg>,
    pub key: String,
}

/// One segment of an unordered-list path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSeg {
    Key(String),
    AnyItem,
}

impl ListKeyRule {
    pub fn new(pattern: &str, key: &str) -> Self {
        let pattern = pattern
            .split('.')
            .map(|seg| {
                if seg == "*" {
                    ListSeg::AnyItem
                } else {
                    ListSeg::Key(seg.to_string())
                }
            })
            .collect();
        Self {
            pattern,
            key: key.to_string(),
        }
    }

    /// Match the path of a list container, e.g.
    /// `spec.template.spec.containers[0].env` against
    /// `spec.template.spec.containers.*.env`.
    pub fn matches(&self, list_path: &FieldPath) -> bool {
        if self.pattern.len() != list_path.0.len() {
            return false;
        }
        self.pattern
            .iter()
            .zip(&list_path.0)
            .all(|(pat, elem)| match (pat, elem) {
                (ListSeg::Key(k), PathElem::Key(e)) => k == e,
                (ListSeg::AnyItem, PathElem::Index(_))
                | (ListSeg::AnyItem, PathElem::Match { .. }) => true,
                _ => false,
            })
    }

    pub fn segments(&self) -> &[ListSeg] {
        &self.pattern
    }
}

/// The rules applying to one kind (or the common baseline).
#[derive(Debug, Clone, Default)]
pub struct KindRules {
    pub noise: Vec<NoiseRule>,
    /// Dot-path prefixes the live system refuses to update in place.
    pub immutable: Vec<String>,
    pub unordered: Vec<ListKeyRule>,
}

impl KindRules {
    /// Noise action covering `path`, if any rule's pattern is a prefix of it.
    pub fn noise_action_for(&self, path: &FieldPath) -> Option<NoiseAction> {
        self.noise
            .iter()
            .find(|r| r.path.is_prefix_of(path))
            .map(|r| r.action)
    }

    /// Whether a change at `path` requires replacing the resource.
    pub fn is_immutable(&self, path: &FieldPath) -> bool {
        self.immutable.iter().any(|p| path.starts_with_str(p))
    }

    /// Identity key for the unordered list at `list_path`, if registered.
    pub fn unordered_key_for(&self, list_path: &FieldPath) -> Option<&str> {
        self.unordered
            .iter()
            .find(|r| r.matches(list_path))
            .map(|r| r.key.as_str())
    }

    fn extended(&self, extra: &KindRules) -> KindRules {
        let mut out = self.clone();
        out.noise.extend(extra.noise.iter().cloned());
        out.immutable.extend(extra.immutable.iter().cloned());
        out.unordered.extend(extra.unordered.iter().cloned());
        out
    }
}

/// Kind-indexed capability table. Unknown kinds fall back to the common
/// baseline rules; that fallback is not an error.
#[derive(Debug, Clone, Default)]
pub struct KindTable {
    common: KindRules,
    by_kind: BTreeMap<String, KindRules>,
}

impl KindTable {
    pub fn new(common: KindRules) -> Self {
        Self {
            common,
            by_kind: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, rules: KindRules) {
        self.by_kind.insert(kind.to_ascii_lowercase(), rules);
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.by_kind.contains_key(&kind.to_ascii_lowercase())
    }

    /// Effective rules for `kind`: the common baseline plus any registered
    /// kind-specific entries.
    pub fn rules_for(&self, kind: &str) -> KindRules {
        match self.by_kind.get(&kind.to_ascii_lowercase()) {
            Some(extra) => self.common.extended(extra),
            None => self.common.clone(),
        }
    }

    /// A copy of this table with all `Strip` noise rules removed, for runs
    /// that want server-managed fields surfaced. `Mask` rules survive so
    /// secret contents stay hidden, and `Ignore` rules keep applying to the
    /// diff.
    #[must_use]
    pub fn without_strip(&self) -> Self {
        let drop_strip = |rules: &KindRules| KindRules {
            noise: rules
                .noise
                .iter()
                .filter(|r| r.action != NoiseAction::Strip)
                .cloned()
                .collect(),
            immutable: rules.immutable.clone(),
            unordered: rules.unordered.clone(),
        };
        Self {
            common: drop_strip(&self.common),
            by_kind: self
                .by_kind
                .iter()
                .map(|(k, v)| (k.clone(), drop_strip(v)))
                .collect(),
        }
    }

    /// Built-in table covering the kinds the cluster control plane is known
    /// to mutate.
    pub fn builtin() -> Self {
        Self::try_builtin().unwrap_or_else(|e| {
            // Patterns below are literals; a parse failure is a programming
            // error caught by the `builtin_table_parses` test.
            unreachable!("builtin kind table: {e}")
        })
    }

    fn try_builtin() -> Result<Self> {
        let common = KindRules {
            noise: vec![
                NoiseRule::strip("metadata.creationTimestamp")?,
                NoiseRule::strip("metadata.resourceVersion")?,
                NoiseRule::strip("metadata.uid")?,
                NoiseRule::strip("metadata.generation")?,
                NoiseRule::strip("metadata.managedFields")?,
                NoiseRule::strip(r"metadata.annotations.meta\.helm\.sh/*")?,
                NoiseRule::strip(
                    r"metadata.annotations.kubectl\.kubernetes\.io/last-applied-configuration",
                )?,
                NoiseRule::strip(r"metadata.labels.helm\.sh/chart")?,
                NoiseRule::strip("metadata.labels.pod-template-hash")?,
                NoiseRule::strip("status")?,
                // Needed by the ownership resolver, never diffed.
                NoiseRule::ignore("metadata.ownerReferences")?,
            ],
            immutable: Vec::new(),
            unordered: Vec::new(),
        };

        let mut table = Self::new(common);

        let workload_unordered = || {
            vec![
                ListKeyRule::new("spec.template.spec.containers.*.env", "name"),
                ListKeyRule::new("spec.template.spec.containers.*.ports", "containerPort"),
                ListKeyRule::new("spec.template.spec.containers.*.volumeMounts", "mountPath"),
                ListKeyRule::new("spec.template.spec.initContainers.*.env", "name"),
                ListKeyRule::new("spec.template.spec.initContainers.*.ports", "containerPort"),
                ListKeyRule::new(
                    "spec.template.spec.initContainers.*.volumeMounts",
                    "mountPath",
                ),
                ListKeyRule::new("spec.template.spec.volumes", "name"),
                ListKeyRule::new("spec.template.spec.imagePullSecrets", "name"),
            ]
        };

        table.register(
            "deployment",
            KindRules {
                noise: vec![NoiseRule::strip(
                    r"metadata.annotations.deployment\.kubernetes\.io/revision",
                )?],
                immutable: vec!["spec.selector".to_string()],
                unordered: workload_unordered(),
            },
        );
        table.register(
            "statefulset",
            KindRules {
                noise: Vec::new(),
                immutable: vec![
                    "spec.selector".to_string(),
                    "spec.volumeClaimTemplates".to_string(),
                    "spec.serviceName".to_string(),
                ],
                unordered: workload_unordered(),
            },
        );
        table.register(
            "daemonset",
            KindRules {
                noise: Vec::new(),
                immutable: vec!["spec.selector".to_string()],
                unordered: workload_unordered(),
            },
        );
        table.register(
            "job",
            KindRules {
                noise: Vec::new(),
                immutable: vec![
                    "spec.selector".to_string(),
                    "spec.template".to_string(),
                    "spec.completions".to_string(),
                ],
                unordered: workload_unordered(),
            },
        );
        table.register(
            "service",
            KindRules {
                noise: vec![
                    NoiseRule::strip("spec.clusterIPs")?,
                    NoiseRule::strip("spec.internalTrafficPolicy")?,
                    NoiseRule::strip("spec.ipFamilies")?,
                    NoiseRule::strip("spec.ipFamilyPolicy")?,
                    NoiseRule::strip("spec.sessionAffinity")?,
                ],
                immutable: vec!["spec.clusterIP".to_string()],
                unordered: vec![ListKeyRule::new("spec.ports", "port")],
            },
        );
        table.register(
            "persistentvolumeclaim",
            KindRules {
                noise: vec![
                    NoiseRule::strip(r"metadata.annotations.pv\.kubernetes\.io/*")?,
                    NoiseRule::strip(r"metadata.annotations.volume\.beta\.kubernetes\.io/*")?,
                    NoiseRule::strip(r"metadata.annotations.volume\.kubernetes\.io/*")?,
                    NoiseRule::strip("spec.volumeName")?,
                ],
                immutable: vec!["spec.storageClassName".to_string()],
                unordered: Vec::new(),
            },
        );
        table.register(
            "secret",
            KindRules {
                noise: vec![NoiseRule::mask("data.*")?, NoiseRule::mask("stringData.*")?],
                immutable: Vec::new(),
                unordered: Vec::new(),
            },
        );

        Ok(table)
    }
}
