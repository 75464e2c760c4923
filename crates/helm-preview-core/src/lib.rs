pub mod kinds;
pub mod path;

pub use kinds::{KindRules, KindTable, ListKeyRule, ListSeg, NoiseAction, NoisePath, NoiseRule};
pub use path::{FieldPath, PathElem};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid noise path pattern {pattern:?}: {reason}")]
    InvalidNoisePath { pattern: String, reason: String },
    #[error("all {0} resources failed")]
    AllResourcesFailed(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unique key of a resource across the Live and Proposed sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.api_version, self.kind, self.namespace, self.name
        )
    }
}

/// Which side of the comparison a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Live,
    Proposed,
}

/// A single owner reference carried in resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Release manager detected from labels/annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Manager {
    Helm,
    ArgoCd,
    Flux,
    Unknown,
}

/// Ownership-relevant metadata, captured by the normalizer *before* noise
/// stripping so it survives even when the corresponding fields are noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnershipMeta {
    pub owner_refs: Vec<OwnerRef>,
    pub managed_by: Option<String>,
    pub release: Option<String>,
    pub instance: Option<String>,
    pub flux_managed: bool,
    pub argocd_app: Option<String>,
    /// `metadata.labels` of the resource itself.
    pub labels: BTreeMap<String, String>,
    /// `spec.selector` (Service) or `spec.selector.matchLabels` (workloads).
    pub selector: BTreeMap<String, String>,
    /// `spec.template.metadata.labels` for workloads.
    pub template_labels: BTreeMap<String, String>,
}

impl OwnershipMeta {
    pub fn manager(&self) -> Manager {
        let managed_by = self.managed_by.as_deref().unwrap_or("");
        if managed_by.eq_ignore_ascii_case("helm") || self.release.is_some() {
            Manager::Helm
        } else if self.argocd_app.is_some() {
            Manager::ArgoCd
        } else if self.flux_managed {
            Manager::Flux
        } else {
            Manager::Unknown
        }
    }
}

/// A normalized resource document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDocument {
    pub identity: ResourceIdentity,
    pub origin: Origin,
    pub body: Value,
    pub ownership: OwnershipMeta,
}

/// Change kind of a single field entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryChange {
    Added,
    Removed,
    Modified,
    TypeChanged,
    RequiresReplace,
}

/// Change kind of a whole resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceChange {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Risk levels in ascending severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Safe,
    Caution,
    Dangerous,
    Blocking,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Dangerous => "dangerous",
            RiskLevel::Blocking => "blocking",
        };
        f.write_str(s)
    }
}

/// One field-level change inside a resource diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub path: FieldPath,
    pub change: EntryChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ChangeEntry {
    pub fn new(
        path: FieldPath,
        change: EntryChange,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            path,
            change,
            old_value,
            new_value,
            risk_level: RiskLevel::Safe,
            rule: None,
            rationale: None,
        }
    }
}

/// Diff of one resource, created by the diff engine and enriched in place by
/// the risk classifier (risk annotations) and ownership resolver (owner chain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub identity: ResourceIdentity,
    pub change: ResourceChange,
    pub entries: Vec<ChangeEntry>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub owner_chain: Vec<ResourceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<Manager>,
    pub truncated: bool,
}

impl ResourceDiff {
    pub fn new(identity: ResourceIdentity, change: ResourceChange) -> Self {
        Self {
            identity,
            change,
            entries: Vec::new(),
            risk_level: RiskLevel::Safe,
            rule: None,
            rationale: None,
            owner_chain: Vec::new(),
            manager: None,
            truncated: false,
        }
    }
}
