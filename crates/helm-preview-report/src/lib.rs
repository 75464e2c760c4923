//! Report assembly: takes per-resource diffs and the resolved ownership
//! graph and produces one self-contained, serializable report with stable
//! ordering and aggregate counts.

use helm_preview_core::{ResourceChange, ResourceDiff, ResourceIdentity, RiskLevel};
use helm_preview_ownership::{OwnershipGraph, Resolution};
use serde::{Deserialize, Serialize};

/// Aggregate counts over all resources in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub safe: usize,
    pub caution: usize,
    pub dangerous: usize,
    pub blocking: usize,
}

impl Summary {
    fn tally(diffs: &[ResourceDiff], errors: &[ReportError]) -> Self {
        let mut summary = Summary {
            total: diffs.len() + errors.len(),
            ..Summary::default()
        };
        for diff in diffs {
            match diff.change {
                ResourceChange::Added => summary.added += 1,
                ResourceChange::Removed => summary.removed += 1,
                ResourceChange::Modified => summary.modified += 1,
                ResourceChange::Unchanged => summary.unchanged += 1,
            }
            match diff.risk_level {
                RiskLevel::Safe => summary.safe += 1,
                RiskLevel::Caution => summary.caution += 1,
                RiskLevel::Dangerous => summary.dangerous += 1,
                RiskLevel::Blocking => summary.blocking += 1,
            }
        }
        summary
    }
}

/// A resource that could not be analyzed. The rest of the report still
/// stands; callers decide whether a partial report is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResourceIdentity>,
    pub message: String,
}

impl ReportError {
    /// An error that could not be attributed to any single resource, such as
    /// a YAML document that failed to parse at all.
    pub fn unattributed(error: impl std::fmt::Display) -> Self {
        Self {
            identity: None,
            message: error.to_string(),
        }
    }
}

/// The assembled upgrade preview. Fully owned, no live references, and
/// deterministic: identical inputs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub risk_level: RiskLevel,
    pub resources: Vec<ResourceDiff>,
    pub graph: OwnershipGraph,
    pub warnings: Vec<String>,
    pub errors: Vec<ReportError>,
}

impl Report {
    /// Resources whose change is not `Unchanged`, in report order.
    pub fn changed(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.resources
            .iter()
            .filter(|d| d.change != ResourceChange::Unchanged)
    }
}

/// Assemble the final report from classified diffs and resolved ownership.
///
/// Resources are grouped under their ownership root and ordered by
/// (root identity, kind, name) regardless of the order diffs were produced
/// in, so concurrent pipelines yield identical reports.
pub fn assemble(
    mut diffs: Vec<ResourceDiff>,
    resolution: Resolution,
    mut errors: Vec<ReportError>,
) -> Report {
    diffs.sort_by_cached_key(|d| sort_key(&resolution, &d.identity));
    errors.sort_by(|a, b| a.identity.cmp(&b.identity).then(a.message.cmp(&b.message)));

    let mut warnings = resolution.warnings.clone();
    for diff in diffs.iter().filter(|d| d.truncated) {
        warnings.push(format!("diff truncated for {}", diff.identity));
    }
    warnings.sort();
    warnings.dedup();

    let risk_level = diffs
        .iter()
        .map(|d| d.risk_level)
        .max()
        .unwrap_or(RiskLevel::Safe);

    Report {
        summary: Summary::tally(&diffs, &errors),
        risk_level,
        resources: diffs,
        graph: resolution.graph,
        warnings,
        errors,
    }
}

fn sort_key(
    resolution: &Resolution,
    id: &ResourceIdentity,
) -> (ResourceIdentity, String, String, ResourceIdentity) {
    (
        resolution.root_for(id),
        id.kind.clone(),
        id.name.clone(),
        id.clone(),
    )
}
