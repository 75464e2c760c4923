//! The rule set. Rules are plain data: an ordered `Vec<RiskRule>` that can be
//! replaced wholesale without touching diff logic.

use crate::image::is_pinned_image;
use helm_preview_core::{ChangeEntry, EntryChange, ResourceChange, RiskLevel};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub level: RiskLevel,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct RiskRule {
    pub name: String,
    pub check: RiskCheck,
}

impl RiskRule {
    pub fn new(name: &str, check: RiskCheck) -> Self {
        Self {
            name: name.to_string(),
            check,
        }
    }
}

/// Predicate over (kind, path, old, new). Entry-level checks annotate single
/// entries; resource-level checks floor the whole resource's severity.
#[derive(Debug, Clone)]
pub enum RiskCheck {
    /// Any entry the diff engine marked `RequiresReplace`.
    ImmutableField,
    /// The resource exists Live but not Proposed.
    ResourceRemoved { level: RiskLevel },
    /// Entry path starts with one of `prefixes` on one of `kinds`
    /// (empty `kinds` means any kind).
    KindPathPrefix {
        kinds: Vec<String>,
        prefixes: Vec<String>,
        level: RiskLevel,
    },
    /// Service `spec.type` transitions; exposure-widening ones are worse.
    ServiceTypeChange,
    /// `spec.replicas` decreased.
    ReplicaDecrease,
    /// Image reference change; severity depends on whether the new
    /// reference is pinned.
    ImageChange,
}

impl RiskCheck {
    pub fn evaluate_entry(&self, kind: &str, entry: &ChangeEntry) -> Option<Verdict> {
        let path = entry.path.to_string();
        match self {
            RiskCheck::ImmutableField => {
                if entry.change == EntryChange::RequiresReplace {
                    Some(Verdict {
                        level: RiskLevel::Blocking,
                        rationale: format!(
                            "immutable field {path} cannot be updated in place"
                        ),
                    })
                } else {
                    None
                }
            }
            RiskCheck::ResourceRemoved { .. } => None,
            RiskCheck::KindPathPrefix {
                kinds,
                prefixes,
                level,
            } => {
                let kind_matches = kinds.is_empty()
                    || kinds.iter().any(|k| k.eq_ignore_ascii_case(kind));
                if kind_matches && prefixes.iter().any(|p| entry.path.starts_with_str(p)) {
                    Some(Verdict {
                        level: *level,
                        rationale: format!("{kind} change at {path}"),
                    })
                } else {
                    None
                }
            }
            RiskCheck::ServiceTypeChange => {
                if !kind.eq_ignore_ascii_case("Service") || path != "spec.type" {
                    return None;
                }
                let old = entry.old_value.as_ref().and_then(Value::as_str);
                let new = entry.new_value.as_ref().and_then(Value::as_str);
                let level = match (old, new) {
                    (Some("ClusterIP"), Some("NodePort" | "LoadBalancer")) => {
                        RiskLevel::Dangerous
                    }
                    _ => RiskLevel::Caution,
                };
                Some(Verdict {
                    level,
                    rationale: format!(
                        "service type changed from {} to {}",
                        old.unwrap_or("<unset>"),
                        new.unwrap_or("<unset>")
                    ),
                })
            }
            RiskCheck::ReplicaDecrease => {
                if path != "spec.replicas" {
                    return None;
                }
                let old = entry.old_value.as_ref().and_then(Value::as_i64)?;
                let new = entry.new_value.as_ref().and_then(Value::as_i64)?;
                if new < old {
                    Some(Verdict {
                        level: RiskLevel::Caution,
                        rationale: format!("replica count decreased from {old} to {new}"),
                    })
                } else {
                    None
                }
            }
            RiskCheck::ImageChange => {
                if !(path == "image" || path.ends_with(".image")) {
                    return None;
                }
                let new = entry.new_value.as_ref().and_then(Value::as_str)?;
                if is_pinned_image(new) {
                    Some(Verdict {
                        level: RiskLevel::Safe,
                        rationale: format!("image changed to pinned reference {new}"),
                    })
                } else {
                    Some(Verdict {
                        level: RiskLevel::Caution,
                        rationale: format!("image changed to unpinned reference {new}"),
                    })
                }
            }
        }
    }

    pub fn evaluate_resource(&self, kind: &str, change: ResourceChange) -> Option<Verdict> {
        match self {
            RiskCheck::ResourceRemoved { level } => {
                if change == ResourceChange::Removed {
                    Some(Verdict {
                        level: *level,
                        rationale: format!("{kind} will be removed by this upgrade"),
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// The built-in ordered rule set. First match wins per entry.
pub fn default_rules() -> Vec<RiskRule> {
    vec![
        RiskRule::new("immutable_field", RiskCheck::ImmutableField),
        RiskRule::new(
            "resource_removed",
            RiskCheck::ResourceRemoved {
                level: RiskLevel::Dangerous,
            },
        ),
        RiskRule::new(
            "rbac_change",
            RiskCheck::KindPathPrefix {
                kinds: vec![
                    "Role".to_string(),
                    "ClusterRole".to_string(),
                    "RoleBinding".to_string(),
                    "ClusterRoleBinding".to_string(),
                ],
                prefixes: vec![
                    "rules".to_string(),
                    "subjects".to_string(),
                    "roleRef".to_string(),
                ],
                level: RiskLevel::Dangerous,
            },
        ),
        RiskRule::new(
            "crd_spec_change",
            RiskCheck::KindPathPrefix {
                kinds: vec!["CustomResourceDefinition".to_string()],
                prefixes: vec![
                    "spec.scope".to_string(),
                    "spec.versions".to_string(),
                    "spec.names".to_string(),
                    "spec.validation".to_string(),
                ],
                level: RiskLevel::Dangerous,
            },
        ),
        RiskRule::new("service_type_change", RiskCheck::ServiceTypeChange),
        RiskRule::new("replica_decrease", RiskCheck::ReplicaDecrease),
        RiskRule::new(
            "pvc_storage_request",
            RiskCheck::KindPathPrefix {
                kinds: vec!["PersistentVolumeClaim".to_string()],
                prefixes: vec!["spec.resources.requests.storage".to_string()],
                level: RiskLevel::Caution,
            },
        ),
        RiskRule::new("image_change", RiskCheck::ImageChange),
    ]
}
