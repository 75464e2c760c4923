//! Risk classification: an ordered list of data-driven rules annotates diff
//! entries with risk levels. First matching rule wins per entry; a resource's
//! level is the maximum severity among its entries, floored by any matching
//! resource-level rules. Rules only annotate — they never alter diff output.

mod image;
mod rules;

pub use image::{is_pinned_image, ImageRef};
pub use rules::{default_rules, RiskCheck, RiskRule};

use helm_preview_core::{ResourceDiff, RiskLevel};

/// Annotate one diff in place. Every entry gets a `risk_level`; unmatched
/// entries stay `Safe`.
pub fn classify(diff: &mut ResourceDiff, rules: &[RiskRule]) {
    let kind = diff.identity.kind.clone();
    let mut resource_level = RiskLevel::Safe;

    for entry in &mut diff.entries {
        for rule in rules {
            if let Some(verdict) = rule.check.evaluate_entry(&kind, entry) {
                entry.risk_level = verdict.level;
                entry.rule = Some(rule.name.clone());
                entry.rationale = Some(verdict.rationale);
                break;
            }
        }
        resource_level = resource_level.max(entry.risk_level);
    }

    // First matching resource-level rule names the resource's rationale.
    for rule in rules {
        if let Some(verdict) = rule.check.evaluate_resource(&kind, diff.change) {
            resource_level = resource_level.max(verdict.level);
            if diff.rule.is_none() {
                diff.rule = Some(rule.name.clone());
                diff.rationale = Some(verdict.rationale);
            }
        }
    }

    diff.risk_level = resource_level;
}

/// Annotate all diffs in place.
pub fn classify_all(diffs: &mut [ResourceDiff], rules: &[RiskRule]) {
    for diff in diffs {
        classify(diff, rules);
    }
}
