//! The upgrade preview pipeline: pairs live and proposed manifests, runs
//! per-resource normalization, diffing and risk classification on a worker
//! pool, resolves ownership, and assembles one deterministic report.
//!
//! Per-resource failures are partial: a malformed document is reported and
//! the rest of the release is still analyzed. The run as a whole fails only
//! when no resource could be analyzed at all.

pub mod logging;

pub use helm_preview_core::{
    Error, KindTable, NoiseRule, ResourceDiff, ResourceDocument, ResourceIdentity, Result,
    RiskLevel,
};
pub use helm_preview_diff::DiffLimits;
pub use helm_preview_report::{Report, ReportError, Summary};
pub use helm_preview_risk::{default_rules, RiskRule};

use helm_preview_core::{Origin, ResourceChange};
use helm_preview_manifest::{pair_resources, parse_multi_doc, PairStatus, ResourcePair};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Cooperative cancellation handle. Cloned into workers; in-flight resources
/// finish, queued ones are skipped and reported.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pipeline configuration.
pub struct AnalyzeOptions {
    /// Namespace assumed for resources that do not carry one.
    pub default_namespace: String,
    pub kind_table: KindTable,
    pub risk_rules: Vec<RiskRule>,
    pub limits: DiffLimits,
    /// Worker threads; `0` means one per available core.
    pub workers: usize,
    /// Operator-supplied paths excluded from the diff (`--ignore-path`).
    pub extra_ignore_paths: Vec<NoiseRule>,
    /// Keep server-managed fields instead of stripping them (`--show-all`).
    /// Secret masking still applies.
    pub keep_noise: bool,
    pub cancel: CancelFlag,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            kind_table: KindTable::builtin(),
            risk_rules: default_rules(),
            limits: DiffLimits::default(),
            workers: 0,
            extra_ignore_paths: Vec::new(),
            keep_noise: false,
            cancel: CancelFlag::new(),
        }
    }
}

/// Analyze an upgrade: diff the proposed manifest stream against the live
/// one and classify every change.
///
/// # Errors
///
/// Returns [`Error::AllResourcesFailed`] when every resource in the release
/// failed to parse or normalize. Individual failures are carried in
/// [`Report::errors`] instead.
pub fn analyze(
    live_manifest: &str,
    proposed_manifest: &str,
    options: &AnalyzeOptions,
) -> Result<Report> {
    let mut errors: Vec<ReportError> = Vec::new();

    let (live, parse_errors) =
        parse_multi_doc(live_manifest, Origin::Live, &options.default_namespace);
    let mut parse_failed = parse_errors.len();
    errors.extend(parse_errors.into_iter().map(ReportError::unattributed));
    let (proposed, parse_errors) = parse_multi_doc(
        proposed_manifest,
        Origin::Proposed,
        &options.default_namespace,
    );
    parse_failed += parse_errors.len();
    errors.extend(parse_errors.into_iter().map(ReportError::unattributed));

    let pairs = pair_resources(live, proposed);
    let total = pairs.len();
    tracing::debug!(resources = total, "paired live and proposed manifests");

    let table = if options.keep_noise {
        options.kind_table.without_strip()
    } else {
        options.kind_table.clone()
    };

    let (outcomes, skipped) = run_pool(pairs, &table, options);
    for identity in skipped {
        errors.push(ReportError {
            identity: Some(identity),
            message: "analysis cancelled before this resource was processed".to_string(),
        });
    }

    let mut diffs = Vec::new();
    let mut docs = Vec::new();
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome {
            Outcome::Analyzed { diff, doc } => {
                if let Some(diff) = diff {
                    diffs.push(diff);
                }
                if let Some(doc) = doc {
                    docs.push(doc);
                }
            }
            Outcome::Failed { identity, error } => {
                failed += 1;
                tracing::warn!(resource = %identity, %error, "resource analysis failed");
                errors.push(ReportError {
                    identity: Some(identity),
                    message: error.to_string(),
                });
            }
        }
    }

    // A malformed document aborts only that resource. The run itself fails
    // only when nothing at all could be analyzed.
    let attempted = parse_failed + total;
    if attempted > 0 && parse_failed + failed == attempted {
        return Err(Error::AllResourcesFailed(attempted));
    }

    let doc_refs: Vec<&ResourceDocument> = docs.iter().collect();
    let resolution = helm_preview_ownership::resolve(&doc_refs);
    resolution.annotate(&mut diffs);

    Ok(helm_preview_report::assemble(diffs, resolution, errors))
}

enum Outcome {
    Analyzed {
        diff: Option<ResourceDiff>,
        /// Normalized document retained for ownership resolution, preferring
        /// the proposed side.
        doc: Option<ResourceDocument>,
    },
    Failed {
        identity: ResourceIdentity,
        error: Error,
    },
}

/// Run per-resource analysis over a scoped worker pool. Returns outcomes for
/// processed pairs and the identities of pairs skipped by cancellation.
fn run_pool(
    pairs: Vec<ResourcePair>,
    table: &KindTable,
    options: &AnalyzeOptions,
) -> (Vec<Outcome>, Vec<ResourceIdentity>) {
    let workers = match options.workers {
        0 => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
        n => n,
    }
    .min(pairs.len().max(1));

    let queue = Mutex::new(pairs.into_iter().collect::<VecDeque<_>>());
    let outcomes = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if options.cancel.is_cancelled() {
                    break;
                }
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some(pair) = next else { break };
                let outcome = analyze_pair(pair, table, options);
                outcomes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(outcome);
            });
        }
    });

    let skipped = queue
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .map(|pair| pair.identity)
        .collect();
    let outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
    (outcomes, skipped)
}

fn analyze_pair(pair: ResourcePair, table: &KindTable, options: &AnalyzeOptions) -> Outcome {
    let normalize = |raw: helm_preview_manifest::RawResource| {
        helm_preview_normalize::normalize(
            raw.identity,
            raw.origin,
            raw.body,
            table,
            &options.extra_ignore_paths,
        )
    };

    // Equal raw bodies normalize to equal documents; skip the diff and keep
    // one normalized side for ownership resolution.
    if pair.status == PairStatus::Unchanged {
        return match pair.proposed.map(&normalize).transpose() {
            Ok(doc) => {
                let mut diff = ResourceDiff::new(pair.identity, ResourceChange::Unchanged);
                helm_preview_risk::classify(&mut diff, &options.risk_rules);
                Outcome::Analyzed {
                    diff: Some(diff),
                    doc,
                }
            }
            Err(error) => Outcome::Failed {
                identity: pair.identity,
                error,
            },
        };
    }

    let live = match pair.live.map(&normalize).transpose() {
        Ok(doc) => doc,
        Err(error) => {
            return Outcome::Failed {
                identity: pair.identity,
                error,
            }
        }
    };
    let proposed = match pair.proposed.map(&normalize).transpose() {
        Ok(doc) => doc,
        Err(error) => {
            return Outcome::Failed {
                identity: pair.identity,
                error,
            }
        }
    };

    let mut rules = table.rules_for(&pair.identity.kind);
    rules
        .noise
        .extend(options.extra_ignore_paths.iter().cloned());

    let mut diff = helm_preview_diff::diff_pair(
        &pair.identity,
        live.as_ref(),
        proposed.as_ref(),
        &rules,
        &options.limits,
    );
    if let Some(diff) = diff.as_mut() {
        helm_preview_risk::classify(diff, &options.risk_rules);
    }

    Outcome::Analyzed {
        diff,
        doc: proposed.or(live),
    }
}
