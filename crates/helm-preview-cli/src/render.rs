//! Report rendering: a risk-colored terminal view and a JSON view.

use crate::error::CliResult;
use helm_preview::{Report, RiskLevel};
use helm_preview_core::{ChangeEntry, EntryChange, ResourceChange, ResourceDiff};
use owo_colors::{OwoColorize, Style};
use std::fmt::Write;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub color: bool,
    /// Hide resources and entries that carry no risk.
    pub risk_only: bool,
}

pub fn render_json(report: &Report) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_terminal(report: &Report, options: &RenderOptions) -> String {
    let mut out = String::new();
    let s = &report.summary;
    let _ = writeln!(
        out,
        "{} resources: {} added, {} removed, {} modified, {} unchanged",
        s.total, s.added, s.removed, s.modified, s.unchanged
    );
    let _ = writeln!(
        out,
        "overall risk: {}",
        paint(&report.risk_level.to_string(), report.risk_level, options)
    );

    for diff in report.changed() {
        if options.risk_only && diff.risk_level == RiskLevel::Safe {
            continue;
        }
        let _ = writeln!(out);
        render_resource(&mut out, diff, options);
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "warnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    if !report.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "errors:");
        for error in &report.errors {
            match &error.identity {
                Some(identity) => {
                    let _ = writeln!(out, "  - {identity}: {}", error.message);
                }
                None => {
                    let _ = writeln!(out, "  - {}", error.message);
                }
            }
        }
    }
    out
}

fn render_resource(out: &mut String, diff: &ResourceDiff, options: &RenderOptions) {
    let header = format!(
        "{} {}  [{}]",
        change_symbol(diff.change),
        diff.identity,
        diff.risk_level
    );
    let _ = writeln!(out, "{}", paint(&header, diff.risk_level, options));

    if !diff.owner_chain.is_empty() {
        let chain: Vec<String> = diff.owner_chain.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "    owned by: {}", chain.join(" -> "));
    }
    if let Some(rationale) = &diff.rationale {
        let _ = writeln!(out, "    {rationale}");
    }
    for entry in &diff.entries {
        if options.risk_only && entry.risk_level == RiskLevel::Safe {
            continue;
        }
        render_entry(out, entry, options);
    }
    if diff.truncated {
        let _ = writeln!(out, "    ... diff truncated");
    }
}

fn render_entry(out: &mut String, entry: &ChangeEntry, options: &RenderOptions) {
    let mut line = format!("    {} {}", entry_symbol(entry.change), entry.path);
    match (&entry.old_value, &entry.new_value) {
        (Some(old), Some(new)) => {
            let _ = write!(line, ": {old} -> {new}");
        }
        (Some(old), None) => {
            let _ = write!(line, ": {old}");
        }
        (None, Some(new)) => {
            let _ = write!(line, ": {new}");
        }
        (None, None) => {}
    }
    if entry.risk_level > RiskLevel::Safe {
        let _ = write!(line, "  [{}]", entry.risk_level);
        if let Some(rationale) = &entry.rationale {
            let _ = write!(line, " {rationale}");
        }
    }
    let _ = writeln!(out, "{}", paint(&line, entry.risk_level, options));
}

fn change_symbol(change: ResourceChange) -> char {
    match change {
        ResourceChange::Added => '+',
        ResourceChange::Removed => '-',
        ResourceChange::Modified => '~',
        ResourceChange::Unchanged => '=',
    }
}

fn entry_symbol(change: EntryChange) -> char {
    match change {
        EntryChange::Added => '+',
        EntryChange::Removed => '-',
        EntryChange::Modified | EntryChange::TypeChanged => '~',
        EntryChange::RequiresReplace => '!',
    }
}

fn paint(text: &str, risk: RiskLevel, options: &RenderOptions) -> String {
    if !options.color {
        return text.to_string();
    }
    let style = match risk {
        RiskLevel::Safe => Style::new().green(),
        RiskLevel::Caution => Style::new().yellow(),
        RiskLevel::Dangerous => Style::new().red(),
        RiskLevel::Blocking => Style::new().red().bold(),
    };
    text.style(style).to_string()
}

#[cfg(test)]
mod tests {
    use super::{render_terminal, RenderOptions};
    use helm_preview::{analyze, AnalyzeOptions};
    use indoc::indoc;

    const PLAIN: RenderOptions = RenderOptions {
        color: false,
        risk_only: false,
    };

    fn report() -> helm_preview::Report {
        let live = indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
            spec:
              replicas: 3
            ---
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: app
            data:
              k: v
        "};
        let proposed = live.replace("replicas: 3", "replicas: 1");
        analyze(live, &proposed, &AnalyzeOptions::default()).unwrap()
    }

    #[test]
    fn terminal_output_shape() {
        let text = render_terminal(&report(), &PLAIN);
        assert!(text.contains("2 resources: 0 added, 0 removed, 1 modified, 1 unchanged"));
        assert!(text.contains("overall risk: caution"));
        assert!(text.contains("~ apps/v1/Deployment/default/web  [caution]"));
        assert!(text.contains("~ spec.replicas: 3 -> 1  [caution]"));
        // Unchanged resources appear in the summary only.
        assert!(!text.contains("ConfigMap"));
    }

    #[test]
    fn risk_only_hides_safe_entries() {
        let live = indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: app
            data:
              k: v
        "};
        let proposed = live.replace("k: v", "k: w");
        let report = analyze(live, &proposed, &AnalyzeOptions::default()).unwrap();

        let text = render_terminal(
            &report,
            &RenderOptions {
                color: false,
                risk_only: true,
            },
        );
        assert!(!text.contains("data.k"));

        let text = render_terminal(&report, &PLAIN);
        assert!(text.contains("data.k"));
    }

    #[test]
    fn colored_output_carries_ansi() {
        let text = render_terminal(
            &report(),
            &RenderOptions {
                color: true,
                risk_only: false,
            },
        );
        assert!(text.contains("\u{1b}["));
    }
}
