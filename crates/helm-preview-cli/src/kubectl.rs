//! `kubectl` server-side dry-run: asks the API server to render each
//! proposed resource with admission defaults applied, which removes a whole
//! class of false diffs (defaulted fields the chart never sets).

use crate::error::CliResult;
use crate::helm::{run, ClusterScope};
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Kubectl {
    pub binary: String,
    pub scope: ClusterScope,
    pub timeout: Duration,
}

impl Kubectl {
    pub fn new(scope: ClusterScope, timeout: Duration) -> Self {
        Self {
            binary: "kubectl".to_string(),
            scope,
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(ns) = &self.scope.namespace {
            cmd.args(["--namespace", ns]);
        }
        if let Some(kubeconfig) = &self.scope.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        if let Some(context) = &self.scope.context {
            cmd.args(["--context", context]);
        }
        cmd
    }

    /// Run every document of `manifest` through
    /// `kubectl apply --dry-run=server`, substituting the server-rendered
    /// form for the chart-rendered one.
    ///
    /// Per-resource failures (e.g. a CRD whose definition is not installed
    /// yet) fall back to the chart-rendered document, so a single
    /// unservable resource does not lose the whole preview.
    pub fn server_side_dry_run(&self, manifest: &str) -> CliResult<String> {
        let mut rendered = Vec::new();
        for doc in helm_preview_manifest::split_documents(manifest) {
            let mut cmd = self.command();
            cmd.args(["apply", "--dry-run=server", "-o", "yaml", "-f", "-"]);
            match run(cmd, &self.binary, Some(&doc), self.timeout) {
                Ok(server_doc) => rendered.push(server_doc),
                Err(err) => {
                    tracing::warn!(%err, "server-side dry-run failed, using rendered document");
                    rendered.push(doc);
                }
            }
        }
        Ok(rendered.join("\n---\n"))
    }
}
