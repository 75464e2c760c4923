//! `helm` subprocess wrappers: fetch the live manifest of a deployed release
//! and render the proposed one via a dry-run upgrade.

use crate::error::{CliError, CliResult};
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

/// Deadline applied to each `helm`/`kubectl` invocation unless overridden
/// with `--timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Cluster/connection scope shared by `helm` and `kubectl` invocations.
#[derive(Debug, Clone, Default)]
pub struct ClusterScope {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Helm {
    pub binary: String,
    pub scope: ClusterScope,
    pub timeout: Duration,
}

impl Helm {
    pub fn new(scope: ClusterScope, timeout: Duration) -> Self {
        Self {
            binary: "helm".to_string(),
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
            cmd.args(["--kube-context", context]);
        }
        cmd
    }

    /// The manifest of the deployed release, or an empty manifest when the
    /// release does not exist yet (previewing a first install).
    pub fn get_manifest(&self, release: &str) -> CliResult<String> {
        let mut cmd = self.command();
        cmd.args(["get", "manifest", release]);
        match run(cmd, &self.binary, None, self.timeout) {
            Ok(stdout) => Ok(stdout),
            Err(CliError::CommandFailed { stderr, .. }) if stderr.contains("not found") => {
                tracing::info!(release, "release not deployed, previewing against empty state");
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Render the proposed manifest with `helm upgrade --dry-run` and strip
    /// the release framing (HOOKS/MANIFEST/NOTES sections) from the output.
    pub fn dry_run_upgrade(
        &self,
        release: &str,
        chart: &str,
        values: &[PathBuf],
        set: &[String],
        version: Option<&str>,
    ) -> CliResult<String> {
        let mut cmd = self.command();
        cmd.args(["upgrade", release, chart, "--dry-run", "--install"]);
        for file in values {
            cmd.arg("--values").arg(file);
        }
        for pair in set {
            cmd.args(["--set", pair]);
        }
        if let Some(version) = version {
            cmd.args(["--version", version]);
        }
        let stdout = run(cmd, &self.binary, None, self.timeout)?;
        Ok(strip_release_framing(&stdout))
    }
}

/// Extract the manifest body from `helm upgrade --dry-run` output.
///
/// The output interleaves release metadata with `HOOKS:`, `MANIFEST:` and
/// `NOTES:` sections; only the manifest section is YAML we can analyze.
/// Output with no framing at all passes through unchanged.
pub fn strip_release_framing(output: &str) -> String {
    if !output.lines().any(|l| l.starts_with("MANIFEST:")) {
        return output.to_string();
    }
    let mut in_manifest = false;
    let mut manifest = String::new();
    for line in output.lines() {
        if line.starts_with("MANIFEST:") {
            in_manifest = true;
            continue;
        }
        if line.starts_with("HOOKS:") || line.starts_with("NOTES:") {
            in_manifest = false;
            continue;
        }
        if in_manifest {
            manifest.push_str(line);
            manifest.push('\n');
        }
    }
    manifest
}

/// Run a command to completion, feeding `stdin` when given, and return its
/// stdout on success. The child is killed once `timeout` elapses.
pub(crate) fn run(
    mut cmd: Command,
    binary: &str,
    stdin: Option<&str>,
    timeout: Duration,
) -> CliResult<String> {
    use std::io::Read;
    use std::process::Stdio;

    let command_line = format!("{cmd:?}");
    tracing::debug!(command = %command_line, "running");

    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CliError::CommandNotFound {
                command: binary.to_string(),
                source,
            }
        } else {
            CliError::Io(source)
        }
    })?;

    // Drain the output pipes on their own threads so a chatty child cannot
    // block on a full pipe while we poll for exit.
    fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = pipe {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        })
    }
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
        use std::io::Write;
        handle.write_all(input.as_bytes())?;
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CliError::CommandTimeout {
                command: command_line,
                seconds: timeout.as_secs(),
            });
        }
        std::thread::sleep(Duration::from_millis(25));
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    if !status.success() {
        return Err(CliError::CommandFailed {
            command: command_line,
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}
