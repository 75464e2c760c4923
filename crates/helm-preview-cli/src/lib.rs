pub mod error;
pub mod helm;
pub mod kubectl;
pub mod render;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use helm_preview::logging::LogFormat;
use helm_preview::{analyze, AnalyzeOptions, NoiseRule, RiskLevel};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::helm::{ClusterScope, Helm};
use crate::kubectl::Kubectl;
use crate::render::{render_json, render_terminal, RenderOptions};

pub use error::{CliError, CliResult};

#[derive(Parser, Debug)]
#[command(
    name = "helm-preview",
    version,
    about = "Preview and risk-classify a Helm upgrade before applying it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<tracing::metadata::Level>,

    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Json,
    Compact,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::PrettyCompact,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Diff a release against the chart it would be upgraded to
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Name of the deployed release
    pub release: String,

    /// Chart reference: local path, .tgz, or repo/chart
    pub chart: String,

    /// Release namespace
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Values files passed through to helm (repeatable)
    #[arg(short = 'f', long = "values", value_name = "FILE")]
    pub values: Vec<PathBuf>,

    /// Value overrides passed through to helm (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Chart version to upgrade to
    #[arg(long)]
    pub version: Option<String>,

    /// Keep server-managed fields instead of stripping them
    #[arg(long)]
    pub show_all: bool,

    /// Exclude a field path from the diff (repeatable)
    #[arg(long = "ignore-path", value_name = "PATH")]
    pub ignore_paths: Vec<String>,

    /// Render proposed resources through `kubectl apply --dry-run=server`
    #[arg(long)]
    pub server_side: bool,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Terminal)]
    pub output: OutputFormat,

    /// Show only resources and changes that carry risk
    #[arg(long)]
    pub risk_only: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Path to the kubeconfig file
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub kube_context: Option<String>,

    /// Exit non-zero when the aggregate risk reaches this level
    #[arg(long, value_enum, default_value_t = FailOn::Blocking)]
    pub fail_on: FailOn,

    /// Worker threads (default: one per core)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds allowed for each helm/kubectl invocation
    #[arg(long, value_name = "SECONDS", default_value_t = helm::DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Caution,
    Dangerous,
    Blocking,
    Never,
}

impl FailOn {
    fn threshold(self) -> Option<RiskLevel> {
        match self {
            FailOn::Caution => Some(RiskLevel::Caution),
            FailOn::Dangerous => Some(RiskLevel::Dangerous),
            FailOn::Blocking => Some(RiskLevel::Blocking),
            FailOn::Never => None,
        }
    }
}

pub fn run(cli: Cli) -> eyre::Result<ExitCode> {
    match cli.cmd {
        Command::Diff(ref args) => {
            let color_choice = if args.no_color {
                termcolor::ColorChoice::Never
            } else {
                termcolor::ColorChoice::Auto
            };
            let (_, use_color) = helm_preview::logging::setup_logging(
                cli.log_level,
                cli.log_format.map(LogFormat::from),
                color_choice,
            )?;
            run_diff(args, use_color)
        }
    }
}

fn run_diff(args: &DiffArgs, use_color: bool) -> eyre::Result<ExitCode> {
    let scope = ClusterScope {
        namespace: args.namespace.clone(),
        kubeconfig: args.kubeconfig.clone(),
        context: args.kube_context.clone(),
    };

    let timeout = std::time::Duration::from_secs(args.timeout);
    let helm = Helm::new(scope.clone(), timeout);
    let live = helm.get_manifest(&args.release)?;
    let mut proposed = helm.dry_run_upgrade(
        &args.release,
        &args.chart,
        &args.values,
        &args.set,
        args.version.as_deref(),
    )?;
    if args.server_side {
        proposed = Kubectl::new(scope, timeout).server_side_dry_run(&proposed)?;
    }

    let mut options = AnalyzeOptions {
        keep_noise: args.show_all,
        workers: args.workers.unwrap_or(0),
        ..AnalyzeOptions::default()
    };
    if let Some(namespace) = &args.namespace {
        options.default_namespace = namespace.clone();
    }
    for pattern in &args.ignore_paths {
        options
            .extra_ignore_paths
            .push(NoiseRule::ignore(pattern).map_err(CliError::Analysis)?);
    }

    let report = analyze(&live, &proposed, &options).map_err(CliError::Analysis)?;

    let rendered = match args.output {
        OutputFormat::Terminal => render_terminal(
            &report,
            &RenderOptions {
                color: use_color,
                risk_only: args.risk_only,
            },
        ),
        OutputFormat::Json => render_json(&report)?,
    };
    write_output(&rendered)?;

    match args.fail_on.threshold() {
        Some(threshold) if report.risk_level >= threshold => {
            tracing::warn!(risk = %report.risk_level, "risk threshold reached");
            Ok(ExitCode::from(2))
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn write_output(out: &str) -> eyre::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(out.as_bytes()) {
        // When piping to `head`, stdout may be closed early; treat as success.
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(eyre::eyre!(e));
        }
    }
    Ok(())
}
