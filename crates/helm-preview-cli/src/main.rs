use clap::Parser;
use color_eyre::eyre;
use std::process::ExitCode;

fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = helm_preview_cli::Cli::parse();
    helm_preview_cli::run(cli)
}
