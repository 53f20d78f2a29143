use std::{io::IsTerminal, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use huntflow_core::{load_targets, Pipeline, PipelineConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_TARGETS_FILE: &str = "targets/targets.txt";
const DEFAULT_CONFIG_FILE: &str = "config/config.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "huntflow",
    author,
    version,
    about = "Automated bug bounty workflow: recon, optional LLM suggestions, then scans"
)]
struct Cli {
    /// Path to the targets file (one target per line, `#` for comments)
    #[arg(short = 't', long = "targets", value_name = "PATH", default_value = DEFAULT_TARGETS_FILE)]
    targets: PathBuf,

    /// Path to the YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level (includes script output) unless RUST_LOG is set
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli).await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(&cli.config)?;
    if cli.print_config {
        print!(
            "{}",
            serde_yaml::to_string(&config).context("failed to render configuration")?
        );
        return Ok(());
    }

    let targets = load_targets(&cli.targets)?;
    let pipeline = Pipeline::from_config(config);
    pipeline.run(&targets).await.with_context(|| {
        format!(
            "failed to create output directory {}",
            pipeline.config().output.base_directory.display()
        )
    })?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}
