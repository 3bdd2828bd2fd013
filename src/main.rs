use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use proxy_core::config::Config;
use proxy_core::Direction;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "proxy-core")]
#[command(about = "Protocol handler registry and dispatch for a multi-protocol proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered protocols
    Protocols,
    /// Create every handler listed in a manifest and report failures
    Check {
        /// Manifest file path
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Protocols => {
            proxy_core::init_tracing();
            list_protocols()
        }
        Commands::Check { config } => check(config),
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

fn list_protocols() -> anyhow::Result<()> {
    let instance = proxy_core::new_with_defaults().context("failed to register built-in protocols")?;
    for direction in [Direction::Inbound, Direction::Outbound] {
        println!("{}:", direction);
        for name in instance.registry().protocols(direction) {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn check(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    proxy_core::init_tracing_with(&config.log.clone().unwrap_or_default());
    info!("Checking handlers from {:?}", config_path);

    config.validate().context("invalid manifest")?;

    let instance = proxy_core::new_with_defaults().context("failed to register built-in protocols")?;
    let reports = instance.check(&config);
    let failed = reports.iter().filter(|r| r.result.is_err()).count();

    for report in &reports {
        match &report.result {
            Ok(()) => println!("ok    {} {} ({})", report.direction, report.tag, report.protocol),
            Err(e) => println!("FAIL  {} {} ({}): {}", report.direction, report.tag, report.protocol, e),
        }
    }

    if failed > 0 {
        bail!("{} of {} handlers failed", failed, reports.len());
    }
    info!("All {} handlers created", reports.len());
    Ok(())
}

fn show_version() {
    println!("proxy-core {}", proxy_core::version());
    println!("Protocol handler registry and dispatch layer");
}

