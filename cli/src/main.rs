//! CLI for gpumon
//!
//! Commands:
//! - demo: run a simulated session and write its reports
//! - render: re-render a saved JSON report
//! - merge: build a report from the spooled records of worker processes
//! - summary: print the console summary of a saved report

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gpumon_report::config::MonitorConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod console;
mod output;

#[derive(Parser)]
#[command(name = "gpumon")]
#[command(about = "gpumon - per-test GPU memory monitor", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command; they override the config file and
/// `GPUMON_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to ./gpumon.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the report files
    #[arg(long, global = true)]
    pub report_dir: Option<PathBuf>,

    /// Do not print the console summary
    #[arg(long, global = true)]
    pub no_summary: bool,

    /// Number of top memory consumers to rank
    #[arg(long, global = true)]
    pub top: Option<usize>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Layered config with the command-line overrides applied
    pub fn resolve_config(&self) -> Result<MonitorConfig> {
        let mut config = MonitorConfig::load(self.config.as_deref())?;

        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        if self.no_summary {
            config.print_summary = false;
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated session and write its reports
    Demo(commands::demo::DemoArgs),

    /// Re-render a saved JSON report
    Render(commands::render::RenderArgs),

    /// Merge records spooled by worker processes into one report
    Merge(commands::merge::MergeArgs),

    /// Print the summary of a saved report
    Summary(commands::summary::SummaryArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(e) = run(cli) {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.global.resolve_config()?;

    match cli.command {
        Commands::Demo(args) => commands::demo::run(args, &config),
        Commands::Render(args) => commands::render::run(args, &config),
        Commands::Merge(args) => commands::merge::run(args, &config),
        Commands::Summary(args) => commands::summary::run(args, &config),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gpumon",
            "demo",
            "--no-accelerator",
            "--top",
            "3",
            "--report-dir",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.global.top, Some(3));
        assert_eq!(cli.global.report_dir, Some(PathBuf::from("out")));
        assert!(matches!(cli.command, Commands::Demo(ref args) if args.no_accelerator));
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gpumon.toml");
        std::fs::write(&path, "top_n = 8\nprint_summary = true\n").unwrap();

        let args = GlobalArgs {
            config: Some(path),
            no_summary: true,
            top: Some(2),
            ..GlobalArgs::default()
        };
        let config = args.resolve_config().unwrap();

        assert_eq!(config.top_n, 2);
        assert!(!config.print_summary);
    }

    #[test]
    fn test_zero_top_rejected() {
        let args = GlobalArgs {
            top: Some(0),
            ..GlobalArgs::default()
        };
        assert!(args.resolve_config().is_err());
    }
}
