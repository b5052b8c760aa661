// Purpose: Parse command-line flags, merge them with `tsgen.toml`, and run one expansion pass.
// Inputs/Outputs: Takes process args; prints or rewrites files and returns a process exit code.
// Invariants: Flags override config values; only files named on the command line are emitted.
// Gotchas: The logger is installed here and nowhere else, after config is known.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::debug;

use crate::config::Config;
use crate::pipeline::{collect_sources, FileTarget, Gen, InPlaceTarget, Options, Stage, StdoutTarget};

#[derive(Parser, Debug)]
#[command(name = "tsgen")]
#[command(version = env!("TSGEN_VERSION"))]
#[command(about = "Expand Go type switches over placeholder types into concrete arms", long_about = None)]
struct Cli {
    /// Config file to use instead of the nearest tsgen.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Package whose main function (or tests) roots the call graph
    #[arg(short, long, global = true, value_name = "PKG")]
    main: Option<String>,

    /// Rewrite the named files in place instead of printing them
    #[arg(short, long, global = true)]
    write: bool,

    /// Print trace output while expanding
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add arms for every concrete type reaching each type switch
    Expand {
        /// Go files to rewrite; every .go file in their directories is loaded
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

pub fn run_cli<I>(args: I) -> i32
where
    I: IntoIterator<Item = String>,
{
    let argv = std::iter::once("tsgen".to_string()).chain(args);
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
        }
    };
    match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("tsgen: {:#}", err);
            1
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Expand { ref files } => {
            let start = files
                .first()
                .and_then(|f| f.parent())
                .unwrap_or_else(|| Path::new("."));
            let (config, config_path) = Config::discover(cli.config.as_deref(), start)?;
            init_logger(cli.verbose || config.verbose);
            if let Some(path) = &config_path {
                debug!("using config {}", path.display());
            }

            let options = Options {
                main: cli.main.clone().or_else(|| config.main.clone()),
                marker: config.marker().to_string(),
            };
            let sources = collect_sources(files).context("failed to load sources")?;
            let targets = sources.targets.clone();
            let gen = Gen::from_sources(sources.inputs, options)?;

            let mut target: Box<dyn FileTarget> = if cli.write || config.write {
                Box::new(InPlaceTarget::new(targets))
            } else {
                Box::new(StdoutTarget::new(targets))
            };
            let reports = gen.expand(target.as_mut())?;
            let expanded = reports.iter().filter(|r| r.stage == Stage::Expanded).count();
            let arms: usize = reports.iter().map(|r| r.arms_added.len()).sum();
            debug!(
                "{} of {} type switch(es) expanded, {} arm(s) added",
                expanded,
                reports.len(),
                arms
            );
            Ok(())
        }
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "error" };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::{run_cli, Cli, Commands};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tsgen", "expand", "a.go", "b.go", "-w", "--main", "app"]).expect("parse");
        assert!(cli.write);
        assert!(!cli.verbose);
        assert_eq!(cli.main.as_deref(), Some("app"));
        let Commands::Expand { files } = cli.command;
        assert_eq!(files, vec![PathBuf::from("a.go"), PathBuf::from("b.go")]);
    }

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(run_cli(["expand".to_string()]), 2);
        assert_eq!(run_cli(["frobnicate".to_string()]), 2);
    }

    #[test]
    fn missing_input_is_fatal() {
        let missing = std::env::temp_dir().join(format!("tsgen-missing-{}", std::process::id())).join("x.go");
        assert_eq!(run_cli(["expand".to_string(), missing.display().to_string()]), 1);
    }
}
