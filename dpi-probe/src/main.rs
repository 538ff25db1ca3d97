//! DPI Dispatch Probe
//!
//! Command-line front end for the dpi-dispatch library. It builds a dispatch
//! environment from configuration, resolves the declared imports, and reports
//! which are bound. Optionally calls every import so unresolved ones emit
//! their diagnostics.

use anyhow::{Context, Result};
use clap::Parser;
use dpi_dispatch::{
    callbacks, CountingSink, Environment, FanoutSink, MemorySink, ProviderTable, SearchScope,
};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod exercise;
mod report;

use config::ProbeConfig;
use report::ProbeReport;

/// DPI Dispatch Probe - Resolve and exercise the declared DPI imports
#[derive(Parser, Debug)]
#[command(name = "dpi-probe")]
#[command(about = "Resolve and exercise the declared DPI imports", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (probe.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Provider module to search (can be repeated)
    #[arg(short, long, value_name = "LIB")]
    provider: Vec<PathBuf>,

    /// Search every loaded module instead of only those loaded after this one
    #[arg(long)]
    global: bool,

    /// Do not search the process namespace
    #[arg(long)]
    no_process: bool,

    /// Call every declared import with sample arguments
    #[arg(short, long)]
    exercise: bool,

    /// Rounds of sample calls (implies --exercise)
    #[arg(long, value_name = "N")]
    repeat: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("DPI Dispatch Probe v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using dispatch library v{}", dpi_dispatch::VERSION);

    let config = build_config(&args)?;
    log::debug!("Effective configuration: {:?}", config);

    let env = Environment::from_config(&config.dispatch, ProviderTable::new())
        .context("Failed to build dispatch environment")?;
    log::info!("Resolver: {}", env.resolver().describe());

    // Individual reports are only kept when they will be printed
    let counts = Arc::new(CountingSink::new());
    let captured = args.json.then(|| Arc::new(MemorySink::new()));
    let mut fanout = FanoutSink::new().with(env.sink_handle()).with(counts.clone());
    if let Some(captured) = &captured {
        fanout = fanout.with(captured.clone());
    }
    callbacks::install(env.with_sink(fanout))?;

    let bound = callbacks::resolve_all();
    log::info!("{} of {} declared imports bound", bound, callbacks::DECLARED.len());

    let calls = if config.exercise.enabled {
        exercise::run(&config.exercise)
    } else {
        0
    };

    let report = ProbeReport::new(
        callbacks::resolution_report(),
        calls,
        counts.counts(),
        captured.map(|sink| sink.reports()).unwrap_or_default(),
    );
    if args.json {
        println!("{}", report.render_json()?);
    } else if !args.quiet {
        print!("{}", report.render_text());
    }

    Ok(())
}

/// Load the configuration file if given, then apply command-line overrides
fn build_config(args: &Args) -> Result<ProbeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {:?}", path);
            config::load_config(path)?
        }
        None => ProbeConfig::default(),
    };

    config.dispatch.providers.extend(args.provider.iter().cloned());
    if args.global {
        config.dispatch.scope = SearchScope::Global;
    }
    if args.no_process {
        config.dispatch.search_process = false;
    }
    if args.exercise {
        config.exercise.enabled = true;
    }
    if let Some(repeat) = args.repeat {
        if repeat == 0 {
            anyhow::bail!("--repeat must be at least 1");
        }
        config.exercise.enabled = true;
        config.exercise.repeat = repeat;
    }

    Ok(config)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "dpi-probe",
            "--provider",
            "libpipeline_print.so",
            "--global",
            "--repeat",
            "4",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.dispatch.providers, vec![PathBuf::from("libpipeline_print.so")]);
        assert_eq!(config.dispatch.scope, SearchScope::Global);
        assert!(config.exercise.enabled);
        assert_eq!(config.exercise.repeat, 4);
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let args = Args::parse_from(["dpi-probe", "--repeat", "0"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_defaults_search_process() {
        let args = Args::parse_from(["dpi-probe"]);
        let config = build_config(&args).unwrap();
        assert!(config.dispatch.search_process);
        assert!(!config.exercise.enabled);
    }
}
