//! muse CLI - Main entry point

mod demo;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use muse_core::{AnalysisContext, BatchReport, OutputKind, UnitId, Variant};
use muse_foundation::{canonicalize, fingerprint, ParameterBag, SessionConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use demo::DemoTransform;

/// muse - derived-data cache for detector-group analysis
#[derive(Parser, Debug)]
#[command(name = "muse")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate every group and pair of a session with the synthetic transform
    Run {
        /// Session file (.toml or .json)
        config: PathBuf,

        /// Number of passes; passes after the first are served from the cache
        #[arg(short, long, default_value = "2")]
        passes: usize,
    },
    /// Print the canonical form and fingerprint of a JSON parameter object
    Fingerprint {
        /// JSON object, e.g. '{"TimeMin": 0.1, "TimeMax": 5.0}'
        json: String,
    },
    /// List detectors that belong to no group of a session
    Excluded {
        config: PathBuf,

        /// Number of detectors on the instrument
        #[arg(short = 'n', long)]
        detectors: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match args.command {
        Command::Run { config, passes } => run_session(&config, passes),
        Command::Fingerprint { json } => print_fingerprint(&json),
        Command::Excluded { config, detectors } => {
            let config = load_config(&config)?;
            let ctx = AnalysisContext::from_config(&config, DemoTransform)?;
            let excluded = ctx.collection().detectors_excluded(detectors);
            if excluded.is_empty() {
                println!("Every detector is grouped");
            } else {
                let ids: Vec<String> = excluded.iter().map(u32::to_string).collect();
                println!("{}", ids.join(","));
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<SessionConfig> {
    SessionConfig::load(path).with_context(|| format!("loading session {}", path.display()))
}

fn display_name(kind: &str, unit: &UnitId) -> String {
    let rebin = match unit.variant {
        Variant::Raw => "",
        Variant::Rebinned => "; Rebin",
    };
    format!("{}; {}; {}; {}{}", unit.run, kind, unit.record, unit.kind, rebin)
}

fn run_session(path: &Path, passes: usize) -> anyhow::Result<()> {
    if passes == 0 {
        bail!("at least one pass is required");
    }

    let config = load_config(path)?;
    let mut ctx = AnalysisContext::from_config(&config, DemoTransform)
        .context("building analysis context")?;

    for pass in 1..=passes {
        let groups = ctx.show_all_groups(|unit| display_name("Group", unit));
        let pairs = ctx.show_all_pairs(|unit| display_name("Pair", unit));
        info!(
            pass,
            completed = groups.completed.len() + pairs.completed.len(),
            failed = groups.failures.len() + pairs.failures.len(),
            "Pass finished"
        );
        if pass == 1 {
            report_failures(&groups);
            report_failures(&pairs);
        }
    }

    for variant in ctx.variants() {
        for name in ctx.visible_asymmetry_names(variant) {
            println!("{name}");
        }
    }

    if let Some(run) = ctx.current_runs().first() {
        for name in ctx.collection().group_names() {
            // served from the cache after the passes above
            let counts = ctx.calculate_group_output(&name, run, Variant::Raw, OutputKind::Counts);
            if let Ok(series) = counts {
                let peak = series.y.iter().copied().fold(0.0, f64::max);
                println!("{name} counts: {} points, peak {peak:.1}", series.x.len());
            }
        }
    }

    let stats = ctx.cache_stats();
    println!(
        "hits={} misses={} failures={} hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.failures,
        stats.hit_rate()
    );
    Ok(())
}

fn report_failures(report: &BatchReport) {
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
}

fn print_fingerprint(json: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("parsing parameters")?;
    let bag = ParameterBag::from_json(&value)?;
    println!("{}", canonicalize(&bag)?);
    println!("{}", fingerprint(&bag)?);
    Ok(())
}
