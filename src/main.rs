mod dataset;
mod db;
mod error;
mod extract;
mod load;
mod normalize;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dataset::csv_io;
use load::ElasticClient;
use pipeline::{CleanArtifact, RawArtifact, RunContext};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "table_indexer",
    about = "Copy a SQL table into a search index, cleaning rows on the way"
)]
struct Cli {
    /// Settings file (TOML). Defaults to ./table_indexer.toml when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the source table to the raw artifact
    Extract,
    /// Clean the raw artifact into the clean artifact
    Clean,
    /// Submit every row of the clean artifact to the index
    Load,
    /// Extract, clean and load in one run (with retries)
    Run,
    /// Show rows, column kinds and null counts of an artifact
    Inspect {
        /// Artifact to read (default: the clean artifact)
        path: Option<PathBuf>,
    },
    /// Print the effective settings
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let ctx = RunContext::new(&settings.run.owner);

    let result = match cli.command {
        Commands::Extract => {
            let out = extract::run(&ctx, &settings.source, &settings.artifacts.raw)?;
            println!(
                "Extracted {} rows from '{}' to {}",
                out.rows,
                settings.source.table,
                out.artifact.path().display()
            );
            Ok(())
        }
        Commands::Clean => {
            let raw = RawArtifact::new(&settings.artifacts.raw);
            let out = normalize::run(&ctx, &raw, &settings.artifacts.clean, &settings.cleaning)?;
            println!(
                "Cleaned {} rows into {}",
                out.rows,
                out.artifact.path().display()
            );
            Ok(())
        }
        Commands::Load => {
            let clean = CleanArtifact::new(&settings.artifacts.clean);
            let mut client = ElasticClient::new(&settings.index)?;
            let report = load::run(&ctx, &clean, &mut client, &settings.index)?;
            println!(
                "Indexed {} documents into '{}' ({} skipped)",
                report.submitted, settings.index.name, report.skipped
            );
            Ok(())
        }
        Commands::Run => {
            let mut client = ElasticClient::new(&settings.index)?;
            let s = pipeline::run_all(&ctx, &settings, &mut client)?;
            println!("Run:       {}", s.run_id);
            println!("Extracted: {} rows -> {}", s.rows_extracted, s.raw.path().display());
            println!("Cleaned:   {} rows -> {}", s.rows_cleaned, s.clean.path().display());
            println!(
                "Indexed:   {} documents ({} skipped)",
                s.load.submitted, s.load.skipped
            );
            Ok(())
        }
        Commands::Inspect { path } => {
            let path = path.unwrap_or_else(|| settings.artifacts.clean.clone());
            let ds = csv_io::read_artifact(&path)?;
            println!("{}: {} rows, {} columns", path.display(), ds.len(), ds.columns.len());
            println!("{:<24} | {:<8} | {:>6}", "Column", "Kind", "Nulls");
            println!("{}", "-".repeat(44));
            for (idx, name) in ds.columns.iter().enumerate() {
                println!(
                    "{:<24} | {:<8} | {:>6}",
                    truncate(name, 24),
                    ds.kinds[idx].to_string(),
                    ds.null_count(idx)
                );
            }
            Ok(())
        }
        Commands::Config => {
            let text = serde_json::to_string_pretty(&settings).context("serialize settings")?;
            println!("{}", text);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
