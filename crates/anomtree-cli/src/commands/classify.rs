//! Classify a contribution table into the taxonomy.

use anomtree::prelude::*;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;

pub async fn run(
    csv: &str,
    out: Option<&str>,
    reset: bool,
    no_csv: bool,
    verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let csv_path = Path::new(csv);

    let table = ContributionTable::from_path(csv_path)
        .with_context(|| format!("Failed to read contribution table: {}", csv_path.display()))?;
    let rows = table.rows();
    debug!(csv = %csv_path.display(), sensors = ?table.sensors(), "contribution table loaded");
    println!(
        "{} Loaded {} rows over {} sensors",
        "→".blue(),
        rows.len().to_string().cyan(),
        table.sensors().len().to_string().cyan()
    );

    let oracle = config.build_oracle()?;
    let storage = config.storage_path();
    if reset {
        println!("{} Resetting {}", "→".yellow(), storage.display());
    }
    let session = TaxonomySession::open(&storage, reset, oracle)
        .with_context(|| format!("Failed to open taxonomy: {}", storage.display()))?;
    println!(
        "{} Classifying with the {} oracle ({})...",
        "→".blue(),
        session.oracle().backend_name().cyan(),
        session.oracle().model()
    );

    let mut orchestrator = TaxonomyOrchestrator::new(session, table.record_builder());

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut report = orchestrator
        .run_with(&rows, |outcome| {
            match outcome {
                ClassificationOutcome::Skipped { index, reason, .. } => {
                    pb.println(format!("  {} row {}: {}", "✗".red(), index, reason));
                }
                ClassificationOutcome::Classified { .. } if verbose => {
                    pb.set_message(outcome.classification_label());
                }
                ClassificationOutcome::Classified { .. } => {}
            }
            pb.inc(1);
        })
        .await;
    pb.finish_with_message("done");

    let session = orchestrator.into_session();
    let paths = export_paths(&config, csv_path, out, no_csv);
    write_exports(session.tree(), &table, &mut report, &paths);
    info!(
        processed = report.processed(),
        skipped = report.skipped(),
        warnings = report.warnings.len(),
        "classify finished"
    );

    let stats = session.tree().stats();
    println!();
    println!("{} Classification complete!", "✓".green().bold());
    println!("  Processed:   {}", report.processed().to_string().cyan());
    println!("  Skipped:     {}", report.skipped().to_string().yellow());
    println!(
        "  New / appended / split: {} / {} / {}",
        report.count(PlacementKind::CreatedCategory).to_string().cyan(),
        report.count(PlacementKind::Appended).to_string().cyan(),
        report.count(PlacementKind::Split).to_string().cyan()
    );
    println!(
        "  Taxonomy:    {} categories, {} leaves",
        stats.categories.to_string().cyan(),
        stats.leaves.to_string().cyan()
    );
    for path in paths.classified_csv.iter().chain(paths.tree_json.iter()) {
        if path.exists() {
            println!("  {} {}", "✓".green(), path.display());
        }
    }
    for warning in &report.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }

    Ok(())
}

/// Exports go to `--out`, or next to the input table.
fn export_paths(config: &Config, csv_path: &Path, out: Option<&str>, no_csv: bool) -> ExportPaths {
    let dir = match out {
        Some(out) => PathBuf::from(out),
        None => csv_path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    ExportPaths {
        classified_csv: (!no_csv).then(|| dir.join(&config.export.classified_csv)),
        tree_json: Some(dir.join(&config.export.tree_json)),
    }
}
