//! Finish or undo interrupted leaf splits.

use anomtree::prelude::*;
use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let storage = config.storage_path();
    if !storage.exists() {
        bail!("No taxonomy at {}", storage.display());
    }

    println!("{} Scanning {} for pending splits...", "→".blue(), storage.display());
    let actions = TaxonomyTree::recover(&storage)
        .with_context(|| format!("Recovery failed under {}", storage.display()))?;

    if actions.is_empty() {
        println!("{} Nothing to recover.", "✓".green().bold());
        return Ok(());
    }

    for action in &actions {
        match action {
            RecoveryAction::RolledBack { leaf } => {
                println!("  {} rolled back {}", "↩".yellow(), leaf.display())
            }
            RecoveryAction::RolledForward { leaf } => {
                println!("  {} completed split of {}", "✓".green(), leaf.display())
            }
            RecoveryAction::Cleaned { leaf } => {
                println!("  {} cleaned up after {}", "•".blue(), leaf.display())
            }
            RecoveryAction::DiscardedMarker { marker } => {
                println!("  {} discarded unreadable marker {}", "!".red(), marker.display())
            }
        }
    }
    println!();
    println!(
        "{} Recovered {} pending split(s).",
        "✓".green().bold(),
        actions.len().to_string().cyan()
    );
    Ok(())
}
