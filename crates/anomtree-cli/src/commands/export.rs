//! Export the taxonomy as JSON.

use anomtree::prelude::*;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::config::Config;

pub fn run(output: &str) -> Result<()> {
    let config = Config::load()?;
    let tree = super::load_tree(&config)?;

    println!("{} Exporting taxonomy...", "→".blue());
    let path = Path::new(output);
    let view = export_tree_json(&tree, path)
        .with_context(|| format!("Failed to export taxonomy: {}", path.display()))?;

    println!(
        "{} Exported {} top-level categories to {}",
        "✓".green().bold(),
        view.len().to_string().cyan(),
        path.display()
    );
    Ok(())
}
