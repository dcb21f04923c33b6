//! CLI command implementations.

pub mod classify;
pub mod export;
pub mod init;
pub mod recover;
pub mod stats;
pub mod tree;

use anomtree::prelude::*;
use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::config::Config;

/// Load the stored taxonomy named by the config.
fn load_tree(config: &Config) -> Result<TaxonomyTree> {
    let path = config.storage_path();
    if !path.exists() {
        bail!(
            "No taxonomy at {}. Run {} first.",
            path.display(),
            "anomtree classify".cyan()
        );
    }
    TaxonomyTree::load(&path, false)
        .with_context(|| format!("Failed to load taxonomy: {}", path.display()))
}
