//! Show taxonomy statistics.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let tree = super::load_tree(&config)?;
    let stats = tree.stats();

    println!("{}", "anomtree Taxonomy Statistics".white().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();
    println!("  Storage:           {}", tree.base_path().display());
    println!("  Top-level:         {}", tree.root().children.len().to_string().cyan());
    println!("  Categories:        {}", stats.categories.to_string().cyan());
    println!("  Leaves:            {}", stats.leaves.to_string().cyan());
    println!("  Templates:         {}", stats.templates.to_string().cyan());
    println!("  Depth:             {}", stats.depth.to_string().cyan());

    let per_leaf = if stats.leaves > 0 {
        stats.templates as f64 / stats.leaves as f64
    } else {
        0.0
    };
    println!("  Templates / leaf:  {}", format!("{per_leaf:.2}").cyan());

    Ok(())
}
