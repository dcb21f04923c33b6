//! Initialize a new anomtree project.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};

pub fn run(path: Option<String>) -> Result<()> {
    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    println!("{} Initializing anomtree project...", "→".blue());

    std::fs::create_dir_all(&base_path)
        .with_context(|| format!("Failed to create {}", base_path.display()))?;

    let config_path = base_path.join(CONFIG_FILE);
    let config = if config_path.exists() {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
        Config::load_from(&config_path)?
    } else {
        let config = Config::default();
        config.save(&config_path)?;
        println!("  {} Created {}", "✓".green(), config_path.display());
        Config::load_from(&config_path)?
    };

    let storage = config.storage_path();
    if storage.exists() {
        println!("  {} {} already exists", "•".yellow(), storage.display());
    } else {
        std::fs::create_dir_all(&storage)
            .with_context(|| format!("Failed to create {}", storage.display()))?;
        println!("  {} Created {}", "✓".green(), storage.display());
    }

    println!();
    println!("{} anomtree project initialized!", "✓".green().bold());
    println!();
    println!("Next steps:");
    println!("  {} export OPENAI_API_KEY=... (or set [oracle] backend = \"ollama\")", "1.".blue());
    println!("  {} anomtree classify <contributions.csv>", "2.".blue());
    println!("  {} anomtree tree", "3.".blue());

    Ok(())
}
