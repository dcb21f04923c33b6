//! Print the taxonomy.

use anomtree::prelude::*;
use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

pub fn run(full: bool) -> Result<()> {
    let config = Config::load()?;
    let tree = super::load_tree(&config)?;

    if tree.is_empty() {
        println!("{} The taxonomy is empty.", "•".yellow());
        return Ok(());
    }

    println!("{}", tree.base_path().display().to_string().white().bold());
    for (name, view) in tree.root_view(!full) {
        print_view(&name, &view, 1);
    }
    Ok(())
}

fn print_view(name: &str, view: &StructureView, depth: usize) {
    let indent = "  ".repeat(depth);
    match view {
        StructureView::Leaf(templates) => {
            println!("{indent}{} ({})", name.cyan().bold(), templates.len());
            for text in templates {
                println!("{indent}  {} {}", "-".dimmed(), text.dimmed());
            }
        }
        StructureView::Internal(children) => {
            println!("{indent}{}", name.blue().bold());
            for (child, view) in children {
                print_view(child, view, depth + 1);
            }
        }
    }
}
