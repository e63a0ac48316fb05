//! Initialize docslice.

use super::{config_path, get_paths};
use anyhow::{Context, Result};
use colored::Colorize;
use docslice_config::Config;
use std::path::Path;

pub fn run(explicit: Option<&Path>) -> Result<()> {
    let paths = get_paths()?;
    let config_file = config_path(explicit)?;

    if config_file.exists() {
        println!("{} docslice is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", config_file.display());
        return Ok(());
    }

    println!("{}", "Initializing docslice...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Config::create_default_file(&config_file).context("Failed to create config file")?;
    println!("  {} Created config: {}", "✓".green(), config_file.display());
    println!("  {} Images go to: {}", "✓".green(), paths.image_dir.display());

    println!();
    println!("{}", "docslice initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Tune chunking: {}",
        "docslice config set chunking.max_chunk_size 1000".cyan()
    );
    println!("  2. Parse a document: {}", "docslice parse report.docx".cyan());

    Ok(())
}
