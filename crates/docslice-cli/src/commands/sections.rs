//! Sections command - show how a document is grouped.

use super::{load_config, preview};
use anyhow::{Context, Result};
use colored::Colorize;
use docslice_ingest::Engine;
use std::path::Path;

pub fn run(file: &Path, config_file: Option<&Path>) -> Result<()> {
    let config = load_config(config_file)?;
    let engine = Engine::from_config(&config).context("Invalid chunking configuration")?;

    let sections = engine
        .sections(file)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    println!("{} {}", "Sections of".cyan().bold(), file.display());
    println!("{}", "─".repeat(70));

    for (i, section) in sections.iter().enumerate() {
        let text = section.text();
        let length = text.chars().count();
        let oversized = length > engine.chunking().max_chunk_size;

        println!(
            "{:>3}. {}{}",
            i + 1,
            section.title.white().bold(),
            if section.page > 0 {
                format!(" (p.{})", section.page).dimmed().to_string()
            } else {
                String::new()
            }
        );
        println!(
            "     {} elements, {} images, {} chars{}",
            section.elements.len(),
            section.images().len(),
            length,
            if oversized {
                " - will be split".yellow().to_string()
            } else {
                String::new()
            }
        );
        println!("     {}", preview(&text, 80).dimmed());
    }

    println!();
    println!("{} {} sections", "Total:".green().bold(), sections.len());

    Ok(())
}
