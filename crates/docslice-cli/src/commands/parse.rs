//! Parse command implementation.

use super::{load_config, preview};
use anyhow::{Context, Result};
use colored::Colorize;
use docslice_config::Config;
use docslice_core::DocumentChunk;
use docslice_ingest::Engine;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Command-line overrides of the parse command.
#[derive(Debug, Default)]
pub struct ParseOptions {
    pub json: bool,
    pub output: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub max_chunk_size: Option<usize>,
    pub overlap: Option<usize>,
}

impl ParseOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(max) = self.max_chunk_size {
            config.chunking.max_chunk_size = max;
        }
        if let Some(overlap) = self.overlap {
            config.chunking.chunk_overlap = overlap;
        }
        if let Some(ref dir) = self.images_dir {
            config.images.output_dir = Some(dir.to_string_lossy().to_string());
        }
    }
}

/// Parse a single file or directory.
pub fn run(path: &Path, config_file: Option<&Path>, options: ParseOptions) -> Result<()> {
    let mut config = load_config(config_file)?;
    options.apply(&mut config);

    let engine = Engine::from_config(&config).context("Invalid chunking configuration")?;
    debug!("Writing images to {:?}", engine.image_dir());

    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let chunks = if path.is_dir() {
        parse_directory(&engine, path)?
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Parsing {}", path.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let chunks = engine
            .parse(path)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        pb.finish_and_clear();
        chunks
    };

    if let Some(ref output) = options.output {
        let json = serde_json::to_string_pretty(&chunks)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!(
            "{} Wrote {} chunks to {}",
            "✓".green(),
            chunks.len(),
            output.display()
        );
    } else if options.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        print_chunks(&chunks);
    }

    Ok(())
}

fn parse_directory(engine: &Engine, dir: &Path) -> Result<Vec<DocumentChunk>> {
    eprintln!("{} {}", "Scanning:".cyan(), dir.display());

    let files = engine.batch_files(dir);
    if files.is_empty() {
        eprintln!("{}", "No supported files found.".yellow());
        return Ok(Vec::new());
    }

    eprintln!("Found {} files", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let report = engine.parse_batch(&files, |path| {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        pb.set_message(filename.to_string());
        pb.inc(1);
    });

    pb.finish_and_clear();

    eprintln!(
        "\n{} {} files ({} chunks)",
        "Parsed:".green().bold(),
        report.parsed.len(),
        report.chunks.len()
    );
    if !report.failures.is_empty() {
        eprintln!("{} {} files", "Failed:".red().bold(), report.failures.len());
        for failure in &report.failures {
            eprintln!("  {} {}", failure.path.display(), failure.message.dimmed());
        }
    }

    Ok(report.chunks)
}

fn print_chunks(chunks: &[DocumentChunk]) {
    if chunks.is_empty() {
        println!("{}", "No chunks produced.".yellow());
        return;
    }

    for chunk in chunks {
        let page = if chunk.page_number > 0 {
            format!(" p.{}", chunk.page_number)
        } else {
            String::new()
        };
        println!(
            "{} {}{} {}",
            chunk.chunk_id.dimmed(),
            chunk.section.white().bold(),
            page.dimmed(),
            format!("({} chars)", chunk.metadata.text_length).dimmed()
        );
        println!("  {}", preview(&chunk.text, 100));
        if chunk.metadata.has_images {
            println!(
                "  {} {}",
                "Images:".cyan(),
                chunk.images.join(", ")
            );
        }
    }

    let images: usize = chunks.iter().map(|c| c.metadata.image_count).sum();
    println!();
    println!(
        "{} {} chunks, {} images",
        "Total:".green().bold(),
        chunks.len(),
        images
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_override_config() {
        let options = ParseOptions {
            max_chunk_size: Some(300),
            overlap: Some(30),
            images_dir: Some(PathBuf::from("/tmp/imgs")),
            ..ParseOptions::default()
        };
        let mut config = Config::default();
        options.apply(&mut config);

        assert_eq!(config.chunking.max_chunk_size, 300);
        assert_eq!(config.chunking.chunk_overlap, 30);
        assert_eq!(config.images.output_dir.as_deref(), Some("/tmp/imgs"));
        assert_eq!(config.chunking.min_chunk_size, 100);
    }

    #[test]
    fn test_images_dir_option_expands_tilde() {
        let options = ParseOptions {
            images_dir: Some(PathBuf::from("~/extracted")),
            ..ParseOptions::default()
        };
        let mut config = Config::default();
        options.apply(&mut config);

        let dir = config.image_dir().unwrap();
        assert!(!dir.starts_with("~"));
        assert!(dir.ends_with("extracted"));
    }
}
