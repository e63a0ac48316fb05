//! Configuration commands.

use super::{config_path, load_config};
use anyhow::{Context, Result};
use colored::Colorize;
use docslice_config::Config;
use std::path::Path;

pub fn show(explicit: Option<&Path>) -> Result<()> {
    let path = config_path(explicit)?;

    let contents = if path.exists() {
        std::fs::read_to_string(&path).context("Failed to read config file")?
    } else {
        println!(
            "{} No config file at {}, showing defaults.",
            "Note:".yellow().bold(),
            path.display()
        );
        Config::default_config_string()
    };

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn path(explicit: Option<&Path>) -> Result<()> {
    println!("{}", config_path(explicit)?.display());
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply one `section.key = value` assignment.
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["chunking", "max_chunk_size"] => {
            config.chunking.max_chunk_size = value.parse().context("Invalid max_chunk_size value")?;
        }
        ["chunking", "min_chunk_size"] => {
            config.chunking.min_chunk_size = value.parse().context("Invalid min_chunk_size value")?;
        }
        ["chunking", "chunk_overlap"] => {
            config.chunking.chunk_overlap = value.parse().context("Invalid chunk_overlap value")?;
        }
        ["chunking", "split_by_title"] => {
            config.chunking.split_by_title = value.parse().context("Invalid boolean value")?;
        }
        ["chunking", "split_by_paragraph"] => {
            config.chunking.split_by_paragraph = value.parse().context("Invalid boolean value")?;
        }
        ["chunking", "force_max_size"] => {
            config.chunking.force_max_size = value.parse().context("Invalid boolean value")?;
        }
        ["chunking", "distribute_images_evenly"] => {
            config.chunking.distribute_images_evenly =
                value.parse().context("Invalid boolean value")?;
        }
        ["chunking", "title_patterns"] => config.chunking.title_patterns = parse_list(value),
        ["chunking", "section_images"] => config.chunking.section_images = value.parse()?,
        ["images", "output_dir"] => {
            config.images.output_dir = (!value.is_empty()).then(|| value.to_string());
        }
        ["images", "unique_names"] => {
            config.images.unique_names = value.parse().context("Invalid boolean value")?;
        }
        ["batch", "extensions"] => config.batch.extensions = parse_list(value),
        ["batch", "recursive"] => {
            config.batch.recursive = value.parse().context("Invalid boolean value")?;
        }
        ["batch", "skip_hidden"] => {
            config.batch.skip_hidden = value.parse().context("Invalid boolean value")?;
        }
        ["batch", "ignore_patterns"] => config.batch.ignore_patterns = parse_list(value),
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    }

    Ok(())
}

pub fn set(explicit: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = config_path(explicit)?;
    let mut config = load_config(explicit)?;

    apply(&mut config, key, value)?;

    config.save_to(&path).context("Failed to save config")?;

    println!("{} Set {} = {}", "✓".green(), key.cyan(), value);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docslice_config::SectionImagePolicy;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "chunking.max_chunk_size", "1200").unwrap();
        apply(&mut config, "chunking.section_images", "inline_only").unwrap();
        apply(&mut config, "batch.extensions", "md, docx").unwrap();
        apply(&mut config, "images.output_dir", "/tmp/out").unwrap();

        assert_eq!(config.chunking.max_chunk_size, 1200);
        assert_eq!(config.chunking.section_images, SectionImagePolicy::InlineOnly);
        assert_eq!(config.batch.extensions, vec!["md", "docx"]);
        assert_eq!(config.images.output_dir.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "chunking.max_chunk_size", "big").is_err());
        assert!(apply(&mut config, "chunking.unknown", "1").is_err());
        assert!(apply(&mut config, "batch.recursive", "maybe").is_err());
    }
}
