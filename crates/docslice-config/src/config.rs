//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.chunking.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&paths.config_file)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.chunking.validate()?;
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default_config_string())?;
        Ok(())
    }

    /// Directory extracted images are written to, with `~` expanded.
    pub fn image_dir(&self) -> ConfigResult<PathBuf> {
        match &self.images.output_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).as_ref())),
            None => AppPaths::new()
                .map(|p| p.image_dir)
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Docslice Configuration

[chunking]
# Hard upper bound of a chunk in characters (fenced code blocks may exceed it)
max_chunk_size = 800

# Advisory lower bound, not enforced
min_chunk_size = 100

# Overlap between consecutive chunks
chunk_overlap = 100

# Start a new section at detected titles
split_by_title = true

# Split on paragraphs before falling back to character windows
split_by_paragraph = true

# Force oversized paragraphs through character splitting
force_max_size = true

# Spread images that could not be positioned across all chunks
# (false puts them all on the first chunk)
distribute_images_evenly = true

# Extra title regexes, tried after the built-in ones
title_patterns = [
    # "^Appendix [A-Z]",
]

# Where a section's images go: "first_chunk" or "inline_only"
section_images = "first_chunk"

[images]
# Output directory for extracted images
# output_dir = "~/.local/share/docslice/images"

# Tag image file names with a content hash so parses of different
# documents sharing a file name never overwrite each other's images
unique_names = true

[batch]
# Extensions parsed when a directory is given
extensions = ["docx", "md", "pdf"]

# Descend into subdirectories
recursive = false

# Skip dot-files
skip_hidden = true

# File name patterns to leave out (glob syntax)
ignore_patterns = ["~$*"]
"#
        .to_string()
    }
}

/// Where the images of a section are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionImagePolicy {
    /// All section images go to the first chunk; later chunks only get
    /// the images whose token they contain.
    #[default]
    FirstChunk,
    /// Every chunk only gets the images whose token it contains.
    InlineOnly,
}

impl std::str::FromStr for SectionImagePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_chunk" => Ok(SectionImagePolicy::FirstChunk),
            "inline_only" => Ok(SectionImagePolicy::InlineOnly),
            other => Err(ConfigError::Invalid(format!(
                "unknown section image policy: {}",
                other
            ))),
        }
    }
}

/// Chunking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub chunk_overlap: usize,
    pub split_by_title: bool,
    pub split_by_paragraph: bool,
    pub force_max_size: bool,
    pub distribute_images_evenly: bool,
    pub title_patterns: Vec<String>,
    pub section_images: SectionImagePolicy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 800,
            min_chunk_size: 100,
            chunk_overlap: 100,
            split_by_title: true,
            split_by_paragraph: true,
            force_max_size: true,
            distribute_images_evenly: true,
            title_patterns: vec![],
            section_images: SectionImagePolicy::FirstChunk,
        }
    }
}

impl ChunkingConfig {
    /// Check the size options against each other.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "max_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(ConfigError::Invalid(format!(
                "min_chunk_size ({}) must not exceed max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Image sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub output_dir: Option<String>,
    pub unique_names: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            unique_names: true,
        }
    }
}

/// Directory parsing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub skip_hidden: bool,
    /// Glob patterns matched against file names.
    pub ignore_patterns: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["docx".to_string(), "md".to_string(), "pdf".to_string()],
            recursive: false,
            skip_hidden: true,
            ignore_patterns: vec!["~$*".to_string()],
        }
    }
}

impl BatchConfig {
    /// Whether a file extension is selected for batch parsing.
    pub fn accepts(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunking.max_chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert!(config.chunking.split_by_title);
        assert!(config.images.unique_names);
        assert_eq!(config.chunking.section_images, SectionImagePolicy::FirstChunk);
    }

    #[test]
    fn test_default_config_string_parses() {
        let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        assert_eq!(config.chunking, ChunkingConfig::default());
        assert_eq!(config.batch, BatchConfig::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.chunking.title_patterns.push("^Appendix".to_string());
        config.chunking.section_images = SectionImagePolicy::InlineOnly;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.chunking, deserialized.chunking);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [chunking]
            max_chunk_size = 300
            section_images = "inline_only"
            "#
        )
        .unwrap();

        let config = Config::load_from(temp_file.path()).unwrap();

        assert_eq!(config.chunking.max_chunk_size, 300);
        assert_eq!(config.chunking.section_images, SectionImagePolicy::InlineOnly);
        // Defaults should still work
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert!(config.batch.accepts("md"));
    }

    #[test]
    fn test_load_rejects_invalid_sizes() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [chunking]
            max_chunk_size = 50
            chunk_overlap = 50
            min_chunk_size = 10
            "#
        )
        .unwrap();

        let result = Config::load_from(temp_file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.chunking.max_chunk_size, 800);
    }

    #[test]
    fn test_validate() {
        let mut chunking = ChunkingConfig::default();
        assert!(chunking.validate().is_ok());

        chunking.max_chunk_size = 0;
        assert!(chunking.validate().is_err());

        chunking.max_chunk_size = 100;
        chunking.min_chunk_size = 200;
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn test_section_image_policy_from_str() {
        assert_eq!(
            "inline-only".parse::<SectionImagePolicy>().unwrap(),
            SectionImagePolicy::InlineOnly
        );
        assert_eq!(
            "first_chunk".parse::<SectionImagePolicy>().unwrap(),
            SectionImagePolicy::FirstChunk
        );
        assert!("everywhere".parse::<SectionImagePolicy>().is_err());
    }

    #[test]
    fn test_batch_accepts_dotted_and_case() {
        let batch = BatchConfig {
            extensions: vec![".MD".to_string()],
            ..BatchConfig::default()
        };
        assert!(batch.accepts("md"));
        assert!(!batch.accepts("pdf"));
    }

    #[test]
    fn test_image_dir_override() {
        let mut config = Config::default();
        config.images.output_dir = Some("/tmp/imgs".to_string());
        assert_eq!(config.image_dir().unwrap(), PathBuf::from("/tmp/imgs"));
    }

    #[test]
    fn test_image_dir_expands_tilde() {
        let mut config = Config::default();
        config.images.output_dir = Some("~/docslice-images".to_string());

        let dir = config.image_dir().unwrap();
        assert!(!dir.starts_with("~"));
        assert!(dir.ends_with("docslice-images"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(dir, Path::new(&home).join("docslice-images"));
        }
    }
}
