//! Output directory for images extracted from documents.

use crate::error::{IngestError, IngestResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes the images of one document under deterministic, order-preserving names.
///
/// Names are `<stem>_<tag>_image<N>.<ext>`, where the tag is derived from
/// the document bytes, or `<stem>_image<N>.<ext>` when no tag is used.
#[derive(Debug)]
pub struct ImageSink {
    dir: PathBuf,
    prefix: String,
    counter: usize,
}

impl ImageSink {
    /// Create a sink for one document.
    pub fn for_document(dir: &Path, source: &Path, content: &[u8], unique_names: bool) -> Self {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");

        let prefix = if unique_names {
            let digest = Sha256::digest(content);
            format!("{}_{}", stem, &hex::encode(digest)[..8])
        } else {
            stem.to_string()
        };

        Self {
            dir: dir.to_path_buf(),
            prefix,
            counter: 0,
        }
    }

    /// Number of images written so far.
    pub fn count(&self) -> usize {
        self.counter
    }

    fn next_path(&mut self, extension: &str) -> PathBuf {
        self.counter += 1;
        let ext = match extension.to_ascii_lowercase().as_str() {
            "jpeg" => "jpg".to_string(),
            "" => "bin".to_string(),
            other => other.to_string(),
        };
        self.dir
            .join(format!("{}_image{}.{}", self.prefix, self.counter, ext))
    }

    /// Store image bytes, returning the written path.
    pub fn write(&mut self, bytes: &[u8], extension: &str) -> IngestResult<String> {
        let path = self.next_path(extension);
        let shown = path.to_string_lossy().to_string();

        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, bytes))
            .map_err(|e| IngestError::ImageExtraction {
                image: shown.clone(),
                message: e.to_string(),
            })?;

        debug!("Wrote image {} ({} bytes)", shown, bytes.len());
        Ok(shown)
    }

    /// Copy an image produced by an external tool into the sink.
    pub fn import(&mut self, source: &Path) -> IngestResult<String> {
        let bytes = std::fs::read(source).map_err(|e| IngestError::ImageExtraction {
            image: source.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.write(&bytes, extension)
    }
}
