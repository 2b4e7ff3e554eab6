//! Storage of uploaded cover images.

use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::Alphanumeric;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

const STORED_NAME_PREFIX_LEN: usize = 8;

/// Random prefix keeping uploads with the same name apart.
fn stored_name(filename: &str) -> String {
    let prefix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STORED_NAME_PREFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, filename)
}

/// Reduces an uploaded file name to a flat ASCII name that is safe to join
/// onto the images directory. Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let flattened = name.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn is_allowed_image(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => {
            ALLOWED_IMAGE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}

pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Opens the store, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create images directory {:?}", dir))?;
        info!("Serving images from {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes an upload and returns the stored file name, the sanitized
    /// upload name behind a random prefix.
    ///
    /// Uploads with an empty body, an unusable name or an extension outside
    /// [`ALLOWED_IMAGE_EXTENSIONS`] are skipped and yield `None`. Existing
    /// files are never overwritten.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<Option<String>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let filename = match sanitize_filename(original_name) {
            Some(name) if is_allowed_image(&name) => name,
            _ => {
                debug!("Ignoring upload with disallowed name {:?}", original_name);
                return Ok(None);
            }
        };

        let filename = stored_name(&filename);
        let path = self.dir.join(&filename);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create image {:?}", path))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("Failed to write image {:?}", path))?;
        file.flush().await?;
        info!("Stored image {} ({} bytes)", filename, bytes.len());
        Ok(Some(filename))
    }

    /// Path of a stored image. Names that could escape the directory are
    /// rejected.
    pub fn path_of(&self, filename: &str) -> Option<PathBuf> {
        match sanitize_filename(filename) {
            Some(safe) if safe == filename => Some(self.dir.join(safe)),
            _ => None,
        }
    }
}
