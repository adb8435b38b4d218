use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::themes::ThemeGroup;

/// Prefix marking extracted images in asset paths
pub const BASE64_IMAGE_ROUTE_PREFIX: &str = "img/base64/";
pub const DEFAULT_THUMBNAIL_IMAGE: &str = "img/mapthumbs/default.jpg";
const THUMBNAIL_DIR: &str = "mapthumbs";

/// Writes Base64 encoded thumbnails to a temporary directory that lives as
/// long as the extractor
#[derive(Debug, Default)]
pub struct ThumbnailExtractor {
    dir: Option<TempDir>,
}

impl ThumbnailExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `mapthumbs/`, if anything was extracted
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn into_dir(self) -> Option<TempDir> {
        self.dir
    }

    /// Resolve item thumbnails of the whole tree and of the catalog
    /// background layers
    pub fn extract_catalog(&mut self, themes: &mut ThemeGroup) {
        for item in themes.all_items_mut() {
            if item.thumbnail.is_some() {
                continue;
            }
            let encoded = item.extra.remove("thumbnail_base64");
            let name = item.name.clone().unwrap_or_default();
            item.thumbnail = Some(self.resolve(&name, encoded));
        }

        for layer in themes.background_layers.iter_mut().flatten() {
            if layer.extra.contains_key("thumbnail") {
                continue;
            }
            let encoded = layer.extra.remove("thumbnail_base64");
            let name = format!("bg_{}", layer.name());
            let path = self.resolve(&name, encoded);
            layer.extra.insert("thumbnail".to_string(), Value::String(path));
        }
    }

    fn resolve(&mut self, name: &str, encoded: Option<Value>) -> String {
        encoded
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|data| match self.extract(name, data) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::error!("Could not extract Base64 encoded thumbnail image for '{}': {}", name, e);
                    None
                }
            })
            .unwrap_or_else(|| DEFAULT_THUMBNAIL_IMAGE.to_string())
    }

    /// Decode one image and return its asset path
    pub fn extract(&mut self, name: &str, data: &str) -> Result<String, ThumbnailError> {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact)?;

        let dir = self.thumbnail_dir()?;
        // No random suffix so clients may cache the image
        let filename = format!("{}.png", file_stem(name));
        std::fs::write(dir.join(&filename), bytes)?;

        Ok(format!("{}{}/{}", BASE64_IMAGE_ROUTE_PREFIX, THUMBNAIL_DIR, filename))
    }

    fn thumbnail_dir(&mut self) -> Result<PathBuf, ThumbnailError> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let dir = tempfile::Builder::new().prefix("map-viewer-").tempdir()?;
                std::fs::create_dir_all(dir.path().join(THUMBNAIL_DIR))?;
                tracing::debug!("Extracting thumbnails to {}", dir.path().display());
                dir
            }
        };
        let path = dir.path().join(THUMBNAIL_DIR);
        self.dir = Some(dir);
        Ok(path)
    }
}

/// Image names end up as file names
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("invalid Base64 data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
