//! Generic async file-based config source with SHA256 change detection.
//!
//! [`FileSource`] implements [`ConfigSource`] for any file format by
//! accepting a deserialization function at construction time. It reads
//! the file asynchronously via Tokio, validates the result, and computes
//! a SHA256 hash for version tracking, which is what the refresh loop
//! polls to detect edits.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{sha256_hex, validate_and_hash};
use crate::config::model::Config;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BellhopError;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>,
}

impl FileSource {
    #[must_use]
    pub fn new(
        path: PathBuf,
        name: &'static str,
        deserialize: fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    async fn read_content(&self) -> Result<String, BellhopError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BellhopError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                BellhopError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), BellhopError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|e| BellhopError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        validate_and_hash(config, &content)
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, BellhopError> {
        let content = self.read_content().await?;
        let hash = sha256_hex(content.as_bytes());
        Ok(*current != ConfigVersion::Hash(hash))
    }
}
