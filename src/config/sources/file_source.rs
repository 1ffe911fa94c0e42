//! Generic async file-based config source.
//!
//! [`FileSource`] reads any supported format by accepting a
//! deserialization function at construction time. It reads the file
//! asynchronously via Tokio and maps I/O and parse failures onto
//! [`RelayError`] variants that name the offending path. Validation
//! happens later, once CLI overrides have been applied.

use std::path::PathBuf;

use crate::config::model::ServerConfig;
use crate::error::RelayError;

type Deserialize = fn(&str) -> Result<ServerConfig, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserialize,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserialize) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    async fn read_content(&self) -> Result<String, RelayError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                RelayError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<ServerConfig, RelayError> {
        let content = self.read_content().await?;

        (self.deserialize)(&content).map_err(|e| RelayError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}
