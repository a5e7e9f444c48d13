//! Writes response bodies to files named after the URL's last path segment.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::FetchError;

/// Output folder for fetched bodies.
#[derive(Debug, Clone)]
pub struct FileSink {
    folder: PathBuf,
}

impl FileSink {
    /// Creates a sink writing into `folder`.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// The destination folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Output path for `url`: the folder joined with everything after the last `/`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::EmptyFileName`] when the URL ends with `/`.
    pub fn path_for(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = url::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
        let name = path.rsplit('/').next().unwrap_or_default();
        if name.is_empty() {
            return Err(FetchError::EmptyFileName {
                url: url.to_string(),
            });
        }
        Ok(self.folder.join(name))
    }

    /// Truncates or creates the output file for `url` and writes `body` to it.
    ///
    /// The handle is flushed and dropped before returning.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Io`] if the file cannot be created or written, and
    /// [`FetchError::EmptyFileName`] if no filename can be derived.
    pub async fn write(&self, url: &str, body: &[u8]) -> Result<u64, FetchError> {
        let path = self.path_for(url)?;
        let mut file = File::create(&path)
            .await
            .map_err(|e| FetchError::io(path.clone(), e))?;
        file.write_all(body)
            .await
            .map_err(|e| FetchError::io(path.clone(), e))?;
        file.flush()
            .await
            .map_err(|e| FetchError::io(path.clone(), e))?;

        let written = body.len() as u64;
        debug!(path = %path.display(), bytes = written, "wrote response body");
        Ok(written)
    }
}
