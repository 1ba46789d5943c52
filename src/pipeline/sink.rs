//! Per-image output: where each exported store JPEG goes.

use crate::error::DispatchError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives one finished image per store.
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store `image` under `file_name` and return where it went.
    async fn deliver(&self, file_name: &str, image: EncodedImage) -> Result<PathBuf, DispatchError>;
}

/// Writes images into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageSink for DirectorySink {
    async fn deliver(&self, file_name: &str, image: EncodedImage) -> Result<PathBuf, DispatchError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DispatchError::OutputWriteFailed {
                path: self.dir.clone(),
                source: e,
            })?;

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &image.data)
            .await
            .map_err(|e| DispatchError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        info!("Wrote {} ({} KB)", path.display(), image.data.len() / 1024);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path().join("out/images"));
        let image = EncodedImage {
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
        };
        let path = sink.deliver("Adidas_P001_Store.jpg", image).await.unwrap();
        assert!(path.ends_with("out/images/Adidas_P001_Store.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }
}
