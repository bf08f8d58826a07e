use crate::domain::model::ExtractionRequest;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Output directories live under one base directory, one per request.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a directory owned by this request alone. An existing
    /// `<host>_<layer>` directory is left untouched and the next free
    /// `<host>_<layer>_<n>` is used instead.
    pub async fn prepare(&self, request: &ExtractionRequest) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.base_path).await?;

        let base_name = request.containing_dir_name();
        let mut dir = self.base_path.join(&base_name);
        let mut suffix = 0usize;
        loop {
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    dir = self.base_path.join(format!("{}_{}", base_name, suffix));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("Output directory ready: {}", dir.display());
        Ok(dir)
    }

    /// Best-effort removal of a directory left by a failed extraction.
    pub async fn discard(&self, dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            tracing::warn!("Could not remove {}: {}", dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crs::{Crs, Envelope};
    use crate::domain::model::OwsType;
    use tempfile::TempDir;
    use url::Url;

    fn request() -> ExtractionRequest {
        ExtractionRequest {
            url: Url::parse("http://geo.example.org/wfs").unwrap(),
            ows_type: OwsType::Wfs,
            layer_name: "roads".to_string(),
            namespace: None,
            bbox: Envelope::new(0.0, 0.0, 1.0, 1.0, Crs::WGS84).unwrap(),
            format: "shp".to_string(),
            projection: Crs::WGS84,
        }
    }

    #[tokio::test]
    async fn test_prepare_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("extractions"));

        let dir = storage.prepare(&request()).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(dir, temp_dir.path().join("extractions").join("geo.example.org_roads"));
    }

    #[tokio::test]
    async fn test_prepare_never_reuses_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let first = storage.prepare(&request()).await.unwrap();
        std::fs::write(first.join("roads.shp"), b"earlier run").unwrap();

        let second = storage.prepare(&request()).await.unwrap();
        let third = storage.prepare(&request()).await.unwrap();

        assert_eq!(second, temp_dir.path().join("geo.example.org_roads_1"));
        assert_eq!(third, temp_dir.path().join("geo.example.org_roads_2"));
        assert!(std::fs::read_dir(&second).unwrap().next().is_none());

        storage.discard(&second).await;
        assert_eq!(std::fs::read(first.join("roads.shp")).unwrap(), b"earlier run");
    }

    #[tokio::test]
    async fn test_discard_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let dir = storage.prepare(&request()).await.unwrap();
        std::fs::write(dir.join("partial.shp"), b"x").unwrap();

        storage.discard(&dir).await;

        assert!(!dir.exists());
    }
}
