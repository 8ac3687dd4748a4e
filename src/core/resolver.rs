use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ReviewError, Result};

/// Materializes a repository locator into a readable local root. Local paths
/// pass through; URLs are cloned next to the knowledge base.
pub struct SourceResolver {
    clone_root: PathBuf,
}

impl SourceResolver {
    pub fn new(storage_root: &Path) -> Self {
        Self {
            clone_root: storage_root.to_path_buf(),
        }
    }

    pub async fn resolve(&self, locator: &str) -> Result<PathBuf> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return self.clone_remote(locator).await;
        }

        let path = PathBuf::from(locator);
        if !path.exists() {
            return Err(ReviewError::Resolve(format!(
                "repository path does not exist: {}",
                locator
            )));
        }
        Ok(path)
    }

    async fn clone_remote(&self, url: &str) -> Result<PathBuf> {
        let destination = self.clone_root.join("repo_clone");

        // A stale prior clone must not shadow the fresh one
        if destination.exists() {
            info!("Removing existing clone directory {}", destination.display());
            std::fs::remove_dir_all(&destination)?;
        }
        std::fs::create_dir_all(&self.clone_root)?;

        info!("Cloning {} into {}", url, destination.display());
        let status = tokio::process::Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(&destination)
            .status()
            .await
            .map_err(|e| ReviewError::Resolve(format!("failed to run git clone: {}", e)))?;

        if !status.success() {
            return Err(ReviewError::Resolve(format!(
                "git clone of {} exited with {}",
                url, status
            )));
        }

        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_path_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(Path::new("./knowledge"));
        let resolved = resolver
            .resolve(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[tokio::test]
    async fn test_missing_local_path_is_an_error() {
        let resolver = SourceResolver::new(Path::new("./knowledge"));
        assert!(resolver.resolve("/definitely/not/here").await.is_err());
    }
}
