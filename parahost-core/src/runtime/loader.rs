use std::path::PathBuf;

use tracing::debug;

use super::LoadError;
use crate::config::DriverConfig;

pub const SOURCE_EXTENSION: &str = "phs";

/// Finds and reads `<module>.phs` files. The first search path holding the
/// file wins.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    max_bytes: usize,
}

impl ModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>, max_bytes: usize) -> Self {
        Self {
            search_paths,
            max_bytes,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.search_paths.clone(), config.max_script_bytes)
    }

    pub fn resolve(&self, module: &str) -> Result<PathBuf, LoadError> {
        let file = format!("{}.{}", module, SOURCE_EXTENSION);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file))
            .find(|path| path.is_file())
            .ok_or_else(|| LoadError::NotFound {
                module: module.to_string(),
                searched: self.search_paths.clone(),
            })
    }

    pub async fn read(&self, module: &str) -> Result<(PathBuf, String), LoadError> {
        let path = self.resolve(module)?;
        let io = |source| LoadError::Io {
            path: path.clone(),
            source,
        };
        let size = tokio::fs::metadata(&path).await.map_err(io)?.len();
        if size > self.max_bytes as u64 {
            return Err(LoadError::TooLarge {
                path,
                size,
                limit: self.max_bytes,
            });
        }
        let bytes = tokio::fs::read(&path).await.map_err(io)?;
        debug!(module, path = %path.display(), bytes = bytes.len(), "module source read");
        let source = String::from_utf8(bytes).map_err(|_| LoadError::Utf8(path.clone()))?;
        Ok((path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_first_search_path_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(second.path().join("driver.phs"), "let a = 2;").unwrap();
        let loader = ModuleLoader::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            1024,
        );
        let (path, source) = loader.read("driver").await.unwrap();
        assert_eq!(path, second.path().join("driver.phs"));
        assert_eq!(source, "let a = 2;");

        fs::write(first.path().join("driver.phs"), "let a = 1;").unwrap();
        let (_, source) = loader.read("driver").await.unwrap();
        assert_eq!(source, "let a = 1;");
    }

    #[tokio::test]
    async fn test_missing_and_oversized() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.phs"), "x".repeat(65)).unwrap();
        let loader = ModuleLoader::new(vec![dir.path().to_path_buf()], 64);

        assert!(matches!(
            loader.read("absent").await,
            Err(LoadError::NotFound { .. })
        ));
        assert!(matches!(
            loader.read("big").await,
            Err(LoadError::TooLarge { size: 65, limit: 64, .. })
        ));
    }
}
