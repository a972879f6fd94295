//! Model file cache.
//!
//! Model files are fetched from HuggingFace Hub on first use and copied into
//! a per-repository directory under the cache root.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Sentence-transformers model used for topic ranking.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Where model files live on disk.
#[derive(Debug, Clone)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("topicgen")
            .join("models");
        Self::new(cache_dir, DEFAULT_MODEL_REPO)
    }
}

/// Resolved model file paths.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Directory holding this repository's files.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Expected file paths, whether or not they exist yet.
    pub fn paths(&self) -> ModelPaths {
        let dir = self.model_dir();
        ModelPaths {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }

    /// Whether every model file is present.
    pub fn is_cached(&self) -> bool {
        let paths = self.paths();
        paths.config.exists() && paths.tokenizer.exists() && paths.weights.exists()
    }

    /// Return cached paths, downloading missing files first.
    pub fn ensure(&self) -> Result<ModelPaths, EmbeddingError> {
        if self.is_cached() {
            debug!(path = ?self.model_dir(), "Using cached embedding model");
        } else {
            self.download()?;
        }
        Ok(self.paths())
    }

    fn download(&self) -> Result<(), EmbeddingError> {
        use hf_hub::api::sync::Api;

        info!(repo = %self.repo_id, "Downloading embedding model");
        let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
        let repo = api.model(self.repo_id.clone());

        let dir = self.model_dir();
        fs::create_dir_all(&dir)?;

        for filename in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            let fetched = repo
                .get(filename)
                .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;
            fs::copy(&fetched, dir.join(filename))?;
            debug!(file = filename, "Cached model file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_default() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("topicgen"));
        assert_eq!(cache.repo_id, DEFAULT_MODEL_REPO);
    }

    #[test]
    fn test_model_dir_flattens_repo() {
        let cache = ModelCache::new("/tmp/models", "org/name");
        assert_eq!(cache.model_dir(), PathBuf::from("/tmp/models/org_name"));
        assert!(cache.paths().weights.ends_with("model.safetensors"));
    }

    #[test]
    fn test_is_cached() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert!(!cache.is_cached());

        fs::create_dir_all(cache.model_dir()).unwrap();
        for file in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            fs::write(cache.model_dir().join(file), b"{}").unwrap();
        }
        assert!(cache.is_cached());
        assert!(cache.ensure().is_ok());
    }
}
