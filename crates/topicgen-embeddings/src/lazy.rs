//! Deferred model construction.
//!
//! Loading the sentence model reads (and possibly downloads) ~90MB of
//! weights, which only pays off once a prompt actually needs pruning.
//! [`LazyEmbedder`] loads on first use and remembers a failed load, so a
//! run without network access keeps going on the greedy pruning path.

use std::sync::OnceLock;

use tracing::warn;

use crate::cache::ModelCache;
use crate::candle::SentenceEmbedder;
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel};

type Loader = Box<dyn Fn() -> Result<Box<dyn EmbeddingModel>, EmbeddingError> + Send + Sync>;

/// An embedding model built on first use.
pub struct LazyEmbedder {
    name: String,
    loader: Loader,
    model: OnceLock<Result<Box<dyn EmbeddingModel>, String>>,
}

impl LazyEmbedder {
    /// Wrap an arbitrary loader.
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EmbeddingModel>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(loader),
            model: OnceLock::new(),
        }
    }

    /// Lazily load the sentence embedder from `cache`.
    pub fn from_cache(cache: ModelCache) -> Self {
        let name = cache.repo_id.clone();
        Self::new(name, move || {
            SentenceEmbedder::load(&cache).map(|m| Box::new(m) as Box<dyn EmbeddingModel>)
        })
    }

    /// Whether a load has been attempted and succeeded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    fn model(&self) -> Result<&dyn EmbeddingModel, EmbeddingError> {
        let slot = self.model.get_or_init(|| {
            (self.loader)().map_err(|e| {
                warn!(model = %self.name, error = %e, "Embedding model failed to load");
                e.to_string()
            })
        });
        match slot {
            Ok(model) => Ok(model.as_ref()),
            Err(msg) => Err(EmbeddingError::Unavailable(msg.clone())),
        }
    }
}

impl EmbeddingModel for LazyEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.model()?.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.model()?.embed_batch(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct LengthEmbedder;

    impl EmbeddingModel for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(Embedding::new(vec![text.len() as f32, 1.0]))
        }
    }

    #[test]
    fn test_loads_once_on_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyEmbedder::new("length", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(LengthEmbedder) as Box<dyn EmbeddingModel>)
        });

        assert!(!lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        lazy.embed("a").unwrap();
        lazy.embed_batch(&["b", "c"]).unwrap();
        assert!(lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_remembered() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyEmbedder::new("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::Download("offline".to_string()))
        });

        assert!(matches!(lazy.embed("x"), Err(EmbeddingError::Unavailable(_))));
        assert!(matches!(lazy.embed("y"), Err(EmbeddingError::Unavailable(_))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!lazy.is_loaded());
    }
}
