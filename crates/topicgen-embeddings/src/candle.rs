//! Candle sentence embedder (all-MiniLM-L6-v2, mean pooled).

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::cache::{ModelCache, ModelPaths};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel};

/// Token window of the model; longer documents are cut at this length.
pub const MAX_SEQ_LENGTH: usize = 256;

/// BERT encoder with mean pooling over non-padding tokens.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    name: String,
}

impl SentenceEmbedder {
    /// Load from the cache, downloading the model if needed.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = cache.ensure()?;
        let mut embedder = Self::load_from_paths(&paths)?;
        embedder.name = cache.repo_id.clone();
        Ok(embedder)
    }

    /// Load from explicit files.
    pub fn load_from_paths(paths: &ModelPaths) -> Result<Self, EmbeddingError> {
        info!("Loading embedding model");
        let device = Device::Cpu;

        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&paths.config)?)
            .map_err(|e| EmbeddingError::ModelLoad(format!("invalid config: {}", e)))?;

        let tokenizer = load_tokenizer(&paths.tokenizer)?;

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            name: "all-MiniLM-L6-v2".to_string(),
        })
    }

    fn mean_pool(hidden: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let mask = mask.to_dtype(DType::F32)?;
        let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
        let counts = mask.sum_keepdim(1)?.clamp(1e-9, f64::MAX)?;
        Ok(summed.broadcast_div(&counts)?)
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer, EmbeddingError> {
    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    Ok(tokenizer)
}

impl EmbeddingModel for SentenceEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::ModelLoad("empty batch output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }
        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled: Vec<Vec<f32>> = Self::mean_pool(&hidden, &attention_mask)?.to_vec2()?;

        debug!(count = pooled.len(), "Embedded batch");
        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}
