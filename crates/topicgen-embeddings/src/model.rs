//! Embedding model trait and vector type.

use crate::error::EmbeddingError;

/// A unit-length embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Build an embedding, normalizing to unit length.
    /// A zero vector is kept as is.
    pub fn new(mut values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|x| *x /= norm);
        }
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Mismatched dimensions score 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        // Both sides are unit length, so the dot product is the cosine.
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Text embedding model.
pub trait EmbeddingModel: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str;

    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed several texts. Default implementation embeds one at a time.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        assert!((emb.values()[0] - 0.6).abs() < 0.001);
        assert!((emb.values()[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_kept() {
        let emb = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(emb.values(), &[0.0, 0.0]);
        assert_eq!(emb.cosine_similarity(&Embedding::new(vec![1.0, 0.0])), 0.0);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![10.0, 0.0]);
        let c = Embedding::new(vec![0.0, 2.0]);
        let d = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 0.001);
        assert!(a.cosine_similarity(&c).abs() < 0.001);
        assert!((a.cosine_similarity(&d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }
}
