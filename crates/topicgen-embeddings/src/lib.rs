//! # topicgen-embeddings
//!
//! Sentence embeddings used to rank candidate topics against a document when
//! a prompt has to be pruned.
//!
//! ## Features
//! - Local inference via Candle with all-MiniLM-L6-v2 (384 dimensions)
//! - Model files fetched from HuggingFace Hub once, then cached
//! - [`LazyEmbedder`] defers loading until the first embedding request and
//!   reports a failed load as an error on every call instead of panicking

pub mod cache;
pub mod candle;
pub mod error;
pub mod lazy;
pub mod model;

pub use crate::candle::SentenceEmbedder;
pub use cache::{ModelCache, ModelPaths, DEFAULT_MODEL_REPO};
pub use error::EmbeddingError;
pub use lazy::LazyEmbedder;
pub use model::{Embedding, EmbeddingModel};
