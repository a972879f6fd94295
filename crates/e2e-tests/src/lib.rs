//! End-to-end test infrastructure for topicgen.
//!
//! Provides a [`TestHarness`] that lays out a prompt template, seed file and
//! JSONL corpus in a temp directory and returns [`Settings`] pointing at them.

use std::fs;
use std::path::{Path, PathBuf};

use topicgen_embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use topicgen_generation::Document;
use topicgen_types::Settings;

/// Prompt template in the shape of the shipped generation prompt.
pub const TEMPLATE: &str = "You will receive a document and a set of top-level topics.\n\
[Topics]\n{Topics}\n\
[Document]\n{Document}\n\
Return any new or reused topics as [1] Topic: Description lines.";

/// Seed topics used by most scenarios.
pub const SEED: &str = "[1] Trade: Mentions the exchange of capital, goods, and services.\n";

/// Temp-dir workspace for one end-to-end run.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub root: PathBuf,
    pub settings: Settings,
}

impl TestHarness {
    /// Harness with the default template and seed and `texts` as the corpus.
    pub fn new(texts: &[&str]) -> Self {
        Self::with_seed(SEED, texts)
    }

    pub fn with_seed(seed: &str, texts: &[&str]) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        fs::write(root.join("prompt.txt"), TEMPLATE).expect("Failed to write template");
        fs::write(root.join("seed.md"), seed).expect("Failed to write seed");
        write_corpus(&root.join("data.jsonl"), texts);

        let mut settings = Settings::default();
        settings.data = path_str(&root.join("data.jsonl"));
        settings.generation.prompt = path_str(&root.join("prompt.txt"));
        settings.generation.seed = path_str(&root.join("seed.md"));
        settings.generation.output = path_str(&root.join("output").join("generation_1.jsonl"));
        settings.generation.topic_output = path_str(&root.join("output").join("generation_1.md"));
        settings.embeddings.enabled = false;

        Self {
            _temp_dir: temp_dir,
            root,
            settings,
        }
    }

    pub fn topic_file(&self) -> String {
        fs::read_to_string(&self.settings.generation.topic_output)
            .expect("Failed to read topic file")
    }

    /// Response log records, one JSON value per line.
    pub fn response_log(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(&self.settings.generation.output)
            .expect("Failed to read response log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("Invalid JSON in response log"))
            .collect()
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Write `texts` as JSONL records with sequential ids.
pub fn write_corpus(path: &Path, texts: &[&str]) {
    let body: String = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let record = serde_json::json!({"id": format!("doc-{}", i), "text": text});
            format!("{}\n", record)
        })
        .collect();
    fs::write(path, body).expect("Failed to write corpus");
}

/// In-memory documents with sequential ids.
pub fn documents(texts: &[&str]) -> Vec<Document> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Document::new(format!("doc-{}", i), *text))
        .collect()
}

/// Embedder that scores texts by keyword presence, one dimension per keyword.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl EmbeddingModel for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let lower = text.to_lowercase();
        let mut values: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| lower.matches(k.as_str()).count() as f32)
            .collect();
        values.push(0.01);
        Ok(Embedding::new(values))
    }
}
