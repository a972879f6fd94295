//! Prompt budgeting.
//!
//! A prompt is the template with the document and the current topic labels
//! substituted in. When the three do not fit the model's input window the
//! budgeter either truncates the document (when the document itself is what
//! overflows) or drops topics from the prompt (when the topic list is what
//! overflows), preferring the topics most similar to the document.

use std::path::Path;
use std::sync::Arc;

use topicgen_embeddings::EmbeddingModel;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::tokens::TokenCounter;

const DOCUMENT_PLACEHOLDER: &str = "{Document}";
const TOPICS_PLACEHOLDER: &str = "{Topics}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Document,
    Topics,
}

/// A prompt template with `{Document}` and `{Topics}` placeholders.
///
/// Rendering substitutes in one pass, so placeholder text inside a
/// document is left alone.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut rest = raw.as_str();
        loop {
            let next = [
                (rest.find(DOCUMENT_PLACEHOLDER), DOCUMENT_PLACEHOLDER, Segment::Document),
                (rest.find(TOPICS_PLACEHOLDER), TOPICS_PLACEHOLDER, Segment::Topics),
            ]
            .into_iter()
            .filter_map(|(pos, token, seg)| pos.map(|p| (p, token, seg)))
            .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, token, seg)) => {
                    if pos > 0 {
                        segments.push(Segment::Text(rest[..pos].to_string()));
                    }
                    segments.push(seg);
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }
        Self { raw, segments }
    }

    /// Read a template file.
    pub fn from_file(path: &Path) -> Result<Self, GenerationError> {
        let template = Self::new(std::fs::read_to_string(path)?);
        if !template.segments.contains(&Segment::Document) {
            return Err(GenerationError::InvalidInput(format!(
                "prompt template {:?} has no {} placeholder",
                path, DOCUMENT_PLACEHOLDER
            )));
        }
        Ok(template)
    }

    /// The unrendered template text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute the document and topic section.
    pub fn render(&self, document: &str, topics: &str) -> String {
        let mut out = String::with_capacity(self.raw.len() + document.len() + topics.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Document => out.push_str(document),
                Segment::Topics => out.push_str(topics),
            }
        }
        out
    }
}

/// Token accounting for one prompt, before any truncation or pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    pub prompt_tokens: usize,
    pub document_tokens: usize,
    pub topic_list_tokens: usize,
    pub limit: usize,
}

impl PromptBudget {
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.document_tokens + self.topic_list_tokens
    }

    pub fn fits(&self) -> bool {
        self.total() <= self.limit
    }
}

/// How a prompt was made to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStrategy {
    /// Everything fit
    Full,
    /// The document was cut; topics were pruned too if they still overflowed
    TruncatedDocument { topics_pruned: bool },
    /// Topics ranked by similarity to the document, most similar kept
    SimilarityPruned,
    /// Topics kept in list order until the budget ran out
    GreedyPruned,
}

/// A rendered prompt and how it was produced.
#[derive(Debug, Clone)]
pub struct FormattedPrompt {
    pub prompt: String,
    pub budget: PromptBudget,
    pub strategy: BudgetStrategy,
    pub topics_included: usize,
    pub topics_total: usize,
}

/// Fits documents and topic lists into a token limit.
pub struct PromptBudgeter {
    counter: Arc<dyn TokenCounter>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    max_topic_headroom: usize,
}

/// Label part of a topic line: everything before the first `:`.
fn topic_label(topic: &str) -> &str {
    topic.split(':').next().unwrap_or(topic).trim()
}

impl PromptBudgeter {
    pub fn new(counter: Arc<dyn TokenCounter>, max_topic_headroom: usize) -> Self {
        Self {
            counter,
            embedder: None,
            max_topic_headroom,
        }
    }

    /// Rank topics by similarity when pruning.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Render `template` with `document` and as many topic labels as fit.
    ///
    /// The result never exceeds `token_limit` once the template plus the
    /// topic headroom fit in it.
    pub fn format_prompt(
        &self,
        template: &PromptTemplate,
        document: &str,
        topics: &[String],
        token_limit: usize,
    ) -> FormattedPrompt {
        let labels: Vec<&str> = topics.iter().map(|t| topic_label(t)).collect();
        let topic_str = labels.join("\n");

        let budget = PromptBudget {
            prompt_tokens: self.counter.count_tokens(template.as_str()),
            document_tokens: self.counter.count_tokens(document),
            topic_list_tokens: self.counter.count_tokens(&topic_str),
            limit: token_limit,
        };

        if budget.fits() {
            return FormattedPrompt {
                prompt: template.render(document, &topic_str),
                budget,
                strategy: BudgetStrategy::Full,
                topics_included: topics.len(),
                topics_total: topics.len(),
            };
        }

        let document_room = token_limit
            .saturating_sub(budget.prompt_tokens)
            .saturating_sub(self.max_topic_headroom);

        if budget.document_tokens > document_room {
            debug!(
                document_tokens = budget.document_tokens,
                keep = document_room,
                "Document too long, truncating"
            );
            let truncated = self.counter.truncate_to_tokens(document, document_room);
            let topic_room = token_limit
                .saturating_sub(budget.prompt_tokens)
                .saturating_sub(self.counter.count_tokens(&truncated));

            if budget.topic_list_tokens <= topic_room {
                return FormattedPrompt {
                    prompt: template.render(&truncated, &topic_str),
                    budget,
                    strategy: BudgetStrategy::TruncatedDocument {
                        topics_pruned: false,
                    },
                    topics_included: topics.len(),
                    topics_total: topics.len(),
                };
            }

            let (section, kept, _) = self.prune(&truncated, topics, &labels, topic_room);
            return FormattedPrompt {
                prompt: template.render(&truncated, &section),
                budget,
                strategy: BudgetStrategy::TruncatedDocument {
                    topics_pruned: true,
                },
                topics_included: kept,
                topics_total: topics.len(),
            };
        }

        let topic_room = token_limit
            .saturating_sub(budget.prompt_tokens)
            .saturating_sub(budget.document_tokens);
        debug!(
            topic_tokens = budget.topic_list_tokens,
            room = topic_room,
            "Too many topics, pruning"
        );
        let (section, kept, strategy) = self.prune(document, topics, &labels, topic_room);
        FormattedPrompt {
            prompt: template.render(document, &section),
            budget,
            strategy,
            topics_included: kept,
            topics_total: topics.len(),
        }
    }

    /// Build a topic section within `room` tokens.
    ///
    /// Returns the section, the number of topics kept and the strategy used.
    fn prune(
        &self,
        document: &str,
        topics: &[String],
        labels: &[&str],
        room: usize,
    ) -> (String, usize, BudgetStrategy) {
        if let Some(order) = self.rank_by_similarity(document, topics) {
            let (section, kept) = self.pack(order.into_iter().map(|i| labels[i]), room);
            return (section, kept, BudgetStrategy::SimilarityPruned);
        }
        let (section, kept) = self.pack(labels.iter().copied(), room);
        (section, kept, BudgetStrategy::GreedyPruned)
    }

    /// Accept labels in order until the next one would overflow `room`.
    fn pack<'a>(&self, labels: impl Iterator<Item = &'a str>, room: usize) -> (String, usize) {
        let mut section = String::new();
        let mut used = 0usize;
        let mut kept = 0usize;
        for label in labels {
            let entry = format!("{}\n", label);
            let cost = self.counter.count_tokens(&entry);
            if used + cost > room {
                break;
            }
            section.push_str(&entry);
            used += cost;
            kept += 1;
        }
        (section, kept)
    }

    /// Topic indices ordered by descending similarity to the document.
    ///
    /// `None` without an embedder or when embedding fails.
    fn rank_by_similarity(&self, document: &str, topics: &[String]) -> Option<Vec<usize>> {
        let embedder = self.embedder.as_ref()?;

        let doc_embedding = match embedder.embed(document) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Document embedding failed, pruning greedily");
                return None;
            }
        };
        let texts: Vec<&str> = topics.iter().map(String::as_str).collect();
        let topic_embeddings = match embedder.embed_batch(&texts) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Topic embedding failed, pruning greedily");
                return None;
            }
        };

        let mut scored: Vec<(usize, f32)> = topic_embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, emb.cosine_similarity(&doc_embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Some(scored.into_iter().map(|(i, _)| i).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::WordCounter;
    use topicgen_embeddings::{Embedding, EmbeddingError};

    const TEMPLATE: &str = "Identify topics in the document .\nDocument: {Document}\nTopics: {Topics}\nAnswer :";

    fn budgeter(headroom: usize) -> PromptBudgeter {
        PromptBudgeter::new(Arc::new(WordCounter), headroom)
    }

    fn words(n: usize, word: &str) -> String {
        vec![word; n].join(" ")
    }

    fn topics(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("[1] Topic{}: description number {}", i, i))
            .collect()
    }

    /// Scores topics by how many of their words appear in the document.
    struct OverlapEmbedder;

    impl EmbeddingModel for OverlapEmbedder {
        fn name(&self) -> &str {
            "overlap"
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            let lower = text.to_lowercase();
            Ok(Embedding::new(vec![
                lower.matches("trade").count() as f32,
                lower.matches("sports").count() as f32,
                0.1,
            ]))
        }
    }

    struct FailingEmbedder;

    impl EmbeddingModel for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_template_render_single_pass() {
        let template = PromptTemplate::new("A {Document} B {Topics} C");
        assert_eq!(template.render("doc {Topics}", "t1"), "A doc {Topics} B t1 C");
        let no_topics = PromptTemplate::new("only {Document}");
        assert_eq!(no_topics.render("x", "ignored"), "only x");
    }

    #[test]
    fn test_template_from_file_requires_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "no placeholders").unwrap();
        assert!(PromptTemplate::from_file(&path).is_err());

        std::fs::write(&path, "{Topics}\n{Document}").unwrap();
        assert!(PromptTemplate::from_file(&path).is_ok());
    }

    #[test]
    fn test_everything_fits() {
        let template = PromptTemplate::new(TEMPLATE);
        let result = budgeter(10).format_prompt(&template, "a short document", &topics(3), 1000);

        assert_eq!(result.strategy, BudgetStrategy::Full);
        assert_eq!(result.topics_included, 3);
        assert!(result.prompt.contains("[1] Topic0\n[1] Topic1\n[1] Topic2"));
        assert!(!result.prompt.contains("description number"));
    }

    #[test]
    fn test_long_document_is_truncated() {
        let template = PromptTemplate::new(TEMPLATE);
        let doc = words(500, "word");
        let b = budgeter(20);
        let result = b.format_prompt(&template, &doc, &topics(2), 100);

        let template_tokens = WordCounter.count_tokens(TEMPLATE);
        assert_eq!(
            result.strategy,
            BudgetStrategy::TruncatedDocument {
                topics_pruned: false
            }
        );
        assert_eq!(result.topics_included, 2);
        assert_eq!(
            result.prompt.matches("word").count(),
            100 - template_tokens - 20
        );
        assert!(WordCounter.count_tokens(&result.prompt) <= 100);
    }

    #[test]
    fn test_truncation_prunes_topics_beyond_headroom() {
        let template = PromptTemplate::new(TEMPLATE);
        let doc = words(500, "word");
        let result = budgeter(6).format_prompt(&template, &doc, &topics(40), 100);

        assert_eq!(
            result.strategy,
            BudgetStrategy::TruncatedDocument {
                topics_pruned: true
            }
        );
        assert!(result.topics_included < 40);
        assert_eq!(result.topics_included, 3);
        assert!(WordCounter.count_tokens(&result.prompt) <= 100);
    }

    #[test]
    fn test_greedy_pruning_keeps_prefix() {
        let template = PromptTemplate::new(TEMPLATE);
        let doc = words(50, "word");
        let result = budgeter(10).format_prompt(&template, &doc, &topics(100), 120);

        let template_tokens = WordCounter.count_tokens(TEMPLATE);
        let room = 120 - template_tokens - 50;
        assert_eq!(result.strategy, BudgetStrategy::GreedyPruned);
        assert_eq!(result.topics_included, room / 2);
        assert!(result.prompt.contains("[1] Topic0\n"));
        assert!(!result.prompt.contains(&format!("[1] Topic{}\n", room / 2)));
        assert!(WordCounter.count_tokens(&result.prompt) <= 120);
    }

    #[test]
    fn test_similarity_pruning_prefers_related_topics() {
        let template = PromptTemplate::new(TEMPLATE);
        let mut list: Vec<String> = (0..20)
            .map(|i| format!("[1] Sports{}: games", i))
            .collect();
        list.push("[1] Trade: imports and exports".to_string());

        let doc = format!("{} trade trade", words(40, "tariffs"));
        let template_tokens = WordCounter.count_tokens(TEMPLATE);
        let limit = template_tokens + 42 + 4;

        let b = budgeter(1).with_embedder(Arc::new(OverlapEmbedder));
        let result = b.format_prompt(&template, &doc, &list, limit);

        assert_eq!(result.strategy, BudgetStrategy::SimilarityPruned);
        assert_eq!(result.topics_included, 2);
        assert!(result.prompt.contains("[1] Trade\n"));
        assert!(result.prompt.contains("[1] Sports0\n"));
        assert!(WordCounter.count_tokens(&result.prompt) <= limit);
    }

    #[test]
    fn test_embedding_failure_falls_back_to_greedy() {
        let template = PromptTemplate::new(TEMPLATE);
        let doc = words(50, "word");
        let b = budgeter(10).with_embedder(Arc::new(FailingEmbedder));
        let result = b.format_prompt(&template, &doc, &topics(100), 120);
        assert_eq!(result.strategy, BudgetStrategy::GreedyPruned);
    }

    #[test]
    fn test_empty_topic_section_is_valid() {
        let template = PromptTemplate::new(TEMPLATE);
        let template_tokens = WordCounter.count_tokens(TEMPLATE);
        let doc = words(30, "word");
        let limit = template_tokens + 30 + 1;
        let result = budgeter(1).format_prompt(&template, &doc, &topics(5), limit);

        assert_eq!(result.topics_included, 0);
        assert!(result.prompt.contains("Topics: \nAnswer"));
    }

    #[test]
    fn test_budget_never_overflows() {
        let template = PromptTemplate::new(TEMPLATE);
        let template_tokens = WordCounter.count_tokens(TEMPLATE);
        let headroom = 15;
        let b = budgeter(headroom);

        for doc_len in [0, 5, 40, 90, 400] {
            for topic_count in [0, 1, 7, 30, 200] {
                for slack in [0, 1, 10, 60, 300] {
                    let limit = template_tokens + headroom + slack;
                    let doc = words(doc_len, "w");
                    let result = b.format_prompt(&template, &doc, &topics(topic_count), limit);
                    assert!(
                        WordCounter.count_tokens(&result.prompt) <= limit,
                        "overflow: doc={} topics={} limit={}",
                        doc_len,
                        topic_count,
                        limit
                    );
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let template = PromptTemplate::new(TEMPLATE);
        let doc = words(80, "word");
        let list = topics(60);
        let b = budgeter(10);
        let first = b.format_prompt(&template, &doc, &list, 150).prompt;
        let second = b.format_prompt(&template, &doc, &list, 150).prompt;
        assert_eq!(first, second);
    }
}
