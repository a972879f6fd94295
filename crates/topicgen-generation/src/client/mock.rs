//! Scripted completion client for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionClient, CompletionError, CompletionParams};
use crate::generator::CancellationFlag;
use crate::tokens::{TokenCounter, WordCounter};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text
    Text(String),
    /// Fail with an API error carrying this message
    Fail(String),
    /// Fail with [`CompletionError::Interrupted`]
    Interrupt,
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }
}

/// Mock client that replays a script and records every prompt.
///
/// Token counting is whitespace-based so budgets in tests are exact.
pub struct MockCompletionClient {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    prompts: Mutex<Vec<String>>,
    cancel_on_call: Option<(usize, CancellationFlag)>,
}

impl MockCompletionClient {
    /// Create a mock that answers with `replies` in order, then with empty text.
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            fallback: MockReply::Text(String::new()),
            prompts: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    /// Create a mock that returns each text in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| MockReply::Text(t.into())))
    }

    /// Reply used once the script runs out.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Set `flag` while serving the `call`-th completion (1-based).
    ///
    /// The call still returns its scripted reply, as a real request would
    /// when Ctrl-C arrives mid-flight.
    pub fn cancel_during_call(mut self, call: usize, flag: CancellationFlag) -> Self {
        self.cancel_on_call = Some((call, flag));
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of completions requested.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TokenCounter for MockCompletionClient {
    fn count_tokens(&self, text: &str) -> usize {
        WordCounter.count_tokens(text)
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        WordCounter.truncate_to_tokens(text, max_tokens)
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        _params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let call = {
            let mut prompts = self
                .prompts
                .lock()
                .map_err(|_| CompletionError::Api("mock state poisoned".to_string()))?;
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some((n, flag)) = &self.cancel_on_call {
            if *n == call {
                flag.cancel();
            }
        }

        let reply = self
            .script
            .lock()
            .map_err(|_| CompletionError::Api("mock state poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(msg) => Err(CompletionError::Api(msg)),
            MockReply::Interrupt => Err(CompletionError::Interrupted),
        }
    }
}
