/*!
 * Mock LLM client for tests and offline runs.
 *
 * This module provides a client that simulates different model behaviors:
 * - `MockProvider::working()` - Answers every batch with a JSON array
 * - `MockProvider::unparseable()` - Answers with prose and no array
 * - `MockProvider::failing()` - Always fails with an error
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::LlmClient;
use crate::translation::prompts::TranslationItem;
use crate::translation::response::find_balanced_array;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Translates every item, prefixing its text with `[TRANSLATED]`
    Working,
    /// Answers with prose that contains no JSON array
    Unparseable,
    /// Translates only items at even positions of the batch
    Partial,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
}

/// Mock client recording every prompt it receives
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Prompts received, shared between clones
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn unparseable() -> Self {
        Self::new(MockBehavior::Unparseable)
    }

    pub fn partial() -> Self {
        Self::new(MockBehavior::Partial)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Number of `generate` calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Items embedded in a rendered prompt.
    ///
    /// Templates may show an example array before the real one, so the last
    /// array that parses as items wins.
    pub fn items_in_prompt(prompt: &str) -> Vec<TranslationItem> {
        let mut found = Vec::new();
        let mut offset = 0;
        while let Some(pos) = prompt[offset..].find('[') {
            let start = offset + pos;
            match find_balanced_array(&prompt[start..]) {
                Some(span) => {
                    if let Ok(items) = serde_json::from_str::<Vec<TranslationItem>>(span) {
                        found = items;
                        offset = start + span.len();
                        continue;
                    }
                    offset = start + 1;
                }
                None => break,
            }
        }
        found
    }

    /// Build a well-formed answer for the given items
    pub fn translated_response(items: &[TranslationItem]) -> String {
        let translated: Vec<TranslationItem> = items
            .iter()
            .map(|item| TranslationItem {
                id: item.id,
                text: format!("[TRANSLATED] {}", item.text),
            })
            .collect();
        serde_json::to_string(&translated).unwrap_or_else(|_| "[]".to_string())
    }

    fn working_response(prompt: &str) -> String {
        let items = Self::items_in_prompt(prompt);
        format!("Here is the translation:\n{}", Self::translated_response(&items))
    }
}

#[async_trait]
impl LlmClient for MockProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        match self.behavior {
            MockBehavior::Working => Ok(Self::working_response(prompt)),

            MockBehavior::Unparseable => {
                Ok("I'm sorry, I can only translate one line at a time.".to_string())
            }

            MockBehavior::Partial => {
                let items: Vec<TranslationItem> = Self::items_in_prompt(prompt)
                    .into_iter()
                    .step_by(2)
                    .collect();
                Ok(Self::translated_response(&items))
            }

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::working_response(prompt))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
