/*!
 * Batch translation of SRT documents.
 *
 * The document is split into fixed-size batches of entries. Each batch is
 * rendered into one prompt, sent to the LLM, and the `{id, text}` array in
 * the answer is merged back by subtitle number. Timing and numbering never
 * pass through the model.
 *
 * A batch whose answer cannot be used keeps its original text. Progress is
 * reported once per batch on a best-effort basis.
 */

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::errors::TranslationError;
use crate::providers::LlmClient;
use crate::subtitle_processor::{SubtitleCollection, SubtitleEntry};

use super::prompts::{PromptTemplate, TranslationItem};
use super::response::parse_translations;

/// Entries per LLM call unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Progress after one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    /// 1-based number of the batch just processed
    pub current: usize,
    pub total: usize,
    /// `current / total * 100`
    pub percent: f64,
}

impl BatchProgress {
    pub fn new(current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        Self { current, total, percent }
    }
}

/// Receiver of per-batch progress. Errors are logged and ignored.
pub trait ProgressSink: Send + Sync {
    fn on_batch(&self, progress: BatchProgress) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(BatchProgress) -> Result<()> + Send + Sync,
{
    fn on_batch(&self, progress: BatchProgress) -> Result<()> {
        self(progress)
    }
}

impl ProgressSink for ProgressBar {
    fn on_batch(&self, progress: BatchProgress) -> Result<()> {
        self.set_length(progress.total as u64);
        self.set_position(progress.current as u64);
        Ok(())
    }
}

/// What happened while translating one document
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    /// The recomposed document
    pub text: String,
    pub entries: usize,
    pub batches: usize,
    /// Batches whose answer was merged
    pub translated_batches: usize,
    /// Entries whose text was replaced
    pub translated_entries: usize,
    /// Batches whose LLM call failed
    pub failed_batches: usize,
}

/// Batch translator driving an LLM client over an SRT document
#[derive(Clone)]
pub struct BatchTranslator {
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
    batch_size: usize,
}

impl BatchTranslator {
    /// Create a new batch translator
    pub fn new(llm: Arc<dyn LlmClient>, template: PromptTemplate) -> Self {
        Self {
            llm,
            template,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of entries per LLM call (at least one)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Translate an SRT document, returning the recomposed text
    pub async fn translate(
        &self,
        document: &str,
        source_language: &str,
        target_language: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<String, TranslationError> {
        self.translate_with_outcome(document, source_language, target_language, progress)
            .await
            .map(|outcome| outcome.text)
    }

    /// Translate an SRT document and report per-batch results.
    ///
    /// A document without entries is returned unchanged.
    pub async fn translate_with_outcome(
        &self,
        document: &str,
        source_language: &str,
        target_language: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<TranslationOutcome, TranslationError> {
        let mut collection = SubtitleCollection::parse(document);
        if collection.is_empty() {
            debug!("No subtitle entries to translate");
            return Ok(TranslationOutcome {
                text: document.to_string(),
                entries: 0,
                batches: 0,
                translated_batches: 0,
                translated_entries: 0,
                failed_batches: 0,
            });
        }

        let entries = collection.len();
        let total = entries.div_ceil(self.batch_size);
        info!(
            "Translating {} entries from {} to {} in {} batches",
            entries, source_language, target_language, total
        );

        let mut translated_batches = 0;
        let mut translated_entries = 0;
        let mut failed_batches = 0;
        let mut last_error = None;

        for (index, batch) in collection.entries.chunks_mut(self.batch_size).enumerate() {
            let current = index + 1;
            let started = Instant::now();

            match self.translate_batch(batch, source_language, target_language).await {
                Ok(Some(replaced)) => {
                    translated_batches += 1;
                    translated_entries += replaced;
                    debug!(
                        "Batch {}/{}: {} of {} entries translated in {:?}",
                        current, total, replaced, batch.len(), started.elapsed()
                    );
                }
                Ok(None) => {
                    warn!("Batch {}/{}: no JSON array in response, keeping original text", current, total);
                }
                Err(e) => {
                    warn!("Batch {}/{}: LLM call failed, keeping original text: {}", current, total, e);
                    failed_batches += 1;
                    last_error = Some(e.to_string());
                }
            }

            if let Some(sink) = progress {
                if let Err(e) = sink.on_batch(BatchProgress::new(current, total)) {
                    warn!("Progress callback failed: {}", e);
                }
            }
        }

        if failed_batches == total {
            return Err(TranslationError::AllBatchesFailed {
                batches: total,
                last_error: last_error.unwrap_or_default(),
            });
        }

        Ok(TranslationOutcome {
            text: collection.compose(),
            entries,
            batches: total,
            translated_batches,
            translated_entries,
            failed_batches,
        })
    }

    /// Translate one batch in place. `Ok(None)` means the answer was unusable.
    async fn translate_batch(
        &self,
        batch: &mut [SubtitleEntry],
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<usize>, TranslationError> {
        let items: Vec<TranslationItem> = batch
            .iter()
            .map(|entry| TranslationItem {
                id: entry.seq_num,
                text: entry.text.clone(),
            })
            .collect();
        let prompt = self.template.render(source_language, target_language, &items);

        let response = self.llm.generate(&prompt).await?;
        let Some(mapping) = parse_translations(&response) else {
            return Ok(None);
        };

        let mut replaced = 0;
        for entry in batch.iter_mut() {
            if let Some(text) = mapping.get(&entry.seq_num) {
                entry.text = text.clone();
                replaced += 1;
            }
        }
        Ok(Some(replaced))
    }
}
