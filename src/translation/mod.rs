/*!
 * Translation of subtitle documents with an LLM.
 *
 * - `batch`: splits a document into batches and merges the answers
 * - `prompts`: prompt templates rendered for each batch
 * - `response`: recovery of the JSON answer from model output
 */

// Re-export main types for easier usage
pub use self::batch::{BatchProgress, BatchTranslator, ProgressSink, TranslationOutcome};
pub use self::prompts::{PromptTemplate, TranslationItem};

// Submodules
pub mod batch;
pub mod prompts;
pub mod response;
