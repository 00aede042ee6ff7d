/*!
 * Prompt templates for subtitle translation.
 *
 * A template is plain text with `{source_lang}`, `{target_lang}` and
 * `{items_json}` placeholders. It is usually loaded from a file so that it
 * can be tuned without rebuilding.
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, TranslationItem};
