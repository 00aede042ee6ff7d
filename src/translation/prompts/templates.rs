use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::TranslationError;

/// One subtitle entry as presented to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationItem {
    pub id: usize,
    pub text: String,
}

/// Batch translation prompt with language and item placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    pub const SOURCE_PLACEHOLDER: &'static str = "{source_lang}";
    pub const TARGET_PLACEHOLDER: &'static str = "{target_lang}";
    pub const ITEMS_PLACEHOLDER: &'static str = "{items_json}";

    /// Built-in prompt used when no template file is configured
    pub const SUBTITLE_BATCH: &'static str = r#"You translate subtitles from {source_lang} to {target_lang}.

Translate the "text" of every item in the JSON array below.
- Keep each "id" unchanged and return every item exactly once.
- Keep line breaks, formatting tags such as <i> and sound cues such as [music].
- Keep lines short enough to be read on screen.

Respond with a JSON array only, in the form [{"id": 1, "text": "..."}], with no other text.

{items_json}"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        if !template.contains(Self::ITEMS_PLACEHOLDER) {
            warn!("Prompt template has no {} placeholder", Self::ITEMS_PLACEHOLDER);
        }
        Self {
            template: template.to_string(),
        }
    }

    /// Load a template from a UTF-8 text file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TranslationError> {
        let path = path.as_ref();
        let template = fs::read_to_string(path).map_err(|e| {
            TranslationError::Prompt(format!("cannot read {}: {}", path.display(), e))
        })?;
        if template.trim().is_empty() {
            return Err(TranslationError::Prompt(format!("{} is empty", path.display())));
        }
        Ok(Self::new(&template))
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render the prompt for one batch
    pub fn render(&self, source_lang: &str, target_lang: &str, items: &[TranslationItem]) -> String {
        // Serializing plain structs cannot fail
        let items_json = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());

        // Items last, so placeholder-like text inside subtitles stays untouched
        self.template
            .replace(Self::SOURCE_PLACEHOLDER, source_lang)
            .replace(Self::TARGET_PLACEHOLDER, target_lang)
            .replace(Self::ITEMS_PLACEHOLDER, &items_json)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(Self::SUBTITLE_BATCH)
    }
}
