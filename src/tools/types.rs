use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PipelineError;

// @module: Value types exchanged with subtitle tool servers

/// Shortest accepted language code
pub const MIN_LANGUAGE_LEN: usize = 2;
/// Longest accepted language code
pub const MAX_LANGUAGE_LEN: usize = 8;

/// Check a language code against the accepted length bounds
pub fn is_valid_language_code(code: &str) -> bool {
    let len = code.trim().chars().count();
    (MIN_LANGUAGE_LEN..=MAX_LANGUAGE_LEN).contains(&len)
}

/// A single search for subtitles of one title in one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    title: String,
    year: Option<i32>,
    language: String,
    catalog_id: Option<u64>,
}

impl SearchQuery {
    /// Create a validated query
    pub fn new(title: &str, year: Option<i32>, language: &str) -> Result<Self, PipelineError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PipelineError::InvalidQuery("title must not be empty".to_string()));
        }
        if !is_valid_language_code(language) {
            return Err(PipelineError::InvalidQuery(format!(
                "language code '{}' must be {}-{} characters",
                language, MIN_LANGUAGE_LEN, MAX_LANGUAGE_LEN
            )));
        }
        Ok(Self {
            title: title.to_string(),
            year,
            language: language.trim().to_string(),
            catalog_id: None,
        })
    }

    /// Attach an external catalog id (numeric part of an IMDb id)
    pub fn with_catalog_id(mut self, catalog_id: Option<u64>) -> Self {
        self.catalog_id = catalog_id;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn catalog_id(&self) -> Option<u64> {
        self.catalog_id
    }
}

/// A subtitle offered by a tool server
///
/// Identity is the `id`; the `provider_payload` is opaque and handed back
/// verbatim when the item is downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleItem {
    pub id: String,
    pub language: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub download_count: Option<u64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub provider_payload: Map<String, Value>,
}

impl SubtitleItem {
    /// Create an item with only the mandatory fields set
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            file_name: None,
            format: None,
            release: None,
            download_count: None,
            score: None,
            encoding: None,
            provider_payload: Map::new(),
        }
    }

    /// Human readable label: release name, then file name, then id
    pub fn label(&self) -> &str {
        self.release
            .as_deref()
            .or(self.file_name.as_deref())
            .unwrap_or(&self.id)
    }

    /// Build the download request for this item
    pub fn download_request(&self) -> DownloadRequest {
        DownloadRequest {
            item_id: self.id.clone(),
            language: self.language.clone(),
            provider_payload: self.provider_payload.clone(),
        }
    }
}

/// Request to fetch the content of one subtitle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub item_id: String,
    pub language: String,
    pub provider_payload: Map<String, Value>,
}

/// Raw subtitle content returned by a tool server
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub content: Vec<u8>,
    pub file_name: String,
    pub language: String,
    /// Which backend served the content
    pub source: String,
}
