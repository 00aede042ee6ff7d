use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ToolError;
use crate::pipeline::selector::{MatchCandidate, SubtitleSelector};
use crate::tools::ToolTransport;

// @module: Title catalog lookup (IMDb ids) through a tool server

/// Default name of the catalog search tool
pub const DEFAULT_CATALOG_TOOL: &str = "Autocomplete";

/// A title known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog id, e.g. `tt0113277`
    pub id: String,
    pub title: String,
    /// Title type, e.g. `movie` or `tvSeries`
    pub kind: String,
    pub year: Option<i32>,
    pub description: Option<String>,
}

impl CatalogEntry {
    /// Numeric part of the id (`tt0113277` -> `113277`)
    pub fn numeric_id(&self) -> Option<u64> {
        let digits: String = self.id.chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

impl MatchCandidate for CatalogEntry {
    fn title(&self) -> &str {
        &self.title
    }

    fn year(&self) -> Option<i32> {
        self.year
    }

    fn kind(&self) -> Option<&str> {
        (!self.kind.is_empty()).then_some(self.kind.as_str())
    }
}

/// Resolves free-text titles to catalog entries
pub struct CatalogLookup<T: ToolTransport> {
    transport: T,
    tool_name: String,
}

impl<T: ToolTransport> CatalogLookup<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            tool_name: DEFAULT_CATALOG_TOOL.to_string(),
        }
    }

    pub fn with_tool_name(mut self, tool_name: &str) -> Self {
        self.tool_name = tool_name.to_string();
        self
    }

    /// All catalog entries matching `query`
    pub async fn lookup(&self, query: &str) -> Result<Vec<CatalogEntry>, ToolError> {
        let result = self
            .transport
            .call_tool(&self.tool_name, json!({ "query": query }))
            .await?;
        let entries = parse_entries(&result);
        debug!("Catalog lookup for '{}' returned {} entries", query, entries.len());
        Ok(entries)
    }

    /// The entry best matching `query`, `year` and `type_hint`
    pub async fn lookup_best_match(
        &self,
        query: &str,
        year: Option<i32>,
        type_hint: Option<&str>,
    ) -> Result<Option<CatalogEntry>, ToolError> {
        let entries = self.lookup(query).await?;
        Ok(SubtitleSelector::best_match(&entries, query, year, type_hint).cloned())
    }
}

/// Resolution of a title to its numeric catalog id
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    async fn resolve_id(&self, title: &str, year: Option<i32>) -> Result<Option<u64>, ToolError>;
}

#[async_trait]
impl<T: ToolTransport> CatalogResolver for CatalogLookup<T> {
    async fn resolve_id(&self, title: &str, year: Option<i32>) -> Result<Option<u64>, ToolError> {
        let best = self.lookup_best_match(title, year, None).await?;
        Ok(best.and_then(|entry| entry.numeric_id()))
    }
}

/// Parse the catalog tool's list output, skipping entries without an id
pub fn parse_entries(result: &Value) -> Vec<CatalogEntry> {
    let Some(list) = result.as_array() else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let id = entry.get("id").and_then(Value::as_str).unwrap_or_default();
            if id.is_empty() {
                return None;
            }
            Some(CatalogEntry {
                id: id.to_string(),
                title: string_field(entry, "primaryTitle"),
                kind: string_field(entry, "type"),
                year: entry
                    .get("startYear")
                    .and_then(Value::as_i64)
                    .and_then(|y| i32::try_from(y).ok()),
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

fn string_field(entry: &Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
