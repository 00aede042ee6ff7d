/*!
 * OpenSubtitles tool server adapter.
 *
 * Maps `SearchQuery`/`DownloadRequest` onto the server's search and download
 * tools and maps the loosely shaped tool output back onto `SubtitleItem` and
 * `DownloadResult`. Works over any `ToolTransport`.
 */

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::errors::ToolError;
use crate::metrics::{MetricsSink, NoopMetrics, ToolCallRecord};
use crate::tools::types::{DownloadRequest, DownloadResult, SearchQuery, SubtitleItem};
use crate::tools::{SubtitleSource, ToolTransport, TransportKind};

/// Default name of the search tool
pub const DEFAULT_SEARCH_TOOL: &str = "search_subtitles";
/// Default name of the download tool
pub const DEFAULT_DOWNLOAD_TOOL: &str = "download_subtitle";

/// Keys that may hold the result list, in lookup order
const RESULT_LIST_KEYS: [&str; 3] = ["subtitles", "items", "data"];

/// Subtitle source backed by an OpenSubtitles tool server
pub struct OpenSubtitlesTool<T: ToolTransport> {
    transport: T,
    search_tool: String,
    download_tool: String,
    metrics: Arc<dyn MetricsSink>,
}

impl<T: ToolTransport> OpenSubtitlesTool<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            search_tool: DEFAULT_SEARCH_TOOL.to_string(),
            download_tool: DEFAULT_DOWNLOAD_TOOL.to_string(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Override the tool names exposed by the server
    pub fn with_tool_names(mut self, search_tool: &str, download_tool: &str) -> Self {
        self.search_tool = search_tool.to_string();
        self.download_tool = download_tool.to_string();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Tag identifying this backend on download results
    pub fn source_tag(&self) -> &'static str {
        match self.transport.kind() {
            TransportKind::Http => "opensubtitles_mcp",
            TransportKind::Stdio => "opensubtitles_mcp_stdio",
        }
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError> {
        let request_bytes = arguments.to_string().len();
        let started = Instant::now();

        let result = self.transport.call_tool(tool_name, arguments).await;

        let response_bytes = result.as_ref().map(|v| v.to_string().len()).unwrap_or(0);
        self.metrics.log_tool_call(&ToolCallRecord {
            tool_name: tool_name.to_string(),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            request_bytes,
            response_bytes,
            success: result.is_ok(),
        });
        result
    }
}

#[async_trait]
impl<T: ToolTransport> SubtitleSource for OpenSubtitlesTool<T> {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SubtitleItem>, ToolError> {
        let mut arguments = json!({
            "query": query.title(),
            "languages": query.language(),
        });
        if let Some(year) = query.year() {
            arguments["year"] = json!(year);
        }
        if let Some(catalog_id) = query.catalog_id() {
            arguments["imdb_id"] = json!(catalog_id);
        }

        let result = self.call_tool(&self.search_tool, arguments).await?;
        let items = map_search_result(&result, query.language());
        debug!("Search for '{}' ({}) mapped {} items", query.title(), query.language(), items.len());
        Ok(items)
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, ToolError> {
        let mut arguments = Map::new();
        arguments.insert("subtitle_id".to_string(), json!(request.item_id));
        for (key, value) in &request.provider_payload {
            arguments.insert(key.clone(), value.clone());
        }

        let result = self.call_tool(&self.download_tool, Value::Object(arguments)).await?;
        map_download_result(&result, request, self.source_tag())
    }
}

/// Map search tool output onto subtitle items, skipping entries without an id
pub fn map_search_result(result: &Value, query_language: &str) -> Vec<SubtitleItem> {
    let entries = match result {
        Value::Array(entries) => Some(entries),
        Value::Object(map) => RESULT_LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    };
    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let item = map_entry(entry, query_language);
            if item.is_none() {
                debug!("Skipping search entry without id");
            }
            item
        })
        .collect()
}

fn map_entry(entry: &Value, query_language: &str) -> Option<SubtitleItem> {
    let id = id_string(entry.get("subtitle_id")).or_else(|| id_string(entry.get("id")))?;

    let language = non_empty_str(entry.get("language")).unwrap_or(query_language);
    let first_file = entry
        .get("files")
        .and_then(Value::as_array)
        .and_then(|files| files.first());

    let mut item = SubtitleItem::new(id, language);
    item.file_name = first_file
        .and_then(|f| non_empty_str(f.get("file_name")))
        .or_else(|| non_empty_str(entry.get("file_name")))
        .map(str::to_string);
    item.release = non_empty_str(entry.pointer("/upload_info/release"))
        .or_else(|| non_empty_str(entry.get("release")))
        .map(str::to_string);
    item.download_count = count(entry.pointer("/quality_info/download_count"))
        .or_else(|| count(entry.get("download_count")));
    item.score = entry.get("score").and_then(Value::as_f64);
    item.format = non_empty_str(entry.get("format")).map(str::to_string);
    item.encoding = non_empty_str(entry.get("encoding")).map(str::to_string);

    let file_id = first_file
        .and_then(|f| f.get("file_id"))
        .filter(|v| !v.is_null());
    item.provider_payload = match file_id {
        Some(file_id) => {
            let mut payload = Map::new();
            payload.insert("file_id".to_string(), file_id.clone());
            payload
        }
        None => entry
            .get("provider_payload")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    };

    Some(item)
}

/// Map download tool output onto a download result
pub fn map_download_result(
    result: &Value,
    request: &DownloadRequest,
    source: &str,
) -> Result<DownloadResult, ToolError> {
    let encoded = non_empty_str(result.get("content_base64"))
        .or_else(|| non_empty_str(result.get("content_b64")));

    let content = match encoded {
        Some(encoded) => {
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(compact.as_bytes()).map_err(|e| {
                ToolError::Decode(format!("invalid base64 content for {}: {}", request.item_id, e))
            })?
        }
        None => match result.get("content").and_then(Value::as_str) {
            Some(text) => text.as_bytes().to_vec(),
            None => {
                warn!("Download of {} returned no content", request.item_id);
                Vec::new()
            }
        },
    };

    let file_name = non_empty_str(result.get("file_name"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.srt", request.item_id));
    let language = non_empty_str(result.get("language"))
        .unwrap_or(&request.language)
        .to_string();

    Ok(DownloadResult {
        content,
        file_name,
        language,
        source: source.to_string(),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}
