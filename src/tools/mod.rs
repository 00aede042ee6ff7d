/*!
 * Clients for external subtitle tool servers.
 *
 * Tool servers are reached either through a short-lived child process
 * speaking JSON-RPC over stdio (`rpc`) or through a plain HTTP endpoint
 * (`http`). Both are exposed as a `ToolTransport`, and the subtitle search
 * and download capability built on top of them is the `SubtitleSource`
 * interface consumed by the pipeline.
 */

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ToolError;

pub mod catalog;
pub mod extract;
pub mod http;
pub mod opensubtitles;
pub mod process;
pub mod rpc;
pub mod types;

pub use catalog::{CatalogEntry, CatalogLookup, CatalogResolver};
pub use extract::ResultExtractor;
pub use http::HttpToolClient;
pub use opensubtitles::OpenSubtitlesTool;
pub use process::{LaunchSpec, StdinDelivery};
pub use rpc::ProcessRpcClient;
pub use types::{DownloadRequest, DownloadResult, SearchQuery, SubtitleItem};

/// Which kind of channel carries tool calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Stdio,
}

/// A channel able to invoke a named tool with JSON arguments
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Invoke `tool_name` and return its payload
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError>;

    fn kind(&self) -> TransportKind;
}

#[async_trait]
impl ToolTransport for HttpToolClient {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.call(tool_name, arguments).await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

#[async_trait]
impl ToolTransport for ProcessRpcClient {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.call(tool_name, arguments, self.default_timeout()).await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }
}

/// Search and download of subtitles, independent of the transport used
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    /// Find subtitles matching the query; an empty list means nothing found
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SubtitleItem>, ToolError>;

    /// Fetch the raw content of one subtitle
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, ToolError>;
}
