/*!
 * Error types for the subscout application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Soft failures such as a tool call past its deadline or an unparseable
 * translation batch have no variant here; the layer that observes them
 * turns them into empty data.
 */

use serde_json::Value;
use thiserror::Error;

/// Errors raised by tool server clients (process and HTTP variants)
#[derive(Error, Debug)]
pub enum ToolError {
    /// A required launch parameter or endpoint is missing
    #[error("Tool server is not configured: {0}")]
    Configuration(String),

    /// Spawning the tool server or writing to it failed
    #[error("Tool server transport failed: {0}")]
    Transport(String),

    /// The tool server answered with an explicit error envelope
    #[error("Tool server returned an error: {message}")]
    Protocol {
        /// Human readable message from the server
        message: String,
        /// The raw error payload
        payload: Value,
    },

    /// The HTTP tool endpoint failed
    #[error("Tool server HTTP request failed: {0}")]
    Http(String),

    /// A tool payload could not be decoded
    #[error("Failed to decode tool payload: {0}")]
    Decode(String),
}

impl ToolError {
    /// Build a protocol error from a JSON-RPC `error` payload, keeping the
    /// server's `message` verbatim when there is one.
    pub fn from_error_payload(payload: Value) -> Self {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string());
        Self::Protocol { message, payload }
    }
}

/// Errors that can occur when working with LLM provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Every batch of the document failed at the provider level
    #[error("All {batches} translation batches failed; last error: {last_error}")]
    AllBatchesFailed {
        /// Number of batches attempted
        batches: usize,
        /// Message of the last provider failure
        last_error: String,
    },

    /// The prompt template could not be loaded
    #[error("Prompt template error: {0}")]
    Prompt(String),
}

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The search query failed validation
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    /// Neither the preferred nor the fallback language produced results
    #[error("No subtitles found for '{title}'")]
    NoSubtitlesFound {
        /// Requested title
        title: String,
    },

    /// Translation is required but no translator is configured
    #[error("Translation from '{source_language}' to '{target_language}' is required but no translator is configured")]
    MissingTranslator {
        /// Language of the downloaded subtitle
        source_language: String,
        /// Language requested by the caller
        target_language: String,
    },

    /// Error from the tool server
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Error from the translator
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Writing the output file failed
    #[error("Failed to persist subtitle: {0}")]
    Persistence(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a tool server
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a pipeline run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
