/*!
 * Language model clients used for subtitle translation.
 *
 * - `openai`: OpenAI chat completions API
 * - `mock`: scripted offline client for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all LLM clients
///
/// The translator only needs prompt in, text out; request shaping and
/// authentication stay inside each implementation.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Model identifier, reported with run parameters
    fn model_name(&self) -> &str;
}

pub mod mock;
pub mod openai;
