use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::errors::ToolError;

// @module: Tool server client over plain HTTP

/// Tool client posting `{name, arguments}` to a single endpoint
#[derive(Debug, Clone)]
pub struct HttpToolClient {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl HttpToolClient {
    /// Create a client for `<base_url><call_path>`
    pub fn new(
        base_url: &str,
        call_path: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(ToolError::Configuration("tool server base URL is not set".to_string()));
        }
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            call_path.trim().trim_start_matches('/')
        );
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            ToolError::Configuration(format!("invalid tool server URL '{}': {}", endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke a tool and return the body's `result` field, or the whole body
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError> {
        let payload = json!({ "name": tool_name, "arguments": arguments });

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        debug!("POST {} tool={}", self.endpoint, tool_name);
        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Http(format!("request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Http(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ToolError::Http(format!("{} returned {}: {}", self.endpoint, status, body)));
        }

        let mut data: Value = serde_json::from_str(&body)
            .map_err(|e| ToolError::Decode(format!("response is not JSON: {}", e)))?;

        Ok(match data.get_mut("result") {
            Some(result) => result.take(),
            None => data,
        })
    }
}
