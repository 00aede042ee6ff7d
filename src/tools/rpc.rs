/*!
 * JSON-RPC client for tool servers spoken to over a child process's stdio.
 *
 * Every call is one short-lived session: spawn the server, send the
 * `initialize` handshake, the `initialized` notification and a single
 * `tools/call` request, then read stdout until the response to the call
 * arrives or the deadline elapses. The child is terminated exactly once
 * whichever way the session ends.
 *
 * A call that reaches its deadline is not an error. It returns an empty
 * object so that callers can move on to a fallback.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::errors::ToolError;
use crate::tools::extract::{truncate, ResultExtractor};
use crate::tools::process::{self, LaunchSpec, StdinDelivery};

/// Protocol revision announced in the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Request id of the `initialize` handshake
pub const INITIALIZE_ID: u64 = 1;

/// Request id of the single `tools/call` request
pub const TOOL_CALL_ID: u64 = 2;

/// Deadline used when the caller does not pass one
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest prefix of a raw line written to the debug log
const LOG_LINE_CHARS: usize = 200;

/// A JSON-RPC request or notification (no id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn request(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.to_string(),
            params: Some(params),
        }
    }

    pub fn notification(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params: None,
        }
    }
}

/// Build the three lines sent to the server for one tool call
pub fn session_messages(
    client_name: &str,
    tool_name: &str,
    arguments: Value,
) -> Result<Vec<String>, ToolError> {
    let initialize = JsonRpcRequest::request(
        INITIALIZE_ID,
        "initialize",
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_name,
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    );
    let initialized = JsonRpcRequest::notification("notifications/initialized");
    let call = JsonRpcRequest::request(
        TOOL_CALL_ID,
        "tools/call",
        json!({ "name": tool_name, "arguments": arguments }),
    );

    [initialize, initialized, call]
        .iter()
        .map(|message| {
            serde_json::to_string(message)
                .map_err(|e| ToolError::Transport(format!("failed to encode request: {}", e)))
        })
        .collect()
}

/// Parse a raw output line and keep it only if it answers `request_id`.
///
/// A numeric id matches when it equals `request_id` exactly, so `2.0`
/// answers request 2 while `"2"` does not.
fn match_response(line: &str, request_id: u64) -> Option<Value> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let id = value.get("id")?;
    let matches = match id.as_u64() {
        Some(id) => id == request_id,
        None => id.as_f64() == Some(request_id as f64),
    };
    matches.then_some(value)
}

/// Turn the matched response message into the call's outcome
fn interpret_response(message: Value) -> Result<Value, ToolError> {
    if let Some(result) = message.get("result") {
        return Ok(ResultExtractor::extract(result));
    }
    if let Some(error) = message.get("error") {
        return Err(ToolError::from_error_payload(error.clone()));
    }
    debug!("Response carried neither result nor error");
    Ok(ResultExtractor::empty())
}

/// One in-flight tool call bound to its child process.
///
/// Owns the child for the whole call. `close` terminates it; if the session
/// is dropped without being closed (a cancelled future, a panic) the kill is
/// still sent from `Drop`.
pub struct ToolCallSession {
    request_id: u64,
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<()>>,
    completion: Option<oneshot::Receiver<Value>>,
    transcript: Arc<Mutex<Vec<String>>>,
    terminated: bool,
}

impl ToolCallSession {
    /// Take over a freshly spawned child and start reading its stdout
    pub fn open(mut child: Child, request_id: u64) -> Result<Self, ToolError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Transport("tool server stdout is not piped".to_string()))?;
        let stdin = child.stdin.take();

        let (tx, rx) = oneshot::channel();
        let transcript = Arc::new(Mutex::new(Vec::new()));
        let lines_seen = Arc::clone(&transcript);

        let reader = tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match stdout.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        debug!("Tool server closed stdout before answering request {}", request_id);
                        return;
                    }
                    Ok(_) => {
                        // Undecodable bytes are replaced; the line is still inspected
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        debug!("tool server <- {}", truncate(&line, LOG_LINE_CHARS));
                        let matched = match_response(&line, request_id);
                        lines_seen.lock().push(line);
                        if let Some(message) = matched {
                            let _ = tx.send(message);
                            return;
                        }
                    }
                    Err(e) => {
                        debug!("Reading tool server stdout failed: {}", e);
                        return;
                    }
                }
            }
        });

        let session = Self {
            request_id,
            child,
            stdin,
            reader: Some(reader),
            completion: Some(rx),
            transcript,
            terminated: false,
        };
        if session.stdin.is_none() {
            return Err(ToolError::Transport("tool server stdin is not piped".to_string()));
        }
        Ok(session)
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Raw lines read so far, in arrival order
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().clone()
    }

    /// Write `messages` while waiting for the response, bounded by `deadline`.
    ///
    /// Returns as soon as the response arrives, even if staggered writes are
    /// still pending. Returns `Ok(None)` when no matching response arrived in
    /// time or the server closed its stdout without answering.
    pub async fn exchange(
        &mut self,
        messages: &[String],
        delivery: &StdinDelivery,
        deadline: Duration,
    ) -> Result<Option<Value>, ToolError> {
        let completion = self
            .completion
            .take()
            .ok_or_else(|| ToolError::Transport("session already used".to_string()))?;
        let stdin = self
            .stdin
            .take()
            .ok_or_else(|| ToolError::Transport("tool server stdin is closed".to_string()))?;

        let mut completion = completion;
        let exchange = async {
            let write = write_messages(stdin, messages, delivery);
            tokio::pin!(write);
            tokio::select! {
                response = &mut completion => Ok((None, response.ok())),
                written = &mut write => match written {
                    Ok(kept_open) => Ok((kept_open, completion.await.ok())),
                    Err(e) => match completion.await {
                        Ok(response) => {
                            debug!("Write to tool server failed after it answered: {}", e);
                            Ok((None, Some(response)))
                        }
                        Err(_) => Err(e),
                    },
                },
            }
        };

        match timeout(deadline, exchange).await {
            Ok(Ok((kept_open, response))) => {
                self.stdin = kept_open;
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    "Tool server did not answer request {} within {:?} ({} lines read)",
                    self.request_id(),
                    deadline,
                    self.transcript().len()
                );
                Ok(None)
            }
        }
    }

    /// Stop reading, close stdin and terminate the child. Idempotent.
    pub async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.stdin = None;
        if !self.terminated {
            self.terminated = true;
            process::terminate(&mut self.child).await;
        }
    }

    fn start_kill_once(&mut self) {
        if !self.terminated {
            self.terminated = true;
            process::start_kill(&mut self.child);
        }
    }
}

impl Drop for ToolCallSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.start_kill_once();
    }
}

/// Write every message, returning stdin if the delivery keeps it open
async fn write_messages(
    mut stdin: ChildStdin,
    messages: &[String],
    delivery: &StdinDelivery,
) -> Result<Option<ChildStdin>, ToolError> {
    for (index, message) in messages.iter().enumerate() {
        let delay = delivery.delay_before(index);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        debug!("tool server -> {}", truncate(message, LOG_LINE_CHARS));
        stdin
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| ToolError::Transport(format!("failed to write request: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| ToolError::Transport(format!("failed to flush request: {}", e)))?;
    }
    if delivery.closes_stdin() {
        drop(stdin);
        return Ok(None);
    }
    Ok(Some(stdin))
}

/// Tool client that runs each call in a fresh child process
#[derive(Debug, Clone)]
pub struct ProcessRpcClient {
    launch: LaunchSpec,
    delivery: StdinDelivery,
    client_name: String,
    default_timeout: Duration,
}

impl ProcessRpcClient {
    pub fn new(launch: LaunchSpec) -> Self {
        Self {
            launch,
            delivery: StdinDelivery::Batch,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            default_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Deadline applied to calls made through `ToolTransport`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Use a different stdin delivery strategy
    pub fn with_delivery(mut self, delivery: StdinDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn launch(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn delivery(&self) -> &StdinDelivery {
        &self.delivery
    }

    /// Invoke `tool_name` and return its normalized payload.
    ///
    /// Returns an empty object when the deadline passes first.
    pub async fn call(
        &self,
        tool_name: &str,
        arguments: Value,
        deadline: Duration,
    ) -> Result<Value, ToolError> {
        let messages = session_messages(&self.client_name, tool_name, arguments)?;
        let child = self.launch.spawn()?;
        let mut session = ToolCallSession::open(child, TOOL_CALL_ID)?;

        let outcome = session.exchange(&messages, &self.delivery, deadline).await;
        session.close().await;

        match outcome? {
            Some(message) => interpret_response(message),
            None => {
                debug!(
                    "Tool '{}' produced no response to request {}; returning empty payload",
                    tool_name,
                    session.request_id()
                );
                Ok(ResultExtractor::empty())
            }
        }
    }
}
