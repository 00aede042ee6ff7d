//! Launching and terminating tool server child processes.
//!
//! Tool servers started through `npx` and similar launchers fork helpers of
//! their own, so every child is started in a fresh process group and
//! terminated as a group.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use crate::errors::ToolError;

/// How long `terminate` waits for the child to be reaped after the kill
pub const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// How the request lines are delivered to the child's stdin
#[derive(Debug, Clone, PartialEq)]
pub enum StdinDelivery {
    /// Write every line at once, then close stdin (local stdio servers)
    Batch,
    /// Keep stdin open and pause before each line so a remote proxy can
    /// finish connecting before the next message arrives
    Staggered {
        /// One delay per line, applied before writing it
        delays: Vec<Duration>,
    },
}

impl StdinDelivery {
    /// Delays used for `mcp-remote` style proxies
    pub fn remote_proxy() -> Self {
        Self::Staggered {
            delays: vec![
                Duration::from_millis(2000),
                Duration::from_millis(1000),
                Duration::from_millis(500),
            ],
        }
    }

    /// Delay before writing line `index`
    pub fn delay_before(&self, index: usize) -> Duration {
        match self {
            Self::Batch => Duration::ZERO,
            Self::Staggered { delays } => delays.get(index).copied().unwrap_or_default(),
        }
    }

    /// Whether stdin is closed once every line has been written
    pub fn closes_stdin(&self) -> bool {
        matches!(self, Self::Batch)
    }
}

/// Everything needed to start a tool server process
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Extra variables merged over the parent environment
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Spawn the process with piped stdio in its own process group
    pub fn spawn(&self) -> Result<Child, ToolError> {
        if self.command.trim().is_empty() {
            return Err(ToolError::Configuration("no launch command configured".to_string()));
        }

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| {
            ToolError::Transport(format!(
                "failed to spawn '{}' with args {:?}: {}",
                self.command, self.args, e
            ))
        })?;

        debug!("Spawned tool server '{}' (pid {:?})", self.command, child.id());
        Ok(child)
    }
}

/// Forcefully terminate a child and its process group, then reap it.
///
/// Best effort: every failure is logged and swallowed.
pub async fn terminate(child: &mut Child) {
    let pid = child.id();

    #[cfg(windows)]
    kill_tree_windows(pid).await;

    start_kill(child);

    match timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!("Tool server {:?} exited with {}", pid, status),
        Ok(Err(e)) => warn!("Waiting for tool server {:?} failed: {}", pid, e),
        Err(_) => warn!("Tool server {:?} did not exit within {:?}", pid, REAP_TIMEOUT),
    }
}

/// Send the kill without waiting for the child to exit
pub(crate) fn start_kill(child: &mut Child) {
    let pid = child.id();

    #[cfg(unix)]
    kill_group_unix(pid);

    if let Err(e) = child.start_kill() {
        // InvalidInput means the child was already reaped
        if e.kind() != std::io::ErrorKind::InvalidInput {
            debug!("Kill of tool server {:?} failed: {}", pid, e);
        }
    }
}

#[cfg(unix)]
fn kill_group_unix(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let Ok(raw) = i32::try_from(pid) else { return };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            debug!("killpg({}) failed: {}", raw, e);
        }
    }
}

#[cfg(windows)]
async fn kill_tree_windows(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let result = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        debug!("taskkill for {} failed: {}", pid, e);
    }
}
