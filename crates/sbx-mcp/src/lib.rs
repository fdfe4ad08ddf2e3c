//! Line-delimited JSON-RPC 2.0 stdio bridge to a container process.
//! A single exclusion lock serializes request/response pairs, so ids
//! assigned under the lock are monotonic and the response read under
//! the same lock call is unambiguously the one that matches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sbx_core::{Result, WorkspaceError};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

struct BridgeIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Stdio JSON-RPC bridge. One instance per hosted MCP container.
pub struct StdioBridge {
    io: Mutex<Option<BridgeIo>>,
    next_id: AtomicU64,
    close_token: CancellationToken,
}

impl StdioBridge {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            io: Mutex::new(Some(BridgeIo { stdin, stdout: BufReader::new(stdout) })),
            next_id: AtomicU64::new(0),
            close_token: CancellationToken::new(),
        }
    }

    /// Sends a JSON-RPC request and waits for the matching response line,
    /// or `BridgeTimeout`/`BridgeClosed`. Returns the raw `result` or
    /// `error` value without interpreting it further. A concurrent `close()`
    /// interrupts an in-flight read immediately rather than waiting for it
    /// to hit its own timeout.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        if self.close_token.is_cancelled() {
            return Err(WorkspaceError::BridgeClosed);
        }

        let mut guard = self.io.lock().await;
        let Some(io) = guard.as_mut() else {
            return Err(WorkspaceError::BridgeClosed);
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = serde_json::json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut line = serde_json::to_string(&request).map_err(|err| WorkspaceError::StoreError(err.to_string()))?;
        line.push('\n');

        io.stdin.write_all(line.as_bytes()).await.map_err(|_| WorkspaceError::BridgeClosed)?;
        io.stdin.flush().await.map_err(|_| WorkspaceError::BridgeClosed)?;

        let mut response_line = String::new();
        tokio::select! {
            read = tokio::time::timeout(timeout, io.stdout.read_line(&mut response_line)) => {
                match read {
                    Err(_) => Err(WorkspaceError::BridgeTimeout),
                    Ok(Err(_)) => Err(WorkspaceError::BridgeClosed),
                    Ok(Ok(0)) => Err(WorkspaceError::BridgeClosed),
                    Ok(Ok(_)) => {
                        let response: Value =
                            serde_json::from_str(response_line.trim()).map_err(|err| WorkspaceError::StoreError(err.to_string()))?;
                        debug!(%method, id, "bridge call completed");
                        if let Some(error) = response.get("error") {
                            Ok(error.clone())
                        } else {
                            Ok(response.get("result").cloned().unwrap_or(Value::Null))
                        }
                    }
                }
            }
            _ = self.close_token.cancelled() => Err(WorkspaceError::BridgeClosed),
        }
    }

    pub async fn call_default(&self, method: &str, params: Value) -> Result<Value> {
        self.call(method, params, DEFAULT_CALL_TIMEOUT).await
    }

    /// Marks the bridge closed and releases any pending reader immediately,
    /// then takes the io pair once the in-flight call (if any) releases the
    /// lock. Subsequent calls fail fast.
    pub async fn close(&self) {
        self.close_token.cancel();
        self.io.lock().await.take();
    }

    pub fn is_closed(&self) -> bool {
        self.close_token.is_cancelled()
    }
}
