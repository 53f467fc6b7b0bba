//! MCP client: one server process, many concurrent requests over a single pipe pair.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};
use crate::util::timeout::with_timeout;

use super::framing::LineFramer;
use super::pending::{PendingCalls, PendingGuard};
use super::protocol::{
    initialize_params, parse_incoming, Incoming, InitializeResult, JsonRpcNotification,
    JsonRpcRequest,
};
use super::schema::{ListToolsResult, ToolCallResult, ToolDescriptor};
use super::transport::StdioTransport;

const READ_CHUNK: usize = 8 * 1024;
const MAX_LIST_PAGES: usize = 64;
const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Shared {
    writer: tokio::sync::Mutex<BoxedWriter>,
    pending: PendingCalls,
    next_id: AtomicU64,
    state: Mutex<MCPConnectionState>,
    server_info: Mutex<Option<InitializeResult>>,
    request_timeout: Duration,
}

impl Shared {
    fn state(&self) -> MCPConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `from -> to`; fails if another path already changed the state.
    fn transition(&self, from: MCPConnectionState, to: MCPConnectionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Enter `Closed` and fail everything still waiting.
    fn mark_closed(&self, reason: &str) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, MCPConnectionState::Closed)
        };
        let failed = self.pending.close(reason);
        if previous != MCPConnectionState::Closed {
            info!(reason, failed_requests = failed, "MCP connection closed");
        }
    }

    fn dispatch(&self, line: &str) {
        match parse_incoming(line) {
            Ok(Incoming::Response { id, outcome }) => {
                if !self.pending.complete(id, outcome) {
                    warn!(id, "dropping response with no pending request");
                }
            }
            Ok(Incoming::ServerMessage { method, id }) => {
                debug!(method = %method, id = ?id, "ignoring server-initiated message");
            }
            Err(e) => {
                warn!(error = %e, line = %truncate(line, 200), "ignoring unparseable server output");
            }
        }
    }

    async fn write_line<T: serde::Serialize>(&self, frame: &T) -> Result<()> {
        let mut line = serde_json::to_string(frame)?;
        debug!(frame = %line, "MCP send");
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::Transport(format!("failed to write to server stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("failed to flush server stdin: {e}")))
    }
}

/// Client for a Model Context Protocol server over stdio.
///
/// Requests are correlated by id, so any number of calls may be in flight and
/// responses may arrive in any order.
pub struct MCPClient {
    shared: Arc<Shared>,
    child: tokio::sync::Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl MCPClient {
    /// Spawn the configured server and complete the `initialize` handshake.
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let StdioTransport {
            child,
            stdin,
            stdout,
        } = StdioTransport::spawn(config)?;

        let client = Self::from_io(stdout, stdin, config.request_timeout());
        *client.child.lock().await = Some(child);

        if let Err(e) = client.initialize().await {
            client.disconnect().await;
            return Err(e);
        }
        Ok(client)
    }

    /// Build a client over an arbitrary byte-stream pair.
    ///
    /// The read loop starts immediately; call [`MCPClient::initialize`] before
    /// issuing requests.
    pub fn from_io<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: PendingCalls::new(),
            next_id: AtomicU64::new(1),
            state: Mutex::new(MCPConnectionState::Disconnected),
            server_info: Mutex::new(None),
            request_timeout,
        });
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&shared)));

        Self {
            shared,
            child: tokio::sync::Mutex::new(None),
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == MCPConnectionState::Connected
    }

    /// What the server reported about itself during the handshake.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.shared
            .server_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Perform the `initialize` handshake. Idempotent once connected.
    ///
    /// Any failure before the handshake response (exit, pipe error, rejection,
    /// timeout) is reported as [`BridgeError::Transport`] and closes the client.
    pub async fn initialize(&self) -> Result<()> {
        match self.shared.state() {
            MCPConnectionState::Connected => return Ok(()),
            MCPConnectionState::Closed => {
                return Err(BridgeError::Transport("MCP client is closed".into()))
            }
            MCPConnectionState::Connecting => {
                return Err(BridgeError::InvalidState("handshake already in progress".into()))
            }
            MCPConnectionState::Disconnected => {}
        }
        if !self
            .shared
            .transition(MCPConnectionState::Disconnected, MCPConnectionState::Connecting)
        {
            return Err(BridgeError::Transport(
                "MCP client changed state before the handshake started".into(),
            ));
        }

        let params = initialize_params(CLIENT_NAME, CLIENT_VERSION);
        let result = match self.send_request_in("initialize", Some(params), true).await {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("handshake failed: {e}");
                self.shared.mark_closed(&reason);
                return Err(BridgeError::Transport(reason));
            }
        };

        let info: InitializeResult = match serde_json::from_value(result) {
            Ok(info) => info,
            Err(e) => {
                let reason = format!("handshake failed: malformed initialize result: {e}");
                warn!(error = %e, "server sent a malformed initialize result");
                self.shared.mark_closed(&reason);
                return Err(BridgeError::Transport(reason));
            }
        };
        info!(
            server = info.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            protocol_version = %info.protocol_version,
            "MCP handshake complete"
        );
        *self
            .shared
            .server_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(info);
        if !self
            .shared
            .transition(MCPConnectionState::Connecting, MCPConnectionState::Connected)
        {
            return Err(BridgeError::Transport(
                "connection closed during the handshake".into(),
            ));
        }

        self.notify("notifications/initialized", None).await
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(cursor) => serde_json::json!({ "cursor": cursor }),
                None => serde_json::json!({}),
            };
            let result = self.send_request("tools/list", Some(params)).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                BridgeError::Protocol(format!("malformed tools/list result: {e}"))
            })?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => return Ok(tools),
            }
        }

        warn!(pages = MAX_LIST_PAGES, "tools/list pagination did not terminate; truncating");
        Ok(tools)
    }

    /// Execute a tool on the server.
    ///
    /// The server decides whether the tool exists; an unknown name comes back
    /// as [`BridgeError::Remote`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let arguments = coerce_tool_arguments(arguments)?;
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self.send_request("tools/call", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| BridgeError::Protocol(format!("malformed tools/call result for '{name}': {e}")))
    }

    /// Send a request and wait for its correlated response.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.send_request_in(method, params, false).await
    }

    async fn send_request_in(
        &self,
        method: &str,
        params: Option<Value>,
        handshake: bool,
    ) -> Result<Value> {
        match (self.shared.state(), handshake) {
            (MCPConnectionState::Connected, _) | (MCPConnectionState::Connecting, true) => {}
            (MCPConnectionState::Closed, _) => {
                return Err(BridgeError::Transport("MCP client is closed".into()))
            }
            (state, _) => {
                return Err(BridgeError::InvalidState(format!(
                    "MCP client must be connected first (state: {state:?})"
                )))
            }
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx)?;
        let _guard = PendingGuard::new(&self.shared.pending, id);

        self.shared
            .write_line(&JsonRpcRequest::new(id, method, params))
            .await?;

        let outcome = with_timeout(self.shared.request_timeout, async {
            rx.await.map_err(|_| {
                BridgeError::Transport("connection closed before a response arrived".into())
            })?
        })
        .await;

        if let Err(BridgeError::Timeout(ms)) = &outcome {
            warn!(id, method, timeout_ms = ms, "MCP request timed out");
        }
        outcome
    }

    /// Send a notification; no response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.shared.state() == MCPConnectionState::Closed {
            return Err(BridgeError::Transport("MCP client is closed".into()));
        }
        self.shared
            .write_line(&JsonRpcNotification::new(method, params))
            .await
    }

    /// Whether the server process is still running (always `true` for non-process clients
    /// that are not closed).
    pub async fn is_alive(&self) -> bool {
        if self.shared.state() == MCPConnectionState::Closed {
            return false;
        }
        match self.child.lock().await.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Terminate the server and fail outstanding requests. `Closed` is terminal.
    pub async fn disconnect(&self) {
        self.shared.mark_closed("client disconnected");

        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }

        let _ = self.shared.writer.lock().await.shutdown().await;

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "MCP server already exited");
            }
        }
    }
}

impl Drop for MCPClient {
    fn drop(&mut self) {
        self.shared.pending.close("client dropped");
        if let Some(reader) = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    let reason = loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                if let Some(line) = framer.finish() {
                    shared.dispatch(&line);
                }
                break "server closed its output stream".to_string();
            }
            Ok(n) => {
                for line in framer.push(&chunk[..n]) {
                    debug!(frame = %truncate(&line, 500), "MCP recv");
                    shared.dispatch(&line);
                }
            }
            Err(e) => break format!("failed to read from server: {e}"),
        }
    };

    shared.mark_closed(&reason);
}

fn coerce_tool_arguments(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(map) => Ok(Value::Object(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                BridgeError::InvalidArgument(format!("tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(BridgeError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
