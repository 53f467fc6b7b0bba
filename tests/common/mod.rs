//! Shared test helpers: an in-process fake MCP server over duplex pipes.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use tokio::sync::Mutex;

use mitm::mcp::MCPClient;

/// How the fake server answers one request.
pub enum Reply {
    Result(Value),
    Error { code: i64, message: String },
    /// Answer after a delay, without blocking other requests.
    After(Duration, Box<Reply>),
    /// Never answer.
    Silent,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Result(json!({ "content": [{ "type": "text", "text": text.into() }] }))
    }

    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn after(delay: Duration, reply: Reply) -> Self {
        Self::After(delay, Box::new(reply))
    }
}

pub type Handler = dyn Fn(&str, &Value) -> Reply + Send + Sync;

type SharedWriter = Arc<Mutex<WriteHalf<DuplexStream>>>;

async fn send(writer: &SharedWriter, frame: Value) {
    let mut line = frame.to_string();
    line.push('\n');
    // The client may already be gone; that is fine for a fake.
    let _ = writer.lock().await.write_all(line.as_bytes()).await;
}

fn respond(writer: SharedWriter, id: Value, reply: Reply) {
    tokio::spawn(async move {
        let mut reply = reply;
        let reply = loop {
            match reply {
                Reply::After(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                other => break other,
            }
        };
        match reply {
            Reply::Result(result) => {
                send(&writer, json!({ "jsonrpc": "2.0", "id": id, "result": result })).await
            }
            Reply::Error { code, message } => {
                send(
                    &writer,
                    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }),
                )
                .await
            }
            Reply::Silent | Reply::After(..) => {}
        }
    });
}

/// Start a fake server that completes the handshake and routes every other
/// request through `handler`. Returns a connected client.
pub async fn connect_scripted<F>(timeout: Duration, handler: F) -> MCPClient
where
    F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
{
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, server_write) = tokio::io::split(server_side);
    let writer: SharedWriter = Arc::new(Mutex::new(server_write));
    let handler: Arc<Handler> = Arc::new(handler);

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(frame) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let Some(id) = frame.get("id").cloned() else {
                continue; // notification
            };
            let method = frame["method"].as_str().unwrap_or_default().to_string();
            let params = frame.get("params").cloned().unwrap_or(Value::Null);
            let reply = if method == "initialize" {
                Reply::Result(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake-mcp", "version": "0.0.1" }
                }))
            } else {
                handler(&method, &params)
            };
            respond(writer.clone(), id, reply);
        }
    });

    let client = MCPClient::from_io(client_read, client_write, timeout);
    client.initialize().await.expect("fake handshake");
    client
}

/// A server exposing a single `echo` tool; any other tool is unknown (-32601).
pub fn echo_handler(method: &str, params: &Value) -> Reply {
    match method {
        "tools/list" => Reply::Result(json!({
            "tools": [{
                "name": "echo",
                "description": "Echo a message back",
                "inputSchema": {
                    "type": "object",
                    "properties": { "message": { "type": "string", "description": "Text to echo" } },
                    "required": ["message"]
                }
            }]
        })),
        "tools/call" => match params["name"].as_str() {
            Some("echo") => Reply::text(format!(
                "Echo: {}",
                params["arguments"]["message"].as_str().unwrap_or_default()
            )),
            _ => Reply::error(-32601, "Unknown tool"),
        },
        _ => Reply::error(-32601, format!("Method not found: {method}")),
    }
}

/// The server's ends of a client built over raw pipes, for byte-level tests.
pub struct RawServer {
    pub reader: BufReader<DuplexStream>,
    pub writer: DuplexStream,
}

impl RawServer {
    pub fn pipe(timeout: Duration) -> (MCPClient, Self) {
        let (client_out, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_in) = tokio::io::duplex(64 * 1024);
        let client = MCPClient::from_io(client_in, client_out, timeout);
        (
            client,
            Self {
                reader: BufReader::new(server_in),
                writer: server_out,
            },
        )
    }

    pub async fn read_frame(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn reply(&mut self, frame: Value) {
        let mut line = frame.to_string();
        line.push('\n');
        self.write_raw(line.as_bytes()).await;
    }

    /// Answer `initialize` and swallow `notifications/initialized`.
    pub async fn handshake(&mut self) {
        let init = self.read_frame().await;
        assert_eq!(init["method"], "initialize");
        self.reply(json!({
            "jsonrpc": "2.0",
            "id": init["id"],
            "result": { "protocolVersion": "2024-11-05" }
        }))
        .await;
        let initialized = self.read_frame().await;
        assert_eq!(initialized["method"], "notifications/initialized");
    }
}

/// Complete the handshake on a raw pipe.
pub async fn connect_raw(timeout: Duration) -> (MCPClient, RawServer) {
    let (client, mut server) = RawServer::pipe(timeout);
    let (init, ()) = tokio::join!(client.initialize(), server.handshake());
    init.unwrap();
    (client, server)
}
