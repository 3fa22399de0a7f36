//! MCP Transports
//!
//! A transport moves JSON-RPC messages to the tool server and back. Two are
//! supported, mirroring how MCP servers are deployed: spawning the server as
//! a child process and speaking over its stdio, and the streamable HTTP
//! flavor (one POST per message, responses as plain JSON or as an SSE body).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use crate::error::McpError;
use crate::jsonrpc;

const SESSION_HEADER: &str = "mcp-session-id";

/// How to reach the tool server
#[derive(Clone, Debug)]
pub enum TransportConfig {
    /// Spawn a local server process and speak JSON-RPC over its stdio
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Streamable HTTP endpoint
    Http {
        url: String,
        headers: Vec<(String, String)>,
    },
}

/// Message-level transport to one tool server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its matching response payload
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError>;

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Tear the transport down. Idempotent.
    async fn close(&self) -> Result<(), McpError>;
}

// ---------------------------------------------------------------------------
// Stdio
// ---------------------------------------------------------------------------

/// Child-process transport. The io mutex is held across write and read, so
/// all calls through this transport are strictly serialized on the pipe.
#[derive(Debug)]
pub struct StdioTransport {
    io: Mutex<StdioIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

#[derive(Debug)]
struct StdioIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioIo {
    async fn write_line(&mut self, payload: &str) -> Result<(), McpError> {
        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("write: {e}")))?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::Transport(format!("write newline: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("flush: {e}")))?;
        Ok(())
    }
}

impl StdioTransport {
    /// Spawn the server process. The given environment is merged over the
    /// inherited one; stderr passes through for server-side diagnostics.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        tracing::info!(%command, args = ?args, "spawning tool server");
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Transport(format!("failed to spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("no stdout".into()))?;

        Ok(Self {
            io: Mutex::new(StdioIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.ensure_open()?;
        let id = jsonrpc::Id::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let req = jsonrpc::Request::new(id.clone(), method, params);
        let line = serde_json::to_string(&req)
            .map_err(|e| McpError::Transport(format!("serialize: {e}")))?;

        let mut io = self.io.lock().await;
        io.write_line(&line).await?;

        // Read until the matching response shows up; the server may emit
        // notifications or log lines in between.
        loop {
            let mut buf = String::new();
            let n = io
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| McpError::Transport(format!("read: {e}")))?;
            if n == 0 {
                return Err(McpError::Transport("unexpected EOF from tool server".into()));
            }

            let Ok(resp) = serde_json::from_str::<jsonrpc::Response>(&buf) else {
                continue;
            };
            if !resp.is_for(&id) {
                continue;
            }
            if let Some(err) = resp.error {
                return Err(McpError::JsonRpc {
                    code: err.code,
                    message: err.message,
                    data: err.data,
                });
            }
            return Ok(resp.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.ensure_open()?;
        let notif = jsonrpc::Notification::new(method, params);
        let line = serde_json::to_string(&notif)
            .map_err(|e| McpError::Transport(format!("serialize: {e}")))?;
        let mut io = self.io.lock().await;
        io.write_line(&line).await
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Closing stdin tells the server to exit; give it a moment before
        // killing it.
        let mut io = self.io.lock().await;
        let _ = io.stdin.shutdown().await;
        drop(io);

        let mut child = self.child.lock().await;
        if tokio::time::timeout(Duration::from_secs(2), child.wait())
            .await
            .is_ok()
        {
            return Ok(());
        }
        tracing::warn!("tool server did not exit on stdin close, killing it");
        let _ = child.kill().await;
        let _ = child.wait().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Streamable HTTP
// ---------------------------------------------------------------------------

/// HTTP transport. Each message is one POST; the server answers with plain
/// JSON or a short SSE body. A session id handed out by the server is echoed
/// on every subsequent request.
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
    session: std::sync::Mutex<Option<String>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, headers: &[(String, String)]) -> Result<Self, McpError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::Transport(format!("invalid header name '{name}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| McpError::Transport(format!("invalid value for header '{name}': {e}")))?;
            map.insert(header_name, header_value);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            url: url.into(),
            headers: map,
            session: std::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    async fn post<T: Serialize + Sync>(&self, payload: &T) -> Result<reqwest::Response, McpError> {
        let mut req = self
            .http
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(payload);
        let session = self.session.lock().unwrap().clone();
        if let Some(session) = session {
            req = req.header(SESSION_HEADER, session);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| McpError::Transport(format!("POST {}: {e}", self.url)))?;

        if let Some(session) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session.lock().unwrap() = Some(session.to_string());
        }
        Ok(resp)
    }

    fn ensure_open(&self) -> Result<(), McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.ensure_open()?;
        let id = jsonrpc::Id::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let req = jsonrpc::Request::new(id.clone(), method, params);

        let resp = self.post(&req).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "server returned {status}: {body}"
            )));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let response = if content_type.starts_with("text/event-stream") {
            read_sse_response(resp, &id).await?
        } else {
            let body = resp
                .text()
                .await
                .map_err(|e| McpError::Transport(format!("read body: {e}")))?;
            let response: jsonrpc::Response = serde_json::from_str(&body)
                .map_err(|e| McpError::Protocol(format!("invalid response body: {e}")))?;
            if !response.is_for(&id) {
                return Err(McpError::Protocol("response id mismatch".into()));
            }
            response
        };

        if let Some(err) = response.error {
            return Err(McpError::JsonRpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.ensure_open()?;
        let notif = jsonrpc::Notification::new(method, params);
        let resp = self.post(&notif).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "server returned {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Best-effort session teardown; servers without session state
        // typically answer 405 and that is fine.
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            let _ = self
                .http
                .delete(&self.url)
                .headers(self.headers.clone())
                .header(SESSION_HEADER, session)
                .send()
                .await;
        }
        Ok(())
    }
}

/// Scan an SSE body for the response matching `id`, then drop the stream.
async fn read_sse_response(
    resp: reqwest::Response,
    id: &jsonrpc::Id,
) -> Result<jsonrpc::Response, McpError> {
    let mut bytes = resp.bytes_stream();
    let mut buf = String::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| McpError::Transport(format!("SSE read: {e}")))?;
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim_end_matches('\r').to_string();
            buf.drain(..=pos);

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            let Ok(response) = serde_json::from_str::<jsonrpc::Response>(data) else {
                continue;
            };
            if response.is_for(id) {
                return Ok(response);
            }
        }
    }
    Err(McpError::Protocol(
        "SSE stream ended without a matching response".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_failure_is_a_transport_error() {
        let err = StdioTransport::spawn("definitely-not-a-real-binary", &[], &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[test]
    fn invalid_header_is_rejected_at_construction() {
        let headers = vec![("bad header".to_string(), "x".to_string())];
        let err = HttpTransport::new("http://localhost/mcp", &headers).unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[tokio::test]
    async fn http_requests_after_close_are_rejected() {
        let transport = HttpTransport::new("http://localhost:1/mcp", &[]).unwrap();
        transport.close().await.unwrap();
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::Closed));
    }
}
