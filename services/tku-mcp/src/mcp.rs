//! MCP server over stdio
//!
//! Newline-delimited JSON-RPC 2.0. `dispatch` decides what a single line
//! means without doing any I/O; `serve` owns the streams, spawns one task per
//! `tools/call` and funnels every reply through a single writer task so lines
//! never interleave on stdout.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tools::{self, Envelope, ToolContext};

pub const SERVER_NAME: &str = "TKU-MCP";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Write this response immediately
    Reply(Value),
    /// Run a tool, then answer request `id`
    Call {
        id: Value,
        name: String,
        arguments: Value,
    },
    /// Notification; nothing is written
    Silent,
}

fn result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}

/// Response to a finished `tools/call`.
pub fn call_response(id: Value, envelope: &Envelope) -> Value {
    result(
        id,
        json!({
            "content": [{ "type": "text", "text": envelope.to_value().to_string() }],
            "isError": envelope.is_error(),
        }),
    )
}

pub fn dispatch(line: &str) -> Dispatch {
    let raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => return Dispatch::Reply(error(Value::Null, PARSE_ERROR, format!("parse error: {e}"))),
    };
    let request: RpcRequest = match serde_json::from_value(raw.clone()) {
        Ok(request) => request,
        Err(e) => {
            let id = raw.get("id").cloned().unwrap_or(Value::Null);
            return Dispatch::Reply(error(id, INVALID_REQUEST, format!("invalid request: {e}")));
        }
    };

    let Some(id) = request.id else {
        debug!(method = %request.method, "notification received");
        return Dispatch::Silent;
    };

    match request.method.as_str() {
        "initialize" => {
            let version = request
                .params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROTOCOL_VERSION);
            Dispatch::Reply(result(
                id,
                json!({
                    "protocolVersion": version,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ))
        }
        "ping" => Dispatch::Reply(result(id, json!({}))),
        "tools/list" => Dispatch::Reply(result(id, json!({ "tools": tools::definitions() }))),
        "tools/call" => match request.params.get("name").and_then(Value::as_str) {
            Some(name) => Dispatch::Call {
                id,
                name: name.to_string(),
                arguments: request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({})),
            },
            None => Dispatch::Reply(error(id, INVALID_PARAMS, "tools/call requires a tool name")),
        },
        other => Dispatch::Reply(error(id, METHOD_NOT_FOUND, format!("method not found: {other}"))),
    }
}

/// Serve requests from `input` until it closes, then wait for in-flight
/// tool calls and flush their replies.
pub async fn serve<R, W>(input: R, output: W, ctx: Arc<ToolContext>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut calls = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match dispatch(&line) {
            Dispatch::Reply(response) => {
                let _ = tx.send(response.to_string());
            }
            Dispatch::Call {
                id,
                name,
                arguments,
            } => {
                let ctx = ctx.clone();
                let tx = tx.clone();
                calls.spawn(async move {
                    let envelope = tools::invoke(&ctx, &name, &arguments).await;
                    let _ = tx.send(call_response(id, &envelope).to_string());
                });
            }
            Dispatch::Silent => {}
        }
        while let Some(finished) = calls.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "tool call task failed");
            }
        }
    }

    info!(in_flight = calls.len(), "input closed, finishing pending calls");
    while let Some(finished) = calls.join_next().await {
        if let Err(e) = finished {
            warn!(error = %e, "tool call task failed");
        }
    }
    drop(tx);
    writer.await.map_err(std::io::Error::other)??;
    Ok(())
}
