//! JSON-RPC transport for the language server.
//!
//! Implements Content-Length header framing per the LSP specification:
//! `Content-Length: N\r\n\r\n{json}` over stdin/stdout.
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ServerError;

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC error code for malformed request parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Counter for ids of server-initiated requests.
static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate the next unique request ID for a server-initiated request.
pub fn next_request_id() -> i64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// A request id as chosen by its sender.
///
/// The client may use numbers or strings; responses must echo the id
/// verbatim. Ids allocated by this server are always numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A numeric id.
    Number(i64),
    /// A string id.
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// A JSON-RPC message (request, response, or notification).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRpcMessage {
    /// A request (has id and method).
    Request {
        /// The request ID, echoed back in the response.
        id: RequestId,
        /// The method name.
        method: String,
        /// The params (JSON value).
        params: serde_json::Value,
    },
    /// A response (has id, may have result or error).
    Response {
        /// The ID of the request this responds to.
        id: RequestId,
        /// The result (if successful).
        result: Option<serde_json::Value>,
        /// The error (if failed).
        error: Option<RpcError>,
    },
    /// A notification (has method, no id).
    Notification {
        /// The method name.
        method: String,
        /// The params.
        params: serde_json::Value,
    },
}

/// An error object in a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// The error code.
    pub code: i32,
    /// The error message.
    pub message: String,
}

/// Frame a JSON-RPC message with a Content-Length header.
pub fn frame_message(body: &str) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

/// Serialize a server-initiated JSON-RPC request.
pub fn serialize_request(id: i64, method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
    .to_string()
}

/// Serialize a JSON-RPC notification (no id).
pub fn serialize_notification(method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
    .to_string()
}

/// Serialize a JSON-RPC response, echoing the request id verbatim.
pub fn serialize_response(id: &RequestId, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
    .to_string()
}

/// Serialize a JSON-RPC error response.
pub fn serialize_error_response(id: &RequestId, code: i32, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
    .to_string()
}

/// Parse a JSON-RPC message from a frame body.
pub fn parse_message(json_str: &str) -> Result<JsonRpcMessage, ServerError> {
    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ServerError::InvalidMessage(format!("invalid JSON: {}", e)))?;

    let id = match value.get("id") {
        Some(raw) => Some(
            serde_json::from_value::<RequestId>(raw.clone())
                .map_err(|_| ServerError::InvalidMessage("id must be integer or string".into()))?,
        ),
        None => None,
    };
    let method = value
        .get("method")
        .map(|m| {
            m.as_str()
                .map(str::to_string)
                .ok_or_else(|| ServerError::InvalidMessage("method must be string".into()))
        })
        .transpose()?;

    match (id, method) {
        // Request: has both id and method
        (Some(id), Some(method)) => {
            let params = value
                .get("params")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            Ok(JsonRpcMessage::Request { id, method, params })
        }
        // Response: has id but no method
        (Some(id), None) => {
            let result = value.get("result").cloned();
            let error = value.get("error").and_then(|e| {
                Some(RpcError {
                    code: e.get("code")?.as_i64()? as i32,
                    message: e.get("message")?.as_str()?.to_string(),
                })
            });
            Ok(JsonRpcMessage::Response { id, result, error })
        }
        // Notification: has method but no id
        (None, Some(method)) => {
            let params = value
                .get("params")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            Ok(JsonRpcMessage::Notification { method, params })
        }
        // Invalid
        (None, None) => Err(ServerError::InvalidMessage(
            "message has neither id nor method".to_string(),
        )),
    }
}

/// Read one framed message body from the reader.
///
/// Returns `Ok(None)` on a clean EOF before any header bytes. Header
/// parsing is case-insensitive; headers other than Content-Length are
/// ignored.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<String>, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header_bytes = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            if !saw_header_bytes {
                return Ok(None);
            }
            return Err(ServerError::InvalidMessage(
                "unexpected EOF while reading headers".into(),
            ));
        }
        saw_header_bytes = true;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(colon) = trimmed.find(':') {
            let key = &trimmed[..colon];
            if key.eq_ignore_ascii_case("Content-Length") {
                let value = trimmed[colon + 1..].trim();
                content_length = Some(value.parse::<usize>().map_err(|_| {
                    ServerError::InvalidMessage(format!("invalid Content-Length: {}", value))
                })?);
            }
        }
    }

    let length = content_length
        .ok_or_else(|| ServerError::InvalidMessage("missing Content-Length header".into()))?;
    if length > MAX_FRAME_BYTES {
        return Err(ServerError::InvalidMessage(format!(
            "Content-Length {} exceeds maximum {}",
            length, MAX_FRAME_BYTES
        )));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let body = String::from_utf8(body)
        .map_err(|_| ServerError::InvalidMessage("invalid UTF-8 in frame body".into()))?;
    Ok(Some(body))
}
