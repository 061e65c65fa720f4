//! Outgoing half of the client connection.
//!
//! Owns the writer channel, serializes responses and notifications, and
//! routes client responses back to pending server-initiated requests via
//! oneshot channels.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration};

use crate::error::ServerError;
use crate::transport::{
    frame_message, next_request_id, serialize_error_response, serialize_notification,
    serialize_request, serialize_response, RequestId, RpcError,
};
use crate::types::{Diagnostic, MessageType, PublishDiagnosticsParams, ShowMessageParams};

/// Default timeout for server-initiated requests (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// The result routed to a waiting server-initiated request.
#[derive(Debug)]
pub enum ResponseOutcome {
    /// Successful response with the result value.
    Success(serde_json::Value),
    /// Error response from the client.
    Error(RpcError),
}

/// A handle for sending messages to the client.
///
/// Cheap to clone; all clones share one writer channel and one pending
/// request map.
#[derive(Clone)]
pub struct Connection {
    writer_tx: mpsc::Sender<Vec<u8>>,
    pending: Arc<Mutex<HashMap<i64, oneshot::Sender<ResponseOutcome>>>>,
}

impl Connection {
    /// Create a connection that writes framed messages into the channel.
    pub fn new(writer_tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            writer_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn send(&self, framed: Vec<u8>) -> Result<(), ServerError> {
        self.writer_tx
            .send(framed)
            .await
            .map_err(|_| ServerError::ConnectionClosed)
    }

    /// Send a successful response for a client request.
    pub async fn respond(
        &self,
        id: &RequestId,
        result: serde_json::Value,
    ) -> Result<(), ServerError> {
        let body = serialize_response(id, result);
        self.send(frame_message(&body)).await
    }

    /// Send an error response for a client request.
    pub async fn respond_error(
        &self,
        id: &RequestId,
        code: i32,
        message: &str,
    ) -> Result<(), ServerError> {
        let body = serialize_error_response(id, code, message);
        self.send(frame_message(&body)).await
    }

    /// Send a notification to the client.
    pub async fn notify(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<(), ServerError> {
        let body = serialize_notification(method, params);
        self.send(frame_message(&body)).await
    }

    /// Send a request to the client and wait for its response.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ServerError> {
        let id = next_request_id();
        let body = serialize_request(id, method, params);
        let framed = frame_message(&body);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send(framed).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let outcome = match timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(ServerError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ServerError::Timeout(REQUEST_TIMEOUT_SECS));
            }
        };

        match outcome {
            ResponseOutcome::Success(value) => Ok(value),
            ResponseOutcome::Error(err) => Err(ServerError::Rpc {
                code: err.code,
                message: err.message,
            }),
        }
    }

    /// Route a client response to the request waiting for it.
    ///
    /// Ids allocated by this server are numeric; anything else is logged
    /// and dropped.
    pub async fn dispatch_response(
        &self,
        id: &RequestId,
        result: Option<serde_json::Value>,
        error: Option<RpcError>,
    ) {
        let RequestId::Number(id) = id else {
            tracing::warn!("received response with non-numeric id: {}", id);
            return;
        };
        let Some(sender) = self.pending.lock().await.remove(id) else {
            tracing::warn!("received response for unknown request id: {}", id);
            return;
        };
        let outcome = match error {
            Some(err) => ResponseOutcome::Error(err),
            None => ResponseOutcome::Success(result.unwrap_or(serde_json::Value::Null)),
        };
        // If the waiter gave up (timeout), that's ok.
        let _ = sender.send(outcome);
    }

    /// How many server-initiated requests are awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Publish the complete diagnostic list for one URI.
    pub async fn publish_diagnostics(
        &self,
        uri: String,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<(), ServerError> {
        let params = PublishDiagnosticsParams { uri, diagnostics };
        let params = serde_json::to_value(params)
            .map_err(|e| ServerError::Serialization(e.to_string()))?;
        self.notify("textDocument/publishDiagnostics", params).await
    }

    /// Show an error message in the editor, outside the diagnostics channel.
    pub async fn show_error_message(&self, message: &str) -> Result<(), ServerError> {
        let params = ShowMessageParams {
            typ: MessageType::Error,
            message: message.to_string(),
        };
        let params = serde_json::to_value(params)
            .map_err(|e| ServerError::Serialization(e.to_string()))?;
        self.notify("window/showMessage", params).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
