//! Server error types.
/// Errors from server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Assembler process failed to start.
    #[error("assembler failed to start: {0}")]
    SpawnFailed(String),

    /// Configuration fetch from the client failed.
    #[error("configuration fetch failed: {0}")]
    ConfigFetch(String),

    /// JSON-RPC error returned by the client.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// The error code.
        code: i32,
        /// The error message.
        message: String,
    },

    /// Request timed out waiting for the client's response.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// The client connection closed.
    #[error("client connection closed")]
    ConnectionClosed,

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed message from the client.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
