//! Request dispatch and the build pipeline.
//!
//! One loop reads framed messages from the client and handles them in
//! arrival order. A save spawns its build as a task so the loop keeps
//! reading while a configuration round-trip or an assembler run is in
//! flight; responses from the client are routed back through the
//! connection's pending map.
use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::build::{spawn_assembler, BuildProcess};
use crate::completion;
use crate::connection::Connection;
use crate::diagnostics::FileDiagnosticSet;
use crate::error::ServerError;
use crate::parse::{ParsedLine, StderrParser};
use crate::settings::{BuildSettings, SettingsCache, CONFIG_SECTION};
use crate::transport::{
    parse_message, read_frame, JsonRpcMessage, RequestId, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::types::{server_capabilities, ClientCapabilities, CompletionItem};
use crate::uri::normalize_uri;

/// Buffer size for stderr reads.
const STDERR_CHUNK_BYTES: usize = 4096;

/// Writer channel capacity.
const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for the `initialize` request.
    Uninitialized,
    /// Handling requests.
    Running,
    /// `shutdown` received, waiting for `exit`.
    ShuttingDown,
}

/// The asm6f language server.
pub struct Server {
    state: ServerState,
    capabilities: ClientCapabilities,
    settings: Arc<Mutex<SettingsCache>>,
    prior_files: Arc<Mutex<HashSet<String>>>,
}

impl Server {
    /// Create a server awaiting initialization.
    pub fn new() -> Self {
        Self {
            state: ServerState::Uninitialized,
            capabilities: ClientCapabilities::default(),
            settings: Arc::new(Mutex::new(SettingsCache::new())),
            prior_files: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Run the server over the given transport until `exit` or EOF.
    pub async fn run<R, W>(mut self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        // Writer task: everything going to the client funnels through one
        // channel so frames never interleave.
        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(WRITER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(msg) = writer_rx.recv().await {
                if writer.write_all(&msg).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let connection = Connection::new(writer_tx);
        let mut reader = BufReader::new(reader);

        loop {
            let body = match read_frame(&mut reader).await? {
                Some(body) => body,
                None => {
                    info!("client closed the connection");
                    break;
                }
            };
            let message = match parse_message(&body) {
                Ok(message) => message,
                Err(e) => {
                    warn!("dropping malformed message: {}", e);
                    continue;
                }
            };
            match message {
                JsonRpcMessage::Request { id, method, params } => {
                    self.handle_request(&connection, id, &method, params).await?;
                }
                JsonRpcMessage::Notification { method, params } => {
                    if self.handle_notification(&connection, &method, params).await? {
                        break;
                    }
                }
                JsonRpcMessage::Response { id, result, error } => {
                    connection.dispatch_response(&id, result, error).await;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(
        &mut self,
        conn: &Connection,
        id: RequestId,
        method: &str,
        params: serde_json::Value,
    ) -> Result<(), ServerError> {
        match method {
            "initialize" => {
                self.capabilities = ClientCapabilities::from_initialize_params(&params);
                self.state = ServerState::Running;
                info!(
                    configuration = self.capabilities.configuration,
                    workspace_folders = self.capabilities.workspace_folders,
                    related_information = self.capabilities.related_information,
                    "initialize received"
                );
                conn.respond(
                    &id,
                    serde_json::json!({ "capabilities": server_capabilities() }),
                )
                .await
            }
            "shutdown" => {
                self.state = ServerState::ShuttingDown;
                conn.respond(&id, serde_json::Value::Null).await
            }
            "textDocument/completion" => {
                let items = serde_json::to_value(completion::keyword_completions())
                    .map_err(|e| ServerError::Serialization(e.to_string()))?;
                conn.respond(&id, items).await
            }
            "completionItem/resolve" => match serde_json::from_value::<CompletionItem>(params) {
                Ok(item) => {
                    let resolved = serde_json::to_value(completion::resolve(item))
                        .map_err(|e| ServerError::Serialization(e.to_string()))?;
                    conn.respond(&id, resolved).await
                }
                Err(e) => {
                    conn.respond_error(
                        &id,
                        INVALID_PARAMS,
                        &format!("invalid completion item: {}", e),
                    )
                    .await
                }
            },
            _ => {
                debug!("unhandled request: {}", method);
                conn.respond_error(
                    &id,
                    METHOD_NOT_FOUND,
                    &format!("method not found: {}", method),
                )
                .await
            }
        }
    }

    /// Handle a notification. Returns `true` when the server should exit.
    async fn handle_notification(
        &mut self,
        conn: &Connection,
        method: &str,
        params: serde_json::Value,
    ) -> Result<bool, ServerError> {
        match method {
            "initialized" => {
                if self.capabilities.configuration {
                    // Register for configuration changes; without the
                    // capability the client pushes them unsolicited.
                    let conn = conn.clone();
                    tokio::spawn(async move {
                        let params = serde_json::json!({
                            "registrations": [{
                                "id": "workspace/didChangeConfiguration",
                                "method": "workspace/didChangeConfiguration"
                            }]
                        });
                        if let Err(e) = conn.request("client/registerCapability", params).await {
                            warn!("configuration-change registration failed: {}", e);
                        }
                    });
                }
            }
            "workspace/didChangeConfiguration" => {
                let mut settings = self.settings.lock().await;
                if self.capabilities.configuration {
                    settings.invalidate_all();
                    debug!("settings cache cleared");
                } else {
                    let global = params
                        .get("settings")
                        .and_then(|s| s.get(CONFIG_SECTION))
                        .map(BuildSettings::from_value)
                        .unwrap_or_default();
                    settings.set_global(global);
                    debug!("global settings replaced");
                }
            }
            "textDocument/didOpen" => {
                if let Some(uri) = doc_uri(&params) {
                    info!("{} opened", uri);
                }
            }
            "textDocument/didChange" => {
                // Builds run on save only.
            }
            "textDocument/didClose" => {
                if let Some(uri) = doc_uri(&params) {
                    self.settings.lock().await.remove(&normalize_uri(&uri));
                    info!("{} closed", uri);
                }
            }
            "textDocument/didSave" => {
                if self.state != ServerState::Running {
                    debug!("ignoring save while {:?}", self.state);
                } else if let Some(uri) = doc_uri(&params) {
                    self.spawn_build(conn, uri);
                }
            }
            "workspace/didChangeWatchedFiles" => {
                info!("watched files changed");
            }
            "workspace/didChangeWorkspaceFolders" => {
                if self.capabilities.workspace_folders {
                    info!("workspace folder change received");
                }
            }
            "exit" => {
                info!("exit received");
                return Ok(true);
            }
            _ => debug!("unhandled notification: {}", method),
        }
        Ok(false)
    }

    /// Start a build for a saved document without blocking the dispatch
    /// loop. Overlapping builds are allowed to run to completion and may
    /// interleave their publications.
    fn spawn_build(&self, conn: &Connection, uri: String) {
        let conn = conn.clone();
        let settings = self.settings.clone();
        let prior_files = self.prior_files.clone();
        let capabilities = self.capabilities;
        tokio::spawn(async move {
            if let Err(e) = run_build(&conn, &settings, &prior_files, capabilities, &uri).await {
                // A failed settings fetch (or a dead connection) skips
                // this build; the next save starts fresh.
                error!("build for {} failed: {}", uri, e);
            }
        });
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Extract `params.textDocument.uri` from lifecycle notifications.
fn doc_uri(params: &serde_json::Value) -> Option<String> {
    params
        .get("textDocument")?
        .get("uri")?
        .as_str()
        .map(str::to_string)
}

/// Resolve the build settings for a document.
///
/// Without the workspace-configuration capability this is always the
/// global instance. With it, a cache miss costs one
/// `workspace/configuration` round-trip scoped to the document.
pub async fn resolve_settings(
    conn: &Connection,
    cache: &Arc<Mutex<SettingsCache>>,
    capabilities: ClientCapabilities,
    document_uri: &str,
) -> Result<BuildSettings, ServerError> {
    if !capabilities.configuration {
        return Ok(cache.lock().await.global().clone());
    }

    let key = normalize_uri(document_uri);
    if let Some(cached) = cache.lock().await.get(&key) {
        return Ok(cached.clone());
    }

    let params = serde_json::json!({
        "items": [{ "scopeUri": key, "section": CONFIG_SECTION }]
    });
    let result = conn
        .request("workspace/configuration", params)
        .await
        .map_err(|e| ServerError::ConfigFetch(e.to_string()))?;

    let settings = match result.get(0) {
        None => BuildSettings::default(),
        Some(value) if value.is_null() => BuildSettings::default(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ServerError::ConfigFetch(e.to_string()))?,
    };
    cache.lock().await.insert(key, settings.clone());
    Ok(settings)
}

/// One complete build: resolve settings, spawn the assembler, stream its
/// stderr into diagnostics, and publish the result at process exit.
pub async fn run_build(
    conn: &Connection,
    cache: &Arc<Mutex<SettingsCache>>,
    prior_files: &Arc<Mutex<HashSet<String>>>,
    capabilities: ClientCapabilities,
    document_uri: &str,
) -> Result<(), ServerError> {
    let settings = resolve_settings(conn, cache, capabilities, document_uri).await?;
    info!(
        assembler = %settings.assembler_path,
        main = %settings.main_file,
        "starting build"
    );

    let process = match spawn_assembler(&settings) {
        Ok(process) => process,
        Err(e) => {
            // Environment problem, not a source error: tell the user,
            // publish nothing.
            conn.show_error_message(&e.to_string()).await?;
            return Ok(());
        }
    };

    let seed: Vec<String> = prior_files.lock().await.iter().cloned().collect();
    let mut set = FileDiagnosticSet::seeded(seed);

    let BuildProcess {
        mut child,
        stdout,
        stderr,
    } = process;

    // Stdout is advisory; drain it so the assembler never blocks on a
    // full pipe.
    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("assembler: {}", line);
        }
    });

    collect_stderr(conn, stderr, &mut set).await?;
    let _ = stdout_task.await;

    let status = child.wait().await?;
    // The exit code carries no contract; diagnostics are the signal.
    debug!("assembler exited with {}", status);

    // Record the dirty set before publishing so a save that arrives on
    // the heels of these frames seeds from the finished build.
    *prior_files.lock().await = set.non_empty_uris();
    for (uri, diagnostics) in set.into_publishes() {
        conn.publish_diagnostics(uri, diagnostics).await?;
    }
    info!("build finished, diagnostics published");
    Ok(())
}

/// Stream the assembler's stderr into the diagnostic set.
///
/// Grammar matches become diagnostics attributed to the file named in
/// the message; anything else goes to the user verbatim through
/// `window/showMessage`.
pub async fn collect_stderr<R>(
    conn: &Connection,
    mut stderr: R,
    set: &mut FileDiagnosticSet,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut parser = StderrParser::new();
    let mut buf = [0u8; STDERR_CHUNK_BYTES];
    loop {
        let n = stderr.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for line in parser.feed(&buf[..n]) {
            handle_line(conn, line, set).await?;
        }
    }
    if let Some(line) = parser.finish() {
        handle_line(conn, line, set).await?;
    }
    Ok(())
}

async fn handle_line(
    conn: &Connection,
    line: ParsedLine,
    set: &mut FileDiagnosticSet,
) -> Result<(), ServerError> {
    match line {
        ParsedLine::Error(err) => set.push(err.uri(), err.to_diagnostic()),
        ParsedLine::Unrecognized(text) => {
            warn!("unrecognized assembler output: {}", text);
            conn.show_error_message(&text).await?;
        }
    }
    Ok(())
}
