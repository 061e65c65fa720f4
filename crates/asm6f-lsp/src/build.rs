//! Assembler subprocess invocation.
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::ServerError;
use crate::settings::BuildSettings;

/// A running assembler invocation with its captured output streams.
///
/// The caller owns the streams for the duration of one build and reaps
/// the process with [`Child::wait`] once they close, whatever the exit
/// code.
#[derive(Debug)]
pub struct BuildProcess {
    /// The child process handle.
    pub child: Child,
    /// Captured stdout; advisory log output, never parsed.
    pub stdout: ChildStdout,
    /// Captured stderr; carries the error-message stream.
    pub stderr: ChildStderr,
}

/// Spawn the configured assembler.
///
/// The entry file and output file are passed as positional arguments,
/// verbatim, with no shell interpretation. A launch failure describes an
/// environment problem, not a source error.
pub fn spawn_assembler(settings: &BuildSettings) -> Result<BuildProcess, ServerError> {
    let mut child = Command::new(&settings.assembler_path)
        .arg(&settings.main_file)
        .arg(&settings.out_file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ServerError::SpawnFailed(format!("{}: {}", settings.assembler_path, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ServerError::SpawnFailed("could not capture stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ServerError::SpawnFailed("could not capture stderr".into()))?;

    Ok(BuildProcess {
        child,
        stdout,
        stderr,
    })
}
