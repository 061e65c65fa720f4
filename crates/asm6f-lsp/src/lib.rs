//! asm6f-lsp — language server for the asm6f assembler.
//!
//! This crate implements the build-and-diagnose pipeline: per-document
//! settings resolution, assembler invocation, streaming stderr parsing,
//! and per-file diagnostic publication, plus the JSON-RPC plumbing
//! around it.
pub mod build;
pub mod completion;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod parse;
pub mod server;
pub mod settings;
pub mod transport;
pub mod types;
pub mod uri;

// Re-export key types for convenience.
pub use connection::Connection;
pub use diagnostics::FileDiagnosticSet;
pub use error::ServerError;
pub use server::Server;
pub use settings::{BuildSettings, SettingsCache};
pub use types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, MessageType, Position,
    Range,
};
