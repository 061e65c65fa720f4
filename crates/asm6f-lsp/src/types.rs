//! LSP protocol types.
//!
//! These types mirror the Language Server Protocol specification (v3.17+)
//! for the payloads this server sends and receives. Enums with numeric
//! wire codes carry hand-written serde impls so they serialize as the
//! integers the protocol requires.
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel character offset meaning "end of line".
///
/// Used as the end column of whole-line ranges so the editor highlights
/// the entire line regardless of its actual length.
pub const END_OF_LINE: u32 = u32::MAX;

/// LSP Position — 0-based line and character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based character offset (UTF-16).
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// LSP Range — start and end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Range {
    /// Start position (inclusive).
    pub start: Position,
    /// End position (exclusive).
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A range covering one whole line, from column 0 to [`END_OF_LINE`].
    pub fn whole_line(line: u32) -> Self {
        Self {
            start: Position::new(line, 0),
            end: Position::new(line, END_OF_LINE),
        }
    }
}

/// Diagnostic severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Reports an error.
    Error = 1,
    /// Reports a warning.
    Warning = 2,
    /// Reports an information.
    Information = 3,
    /// Reports a hint.
    Hint = 4,
}

impl Serialize for DiagnosticSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for DiagnosticSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self::Error),
            2 => Ok(Self::Warning),
            3 => Ok(Self::Information),
            4 => Ok(Self::Hint),
            other => Err(serde::de::Error::custom(format!(
                "invalid diagnostic severity: {}",
                other
            ))),
        }
    }
}

/// A diagnostic attributable to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The range at which the diagnostic applies.
    pub range: Range,
    /// The severity of the diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<DiagnosticSeverity>,
    /// The diagnostic's message.
    pub message: String,
    /// The tool that produced the diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Parameters of a `textDocument/publishDiagnostics` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    /// The URI the diagnostics belong to.
    pub uri: String,
    /// The complete diagnostic list for that URI (empty clears markers).
    pub diagnostics: Vec<Diagnostic>,
}

/// Message type for `window/showMessage` and `window/logMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// An error message.
    Error = 1,
    /// A warning message.
    Warning = 2,
    /// An information message.
    Info = 3,
    /// A log message.
    Log = 4,
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self::Error),
            2 => Ok(Self::Warning),
            3 => Ok(Self::Info),
            4 => Ok(Self::Log),
            other => Err(serde::de::Error::custom(format!(
                "invalid message type: {}",
                other
            ))),
        }
    }
}

/// Parameters of a `window/showMessage` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowMessageParams {
    /// The message type.
    #[serde(rename = "type")]
    pub typ: MessageType,
    /// The actual message.
    pub message: String,
}

/// Completion item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionItemKind {
    /// A text completion.
    Text = 1,
    /// A function completion.
    Function = 3,
    /// A variable completion.
    Variable = 6,
    /// A keyword completion.
    Keyword = 14,
    /// A snippet completion.
    Snippet = 15,
}

impl Serialize for CompletionItemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for CompletionItemKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self::Text),
            3 => Ok(Self::Function),
            6 => Ok(Self::Variable),
            14 => Ok(Self::Keyword),
            15 => Ok(Self::Snippet),
            other => Err(serde::de::Error::custom(format!(
                "invalid completion item kind: {}",
                other
            ))),
        }
    }
}

/// A completion item offered to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    /// The label of this completion item.
    pub label: String,
    /// The kind of this completion item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CompletionItemKind>,
    /// Opaque tag the client echoes back on `completionItem/resolve`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<i64>,
    /// A human-readable string with additional information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The documentation for this completion item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Client capability flags this server cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientCapabilities {
    /// Client supports `workspace/configuration` requests.
    pub configuration: bool,
    /// Client supports workspace folders.
    pub workspace_folders: bool,
    /// Client supports related information on published diagnostics.
    pub related_information: bool,
}

impl ClientCapabilities {
    /// Extract capability flags from raw `initialize` params.
    pub fn from_initialize_params(params: &serde_json::Value) -> Self {
        let caps = &params["capabilities"];
        Self {
            configuration: caps["workspace"]["configuration"]
                .as_bool()
                .unwrap_or(false),
            workspace_folders: caps["workspace"]["workspaceFolders"]
                .as_bool()
                .unwrap_or(false),
            related_information: caps["textDocument"]["publishDiagnostics"]
                ["relatedInformation"]
                .as_bool()
                .unwrap_or(false),
        }
    }
}

/// Server capabilities advertised in the `initialize` response.
///
/// Full document sync only, plus completion with resolve support.
pub fn server_capabilities() -> serde_json::Value {
    serde_json::json!({
        "textDocumentSync": 1,
        "completionProvider": {
            "resolveProvider": true,
            "triggerCharacters": ["."]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_new() {
        let pos = Position::new(10, 20);
        assert_eq!(pos.line, 10);
        assert_eq!(pos.character, 20);
    }

    #[test]
    fn position_default() {
        let pos = Position::default();
        assert_eq!(pos.line, 0);
        assert_eq!(pos.character, 0);
    }

    #[test]
    fn range_new() {
        let range = Range::new(Position::new(1, 0), Position::new(1, 10));
        assert_eq!(range.start.line, 1);
        assert_eq!(range.end.character, 10);
    }

    #[test]
    fn range_whole_line() {
        let range = Range::whole_line(3);
        assert_eq!(range.start, Position::new(3, 0));
        assert_eq!(range.end, Position::new(3, END_OF_LINE));
    }

    #[test]
    fn severity_serializes_as_integer() {
        let json = serde_json::to_string(&DiagnosticSeverity::Error).unwrap();
        assert_eq!(json, "1");
        let json = serde_json::to_string(&DiagnosticSeverity::Warning).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn severity_deserializes_from_integer() {
        let sev: DiagnosticSeverity = serde_json::from_str("1").unwrap();
        assert_eq!(sev, DiagnosticSeverity::Error);
        let sev: DiagnosticSeverity = serde_json::from_str("4").unwrap();
        assert_eq!(sev, DiagnosticSeverity::Hint);
    }

    #[test]
    fn severity_rejects_unknown_code() {
        assert!(serde_json::from_str::<DiagnosticSeverity>("9").is_err());
    }

    #[test]
    fn message_type_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&MessageType::Error).unwrap(), "1");
        assert_eq!(serde_json::to_string(&MessageType::Log).unwrap(), "4");
    }

    #[test]
    fn completion_kind_serializes_as_integer() {
        assert_eq!(
            serde_json::to_string(&CompletionItemKind::Keyword).unwrap(),
            "14"
        );
    }

    #[test]
    fn completion_kind_roundtrip() {
        let kind: CompletionItemKind = serde_json::from_str("14").unwrap();
        assert_eq!(kind, CompletionItemKind::Keyword);
    }

    #[test]
    fn diagnostic_serializes_wire_shape() {
        let diag = Diagnostic {
            range: Range::whole_line(3),
            severity: Some(DiagnosticSeverity::Error),
            message: "undefined symbol 'foo'".to_string(),
            source: Some("asm6f-lang".to_string()),
        };
        let value = serde_json::to_value(&diag).unwrap();
        assert_eq!(value["severity"], 1);
        assert_eq!(value["range"]["start"]["line"], 3);
        assert_eq!(value["range"]["start"]["character"], 0);
        assert_eq!(value["range"]["end"]["character"], u32::MAX as u64);
        assert_eq!(value["message"], "undefined symbol 'foo'");
        assert_eq!(value["source"], "asm6f-lang");
    }

    #[test]
    fn diagnostic_omits_absent_fields() {
        let diag = Diagnostic {
            range: Range::default(),
            severity: None,
            message: "something".into(),
            source: None,
        };
        let value = serde_json::to_value(&diag).unwrap();
        assert!(value.get("severity").is_none());
        assert!(value.get("source").is_none());
    }

    #[test]
    fn diagnostic_roundtrip() {
        let diag = Diagnostic {
            range: Range::whole_line(0),
            severity: Some(DiagnosticSeverity::Error),
            message: "bad opcode".into(),
            source: Some("asm6f-lang".into()),
        };
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diag);
    }

    #[test]
    fn publish_params_roundtrip() {
        let params = PublishDiagnosticsParams {
            uri: "file:///main.asm".into(),
            diagnostics: vec![],
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: PublishDiagnosticsParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn show_message_params_renames_type() {
        let params = ShowMessageParams {
            typ: MessageType::Error,
            message: "fatal: cannot open output file".into(),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["type"], 1);
        assert_eq!(value["message"], "fatal: cannot open output file");
    }

    #[test]
    fn completion_item_omits_absent_fields() {
        let item = CompletionItem {
            label: "lda".into(),
            kind: Some(CompletionItemKind::Keyword),
            data: Some(1),
            detail: None,
            documentation: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["label"], "lda");
        assert_eq!(value["kind"], 14);
        assert_eq!(value["data"], 1);
        assert!(value.get("detail").is_none());
        assert!(value.get("documentation").is_none());
    }

    #[test]
    fn completion_item_roundtrip() {
        let item = CompletionItem {
            label: "ldx".into(),
            kind: Some(CompletionItemKind::Keyword),
            data: Some(2),
            detail: Some("Load X".into()),
            documentation: Some("docs".into()),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: CompletionItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn capabilities_from_full_params() {
        let params = serde_json::json!({
            "capabilities": {
                "workspace": {
                    "configuration": true,
                    "workspaceFolders": true
                },
                "textDocument": {
                    "publishDiagnostics": {
                        "relatedInformation": true
                    }
                }
            }
        });
        let caps = ClientCapabilities::from_initialize_params(&params);
        assert!(caps.configuration);
        assert!(caps.workspace_folders);
        assert!(caps.related_information);
    }

    #[test]
    fn capabilities_from_minimal_params() {
        let params = serde_json::json!({
            "capabilities": {
                "workspace": { "configuration": true }
            }
        });
        let caps = ClientCapabilities::from_initialize_params(&params);
        assert!(caps.configuration);
        assert!(!caps.workspace_folders);
        assert!(!caps.related_information);
    }

    #[test]
    fn capabilities_from_empty_params() {
        let caps = ClientCapabilities::from_initialize_params(&serde_json::json!({}));
        assert!(!caps.configuration);
        assert!(!caps.workspace_folders);
        assert!(!caps.related_information);
    }

    #[test]
    fn capabilities_default_all_false() {
        let caps = ClientCapabilities::default();
        assert!(!caps.configuration);
        assert!(!caps.workspace_folders);
        assert!(!caps.related_information);
    }

    #[test]
    fn server_capabilities_full_sync() {
        let caps = server_capabilities();
        assert_eq!(caps["textDocumentSync"], 1);
    }

    #[test]
    fn server_capabilities_completion_provider() {
        let caps = server_capabilities();
        assert_eq!(caps["completionProvider"]["resolveProvider"], true);
        assert_eq!(caps["completionProvider"]["triggerCharacters"][0], ".");
    }
}
