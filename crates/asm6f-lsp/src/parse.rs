//! Streaming parser for the assembler's stderr.
//!
//! Stderr arrives as arbitrarily-sized byte chunks. [`LineBuffer`] splits
//! them into complete lines at line-break boundaries, carrying a trailing
//! fragment into the next chunk; [`ErrorLineParser`] matches each line
//! against the assembler's fixed error grammar `<file>(<line>): <reason>.`
use std::path::Path;

use regex::Regex;

use crate::types::{Diagnostic, DiagnosticSeverity, Range};
use crate::uri::path_to_uri;

/// Source tag attached to every diagnostic this server produces.
pub const SOURCE_TAG: &str = "asm6f-lang";

/// Accumulates stderr bytes and yields complete lines.
///
/// A trailing fragment with no line break stays buffered until the next
/// chunk arrives, or until [`LineBuffer::finish`] flushes it at stream
/// end. Lines are trimmed; blank lines are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Flush the trailing unterminated line, if any.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

/// A structured assembler error extracted from one stderr line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    /// File the assembler attributed the error to, as printed.
    pub file: String,
    /// 1-based line number, as printed.
    pub line: u32,
    /// Free-text reason, without the trailing period.
    pub reason: String,
}

impl AsmError {
    /// Build the diagnostic for this error.
    ///
    /// The 1-based assembler line becomes a 0-based editor line, and the
    /// range spans the whole line so it highlights regardless of length.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            range: Range::whole_line(self.line.saturating_sub(1)),
            severity: Some(DiagnosticSeverity::Error),
            message: self.reason.clone(),
            source: Some(SOURCE_TAG.to_string()),
        }
    }

    /// Canonical `file://` URI of the owning file.
    ///
    /// The owning file is whatever the message names — for errors inside
    /// included files this differs from the document whose save triggered
    /// the build.
    pub fn uri(&self) -> String {
        path_to_uri(Path::new(&self.file))
    }
}

/// One line of assembler stderr after grammar matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A line matching the error grammar.
    Error(AsmError),
    /// Anything else; surfaced to the user verbatim, never dropped.
    Unrecognized(String),
}

/// Matches stderr lines against the fixed error grammar.
#[derive(Debug)]
pub struct ErrorLineParser {
    pattern: Regex,
}

impl ErrorLineParser {
    /// Create a parser for the `<file>(<line>): <reason>.` grammar.
    pub fn new() -> Self {
        // The pattern is a fixed literal; compilation cannot fail.
        let pattern = Regex::new(r"(.+)\((\d+)\): (.+)\.").expect("error grammar pattern");
        Self { pattern }
    }

    /// Parse one trimmed line.
    pub fn parse(&self, line: &str) -> ParsedLine {
        let Some(caps) = self.pattern.captures(line) else {
            return ParsedLine::Unrecognized(line.to_string());
        };
        let Ok(number) = caps[2].parse::<u32>() else {
            return ParsedLine::Unrecognized(line.to_string());
        };
        ParsedLine::Error(AsmError {
            file: caps[1].to_string(),
            line: number,
            reason: caps[3].to_string(),
        })
    }
}

impl Default for ErrorLineParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines chunk buffering and grammar matching for one build's stderr.
#[derive(Debug)]
pub struct StderrParser {
    buffer: LineBuffer,
    parser: ErrorLineParser,
}

impl StderrParser {
    /// Create a fresh parser for one build.
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::new(),
            parser: ErrorLineParser::new(),
        }
    }

    /// Feed one chunk; returns the parse of every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParsedLine> {
        self.buffer
            .push(chunk)
            .iter()
            .map(|line| self.parser.parse(line))
            .collect()
    }

    /// Flush and parse the trailing unterminated line, if any.
    pub fn finish(self) -> Option<ParsedLine> {
        let line = self.buffer.finish()?;
        Some(self.parser.parse(&line))
    }
}

impl Default for StderrParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, END_OF_LINE};

    #[test]
    fn line_buffer_complete_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"first line\nsecond line\n");
        assert_eq!(lines, vec!["first line", "second line"]);
        assert!(buf.finish().is_none());
    }

    #[test]
    fn line_buffer_carries_partial_line() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"main.asm(4): undefi");
        assert!(lines.is_empty());
        let lines = buf.push(b"ned symbol 'foo'.\n");
        assert_eq!(lines, vec!["main.asm(4): undefined symbol 'foo'."]);
    }

    #[test]
    fn line_buffer_flushes_trailing_fragment() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"no newline here").is_empty());
        assert_eq!(buf.finish().unwrap(), "no newline here");
    }

    #[test]
    fn line_buffer_strips_crlf() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"main.asm(4): bad opcode.\r\n");
        assert_eq!(lines, vec!["main.asm(4): bad opcode."]);
    }

    #[test]
    fn line_buffer_drops_blank_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"\n  \none\n\n");
        assert_eq!(lines, vec!["one"]);
    }

    #[test]
    fn line_buffer_many_lines_one_chunk() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"a(1): x.\nb(2): y.\nc(3): z.\n");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn parse_well_formed_line() {
        let parser = ErrorLineParser::new();
        match parser.parse("main.asm(4): undefined symbol 'foo'.") {
            ParsedLine::Error(err) => {
                assert_eq!(err.file, "main.asm");
                assert_eq!(err.line, 4);
                assert_eq!(err.reason, "undefined symbol 'foo'");
            }
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[test]
    fn parse_attributes_to_named_file() {
        let parser = ErrorLineParser::new();
        match parser.parse("inc.asm(2): bad addressing mode.") {
            ParsedLine::Error(err) => assert_eq!(err.file, "inc.asm"),
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[test]
    fn parse_unrecognized_line_kept_verbatim() {
        let parser = ErrorLineParser::new();
        assert_eq!(
            parser.parse("fatal: cannot open output file"),
            ParsedLine::Unrecognized("fatal: cannot open output file".to_string())
        );
    }

    #[test]
    fn parse_missing_trailing_period_is_unrecognized() {
        let parser = ErrorLineParser::new();
        assert!(matches!(
            parser.parse("main.asm(4): undefined symbol"),
            ParsedLine::Unrecognized(_)
        ));
    }

    #[test]
    fn parse_non_numeric_line_is_unrecognized() {
        let parser = ErrorLineParser::new();
        assert!(matches!(
            parser.parse("main.asm(x): bad."),
            ParsedLine::Unrecognized(_)
        ));
    }

    #[test]
    fn parse_huge_line_number_is_unrecognized() {
        let parser = ErrorLineParser::new();
        assert!(matches!(
            parser.parse("main.asm(99999999999999999999): bad."),
            ParsedLine::Unrecognized(_)
        ));
    }

    #[test]
    fn parse_path_with_directories() {
        let parser = ErrorLineParser::new();
        match parser.parse("src/include/macros.asm(17): duplicate label.") {
            ParsedLine::Error(err) => {
                assert_eq!(err.file, "src/include/macros.asm");
                assert_eq!(err.line, 17);
            }
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[test]
    fn diagnostic_line_is_zero_based() {
        let err = AsmError {
            file: "main.asm".into(),
            line: 4,
            reason: "undefined symbol 'foo'".into(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.range.start, Position::new(3, 0));
        assert_eq!(diag.range.end, Position::new(3, END_OF_LINE));
        assert_eq!(diag.message, "undefined symbol 'foo'");
        assert_eq!(diag.severity, Some(DiagnosticSeverity::Error));
        assert_eq!(diag.source.as_deref(), Some(SOURCE_TAG));
    }

    #[test]
    fn diagnostic_line_zero_saturates() {
        let err = AsmError {
            file: "main.asm".into(),
            line: 0,
            reason: "weird".into(),
        };
        assert_eq!(err.to_diagnostic().range.start.line, 0);
    }

    #[test]
    fn error_uri_is_file_scheme() {
        let err = AsmError {
            file: "inc.asm".into(),
            line: 1,
            reason: "x".into(),
        };
        let uri = err.uri();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("/inc.asm"));
    }

    #[test]
    fn stderr_parser_mixed_chunk() {
        let mut parser = StderrParser::new();
        let parsed = parser.feed(b"main.asm(4): undefined symbol 'foo'.\nfatal: cannot open output file\n");
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[0], ParsedLine::Error(_)));
        assert!(matches!(parsed[1], ParsedLine::Unrecognized(_)));
    }

    #[test]
    fn stderr_parser_message_split_across_chunks() {
        let mut parser = StderrParser::new();
        assert!(parser.feed(b"main.asm(4): und").is_empty());
        let parsed = parser.feed(b"efined symbol 'foo'.\n");
        assert_eq!(parsed.len(), 1);
        match &parsed[0] {
            ParsedLine::Error(err) => {
                assert_eq!(err.line, 4);
                assert_eq!(err.reason, "undefined symbol 'foo'");
            }
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[test]
    fn stderr_parser_finish_flushes_unterminated() {
        let mut parser = StderrParser::new();
        assert!(parser.feed(b"main.asm(9): missing operand.").is_empty());
        match parser.finish() {
            Some(ParsedLine::Error(err)) => assert_eq!(err.line, 9),
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[test]
    fn stderr_parser_finish_empty() {
        let mut parser = StderrParser::new();
        let _ = parser.feed(b"a(1): x.\n");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn same_input_parses_identically() {
        let chunk = b"main.asm(4): undefined symbol 'foo'.\ninc.asm(2): bad addressing mode.\n";
        let mut first = StderrParser::new();
        let mut second = StderrParser::new();
        assert_eq!(first.feed(chunk), second.feed(chunk));
    }
}
