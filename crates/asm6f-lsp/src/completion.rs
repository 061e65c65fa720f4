//! Static keyword completion data.
//!
//! The completion surface is fixed: a two-item keyword list with
//! resolve-time detail text, independent of document content and cursor
//! position.
use crate::types::{CompletionItem, CompletionItemKind};

/// The unconditional keyword completion list.
pub fn keyword_completions() -> Vec<CompletionItem> {
    vec![
        CompletionItem {
            label: "lda".to_string(),
            kind: Some(CompletionItemKind::Keyword),
            data: Some(1),
            detail: None,
            documentation: None,
        },
        CompletionItem {
            label: "ldx".to_string(),
            kind: Some(CompletionItemKind::Keyword),
            data: Some(2),
            detail: None,
            documentation: None,
        },
    ]
}

/// Fill in detail and documentation for a selected completion item.
///
/// Items without a recognized data tag pass through unchanged.
pub fn resolve(mut item: CompletionItem) -> CompletionItem {
    match item.data {
        Some(1) => {
            item.detail = Some("Load Accumulator".to_string());
            item.documentation = Some(
                "Loads a byte of memory into the accumulator, setting the zero and negative flags."
                    .to_string(),
            );
        }
        Some(2) => {
            item.detail = Some("Load X".to_string());
            item.documentation = Some(
                "Loads a byte of memory into the X index register, setting the zero and negative flags."
                    .to_string(),
            );
        }
        _ => {}
    }
    item
}
